use crate::config::settings::Settings;
use crate::core::locator::OverlayLocator;
use crate::core::poll::{poll_for, poll_until};
use crate::core::probe::{self, Highlighter};
use crate::domain::model::{ElementId, ListEntry};
use crate::domain::ports::PageDriver;
use tokio::time::sleep;

/// How many backdrop clicks a close gets before giving up.
pub const CLOSE_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Open(ElementId),
    /// Nothing showed up in time; the entry has no detail view.
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// No overlay or no backdrop was present, nothing was clicked.
    AlreadyClosed,
    Closed { attempts: usize },
    StillOpen,
}

impl CloseOutcome {
    pub fn is_closed(self) -> bool {
        !matches!(self, CloseOutcome::StillOpen)
    }
}

/// Opens an entry's detail overlay and dismisses it again.
pub struct OverlayController<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    settings: &'a Settings,
    highlighter: Highlighter,
}

impl<'a, D: PageDriver + ?Sized> OverlayController<'a, D> {
    pub fn new(driver: &'a D, settings: &'a Settings) -> Self {
        Self {
            driver,
            settings,
            highlighter: Highlighter::new(settings.debug_highlight),
        }
    }

    fn locator(&self) -> OverlayLocator<'a, D> {
        OverlayLocator::new(self.driver, &self.settings.selectors)
    }

    /// Click `entry` and wait for an overlay to appear.
    pub async fn open(&self, entry: ListEntry) -> OpenOutcome {
        let timings = &self.settings.timings;
        let element = entry.element;

        self.highlighter
            .mark(self.driver, element, Highlighter::ENTRY)
            .await;
        if let Err(e) = self.driver.scroll_into_view(element).await {
            tracing::debug!("scroll into view failed: {}", e);
        }
        if let Err(e) = self.driver.focus(element).await {
            tracing::debug!("focus failed: {}", e);
        }
        tracing::debug!("clicking list entry {}", entry.index);
        if let Err(e) = self.driver.click(element).await {
            tracing::debug!("entry click failed: {}", e);
        }
        sleep(timings.wait_after_open_item).await;

        let locator = &self.locator();
        let found = poll_for(
            timings.modal_poll_interval,
            timings.overlay_open_timeout,
            move || locator.active_overlay(),
        )
        .await;

        self.highlighter.unmark(self.driver, element).await;

        match found {
            Some(overlay) => {
                tracing::info!("🪟 Overlay open for entry {}", entry.index);
                OpenOutcome::Open(overlay)
            }
            None => {
                tracing::info!("No overlay for entry {}, skipping", entry.index);
                OpenOutcome::Absent
            }
        }
    }

    /// Dismiss the active overlay by clicking the middle of its backdrop.
    ///
    /// Idempotent: with no overlay or backdrop present nothing is clicked.
    pub async fn close(&self) -> CloseOutcome {
        let locator = self.locator();
        let overlay = locator.active_overlay().await;
        let backdrop = locator.visible_backdrop().await;

        let (Some(overlay), Some(backdrop)) = (overlay, backdrop) else {
            tracing::debug!("close: no active overlay/backdrop, nothing to do");
            return CloseOutcome::AlreadyClosed;
        };

        for attempt in 1..=CLOSE_ATTEMPTS {
            self.click_center(backdrop).await;
            sleep(self.settings.timings.backdrop_click_gap).await;

            if self.wait_until_gone(overlay).await {
                tracing::info!("✅ Overlay closed via backdrop (attempt {})", attempt);
                return CloseOutcome::Closed { attempts: attempt };
            }
            tracing::debug!("overlay still open after attempt {}", attempt);
        }

        tracing::warn!("❌ Overlay stayed open after {} attempts", CLOSE_ATTEMPTS);
        CloseOutcome::StillOpen
    }

    /// Click whatever sits on top at the centre of `element`.
    async fn click_center(&self, element: ElementId) {
        let target = match self.driver.snapshot(element).await {
            Ok(Some(snapshot)) => {
                let (x, y) = snapshot.center();
                self.driver
                    .element_from_point(x, y)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or(element)
            }
            _ => element,
        };

        self.highlighter
            .mark(self.driver, target, Highlighter::CLICK_TARGET)
            .await;
        if let Err(e) = self.driver.dispatch_click(target).await {
            tracing::debug!("backdrop click failed: {}", e);
        }
        self.highlighter.unmark(self.driver, target).await;
    }

    async fn wait_until_gone(&self, overlay: ElementId) -> bool {
        let timings = &self.settings.timings;
        let driver = self.driver;
        poll_until(
            timings.close_poll_interval,
            timings.close_check_window,
            move || async move { !probe::is_visible(driver, Some(overlay)).await },
        )
        .await
    }
}
