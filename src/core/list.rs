use crate::config::settings::Settings;
use crate::domain::model::{ElementId, ListEntry};
use crate::domain::ports::PageDriver;
use crate::utils::error::Result;
use tokio::time::sleep;

/// Enumerates timeline rows and nudges the page to render more of them.
pub struct ListProvider<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    settings: &'a Settings,
}

fn is_scrollable(overflow_y: &str) -> bool {
    matches!(overflow_y, "auto" | "scroll" | "overlay")
}

impl<'a, D: PageDriver + ?Sized> ListProvider<'a, D> {
    pub fn new(driver: &'a D, settings: &'a Settings) -> Self {
        Self { driver, settings }
    }

    /// Row selector with document triggers filtered out by the page itself.
    fn entry_selector(&self) -> String {
        let selectors = &self.settings.selectors;
        format!("{}:not({})", selectors.list_item, selectors.document_trigger)
    }

    /// Current rows in document order, document triggers excluded.
    pub async fn list_entries(&self) -> Result<Vec<ListEntry>> {
        let elements = self.driver.query_all(&self.entry_selector()).await?;
        Ok(elements
            .into_iter()
            .enumerate()
            .map(|(index, element)| ListEntry { index, element })
            .collect())
    }

    /// Nearest scrollable ancestor of the first row, else the document scroller.
    pub async fn find_scroll_container(&self) -> Result<ElementId> {
        let first = self
            .driver
            .query_all(&self.entry_selector())
            .await?
            .into_iter()
            .next();
        let mut current = match first {
            Some(element) => self.driver.parent(element).await?,
            None => None,
        };
        while let Some(element) = current {
            if let Some(snapshot) = self.driver.snapshot(element).await? {
                if is_scrollable(&snapshot.overflow_y)
                    && snapshot.scroll_height > snapshot.client_height
                {
                    return Ok(element);
                }
            }
            current = self.driver.parent(element).await?;
        }
        self.driver.scrolling_root().await
    }

    /// Scroll `container` to the bottom so the page lazy-loads more rows.
    ///
    /// Best effort only, callers re-query and accept an unchanged count.
    pub async fn auto_load_more(&self, container: Option<ElementId>) {
        let Some(container) = container else {
            return;
        };
        if !self.settings.auto_load {
            return;
        }

        tracing::info!("📜 Loading more entries");
        if let Err(e) = self.driver.scroll_to_end(container).await {
            tracing::debug!("scrolling {} failed: {}", container, e);
        }
        sleep(self.settings.timings.auto_scroll_delay).await;
    }
}
