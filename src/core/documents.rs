use crate::config::settings::Settings;
use crate::core::probe::{self, Highlighter};
use crate::domain::ports::PageDriver;
use tokio::time::sleep;

/// Clicks every document link of the open overlay, one at a time.
pub struct DocumentActivator<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    settings: &'a Settings,
    highlighter: Highlighter,
}

impl<'a, D: PageDriver + ?Sized> DocumentActivator<'a, D> {
    pub fn new(driver: &'a D, settings: &'a Settings) -> Self {
        Self {
            driver,
            settings,
            highlighter: Highlighter::new(settings.debug_highlight),
        }
    }

    /// Activates the visible triggers in document order and returns how many.
    pub async fn activate_all_documents(&self) -> usize {
        let timings = &self.settings.timings;
        let found = self
            .driver
            .query_all(&self.settings.selectors.document_trigger)
            .await
            .unwrap_or_default();
        let triggers = probe::visible_only(self.driver, found).await;
        let total = triggers.len();
        tracing::info!("📄 {} document(s) found", total);

        let mut opened = 0;
        for (i, trigger) in triggers.into_iter().enumerate() {
            self.highlighter
                .mark(self.driver, trigger, Highlighter::DOCUMENT)
                .await;
            let _ = self.driver.scroll_into_view(trigger).await;
            let _ = self.driver.focus(trigger).await;
            sleep(timings.focus_delay).await;
            if let Err(e) = self.driver.click(trigger).await {
                tracing::debug!("document click failed: {}", e);
            }
            tracing::info!("→ document {}/{} clicked", i + 1, total);
            opened += 1;
            sleep(timings.wait_between_doc_clicks).await;
            self.highlighter.unmark(self.driver, trigger).await;
        }

        opened
    }
}
