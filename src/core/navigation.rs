use crate::config::settings::{Route, Settings};
use crate::core::probe;
use crate::domain::model::ElementId;
use crate::domain::ports::PageDriver;
use tokio::time::sleep;
use tracing::Instrument;

/// Keeps the host application on the tab the run started from.
///
/// The app likes to jump elsewhere after an overlay closes, so this is called
/// before every list query.
pub struct RouteGuard<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    settings: &'a Settings,
}

impl<'a, D: PageDriver + ?Sized> RouteGuard<'a, D> {
    pub fn new(driver: &'a D, settings: &'a Settings) -> Self {
        Self { driver, settings }
    }

    async fn on_route(&self, route: &Route) -> bool {
        match self.driver.current_path().await {
            Ok(path) => path == route.path,
            Err(e) => {
                tracing::debug!("could not read current path: {}", e);
                false
            }
        }
    }

    /// Visible tab control leading to `route`, by link target or caption.
    pub async fn find_tab_control(&self, route: &Route) -> Option<ElementId> {
        let candidates = self
            .driver
            .query_all(&self.settings.selectors.tab_candidates)
            .await
            .unwrap_or_default();

        for element in candidates {
            if !probe::is_visible(self.driver, Some(element)).await {
                continue;
            }
            let href = self
                .driver
                .attribute(element, "href")
                .await
                .ok()
                .flatten()
                .unwrap_or_default();
            if !href.is_empty() && href.ends_with(&route.path) {
                return Some(element);
            }
            let text = self.driver.text_content(element).await.unwrap_or_default();
            if text.trim() == route.label {
                return Some(element);
            }
        }
        None
    }

    /// Returns whether the app shows `route` afterwards.
    pub async fn ensure_active_route(&self, route: &Route) -> bool {
        if !self.settings.lock_route {
            return true;
        }
        if self.on_route(route).await {
            return true;
        }

        self.fix_route(route)
            .instrument(tracing::info_span!("route_fix", route = %route.path))
            .await
    }

    async fn fix_route(&self, route: &Route) -> bool {
        tracing::info!("↩️ Returning to {}", route.path);

        let settle = self.settings.timings.tab_fix_timeout;

        if let Some(tab) = self.find_tab_control(route).await {
            match self.driver.click(tab).await {
                Ok(()) => tracing::debug!("tab clicked"),
                Err(e) => tracing::debug!("tab click failed: {}", e),
            }
            sleep(settle).await;
            if self.on_route(route).await {
                return true;
            }
        }

        match self.driver.push_route(&route.path).await {
            Ok(()) => tracing::debug!("route set via history push"),
            Err(e) => {
                tracing::debug!("history push failed ({}), navigating", e);
                if let Err(e) = self.driver.assign_location(&route.path).await {
                    tracing::warn!("navigation to {} failed: {}", route.path, e);
                }
            }
        }
        sleep(settle).await;

        let fixed = self.on_route(route).await;
        if !fixed {
            tracing::warn!("⚠️ Still not on {}", route.path);
        }
        fixed
    }
}
