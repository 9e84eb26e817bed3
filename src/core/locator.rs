use crate::config::settings::Selectors;
use crate::core::probe;
use crate::domain::model::ElementId;
use crate::domain::ports::PageDriver;

/// Bonus that makes any panel with a close control beat a larger one without.
pub const CLOSE_CONTROL_BONUS: f64 = 1e6;

/// What the scorer needs to know about one overlay candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayCandidate<T> {
    pub element: T,
    pub area: f64,
    pub has_close_control: bool,
}

impl<T> OverlayCandidate<T> {
    pub fn score(&self) -> f64 {
        self.area
            + if self.has_close_control {
                CLOSE_CONTROL_BONUS
            } else {
                0.0
            }
    }
}

/// Highest score wins, the earliest candidate keeps a tie.
pub fn pick_best<T: Copy>(candidates: &[OverlayCandidate<T>]) -> Option<T> {
    let mut best: Option<&OverlayCandidate<T>> = None;
    for candidate in candidates {
        match best {
            Some(current) if candidate.score() <= current.score() => {}
            _ => best = Some(candidate),
        }
    }
    best.map(|c| c.element)
}

/// Finds the overlay that is actually in front of the user.
pub struct OverlayLocator<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    selectors: &'a Selectors,
}

impl<'a, D: PageDriver + ?Sized> OverlayLocator<'a, D> {
    pub fn new(driver: &'a D, selectors: &'a Selectors) -> Self {
        Self { driver, selectors }
    }

    pub async fn active_overlay(&self) -> Option<ElementId> {
        let elements = match self.driver.query_all(&self.selectors.overlay).await {
            Ok(elements) => elements,
            Err(e) => {
                tracing::debug!("overlay query failed: {}", e);
                return None;
            }
        };

        let mut candidates = Vec::new();
        for element in elements {
            let Ok(Some(snapshot)) = self.driver.snapshot(element).await else {
                continue;
            };
            if !probe::is_rendered(Some(&snapshot)) {
                continue;
            }
            let has_close_control = self
                .driver
                .query_within(element, &self.selectors.close_control)
                .await
                .map(|found| !found.is_empty())
                .unwrap_or(false);
            candidates.push(OverlayCandidate {
                element,
                area: snapshot.area(),
                has_close_control,
            });
        }

        pick_best(&candidates)
    }

    /// First visible backdrop layer, if any.
    pub async fn visible_backdrop(&self) -> Option<ElementId> {
        let elements = self
            .driver
            .query_all(&self.selectors.backdrop)
            .await
            .unwrap_or_default();
        for element in elements {
            if probe::is_visible(self.driver, Some(element)).await {
                return Some(element);
            }
        }
        None
    }
}
