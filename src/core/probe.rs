use crate::domain::model::{ElementId, ElementSnapshot};
use crate::domain::ports::PageDriver;

/// Rendered with a non-zero box and not hidden by style.
pub fn is_rendered(snapshot: Option<&ElementSnapshot>) -> bool {
    match snapshot {
        Some(s) => {
            s.width > 0.0 && s.height > 0.0 && s.display != "none" && s.visibility != "hidden"
        }
        None => false,
    }
}

/// Live visibility check. Lookup failures count as invisible.
pub async fn is_visible<D: PageDriver + ?Sized>(driver: &D, element: Option<ElementId>) -> bool {
    let Some(element) = element else {
        return false;
    };
    match driver.snapshot(element).await {
        Ok(snapshot) => is_rendered(snapshot.as_ref()),
        Err(e) => {
            tracing::debug!("visibility probe failed for {}: {}", element, e);
            false
        }
    }
}

/// Visible subset of `elements`, order preserved.
pub async fn visible_only<D: PageDriver + ?Sized>(
    driver: &D,
    elements: Vec<ElementId>,
) -> Vec<ElementId> {
    let mut visible = Vec::with_capacity(elements.len());
    for element in elements {
        if is_visible(driver, Some(element)).await {
            visible.push(element);
        }
    }
    visible
}

/// Debug outlines. Purely visual, failures are ignored.
#[derive(Debug, Clone, Copy)]
pub struct Highlighter {
    enabled: bool,
}

impl Highlighter {
    pub const ENTRY: &'static str = "orange";
    pub const DOCUMENT: &'static str = "magenta";
    pub const CLICK_TARGET: &'static str = "red";

    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub async fn mark<D: PageDriver + ?Sized>(&self, driver: &D, element: ElementId, color: &str) {
        if self.enabled {
            let _ = driver.set_outline(element, Some(color)).await;
        }
    }

    pub async fn unmark<D: PageDriver + ?Sized>(&self, driver: &D, element: ElementId) {
        if self.enabled {
            let _ = driver.set_outline(element, None).await;
        }
    }
}
