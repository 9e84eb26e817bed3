use crate::domain::model::{ElementId, ElementSnapshot, RunStatus};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Query and activation surface of the host page.
///
/// Every call reads the live document; nothing returned here is guaranteed to
/// stay valid after the caller awaits something else.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// All elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementId>>;

    /// Descendants of `root` matching `selector`, in document order.
    async fn query_within(&self, root: ElementId, selector: &str) -> Result<Vec<ElementId>>;

    /// `None` when the element is no longer attached to the document.
    async fn snapshot(&self, element: ElementId) -> Result<Option<ElementSnapshot>>;

    /// Parent element, `None` once `body` (or the root) is reached.
    async fn parent(&self, element: ElementId) -> Result<Option<ElementId>>;

    async fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>>;

    async fn text_content(&self, element: ElementId) -> Result<String>;

    async fn scroll_into_view(&self, element: ElementId) -> Result<()>;

    async fn focus(&self, element: ElementId) -> Result<()>;

    async fn click(&self, element: ElementId) -> Result<()>;

    /// Dispatch a synthetic bubbling `click` mouse event.
    async fn dispatch_click(&self, element: ElementId) -> Result<()>;

    async fn element_from_point(&self, x: f64, y: f64) -> Result<Option<ElementId>>;

    /// Set `scrollTop` to the maximum extent.
    async fn scroll_to_end(&self, element: ElementId) -> Result<()>;

    /// `document.scrollingElement` or the document element.
    async fn scrolling_root(&self) -> Result<ElementId>;

    /// Outline an element for debugging, `None` restores the previous outline.
    async fn set_outline(&self, element: ElementId, color: Option<&str>) -> Result<()>;

    async fn current_path(&self) -> Result<String>;

    /// `history.pushState` followed by a synthetic `popstate`.
    async fn push_route(&self, path: &str) -> Result<()>;

    /// Full page navigation.
    async fn assign_location(&self, path: &str) -> Result<()>;
}

/// Proof that the tab-open interception was installed by this run.
#[derive(Debug)]
#[must_use = "an installed interception has to be handed back to uninstall"]
pub struct InterceptionHandle {
    /// `false` when somebody else already hooked the page; uninstall is then a no-op.
    pub installed: bool,
}

/// Hook point for the page's "open new tab" mechanism.
#[async_trait]
pub trait TabOpenHook: Send + Sync {
    /// Start capturing new-tab requests.
    async fn install(&self) -> Result<InterceptionHandle>;

    /// Restore the page's original behaviour.
    async fn uninstall(&self, handle: InterceptionHandle) -> Result<()>;

    /// Open every captured request as a background tab, returns how many.
    async fn forward_pending(&self) -> Result<usize>;
}

/// Receives the status line while a run progresses.
pub trait StatusSink: Send + Sync {
    fn update(&self, status: &RunStatus);
}

/// Values the user chose last time, restored on the next session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub start: i64,
    pub end: i64,
    pub auto_load: bool,
    pub slow_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            start: 0,
            end: -1,
            auto_load: true,
            slow_mode: true,
        }
    }
}

pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> impl std::future::Future<Output = Result<Option<Preferences>>> + Send;
    fn save(&self, prefs: &Preferences) -> impl std::future::Future<Output = Result<()>> + Send;
}
