use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pacing profile. Both run the same algorithm, only the delays differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    #[default]
    Slow,
    Fast,
}

impl Speed {
    pub fn from_slow_mode(slow_mode: bool) -> Self {
        if slow_mode {
            Speed::Slow
        } else {
            Speed::Fast
        }
    }

    pub fn is_slow(self) -> bool {
        self == Speed::Slow
    }
}

/// CSS selector sets used to find things in the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub list_item: String,
    pub document_trigger: String,
    pub overlay: String,
    pub close_control: String,
    pub backdrop: String,
    pub tab_candidates: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            list_item: ".clickable.timelineEventAction:not(.detailDocuments__action)".to_string(),
            document_trigger: ".clickable.timelineEventAction.detailDocuments__action".to_string(),
            overlay: ".sideModal, [class*=\"sideModal\"], [role=\"dialog\"], .modal, [class*=\"Modal\"]"
                .to_string(),
            close_control: "button.closeButton.sideModal__close, .closeButton.sideModal__close, .sideModal__close, [aria-label=\"Close\"], [aria-label=\"Schließen\"]"
                .to_string(),
            backdrop: ".sideModal__backdrop, .barrier.-sideModal, [class*=\"backdrop\"]".to_string(),
            tab_candidates: "a[href], button, [role=\"tab\"], [data-qa*=\"tab\"]".to_string(),
        }
    }
}

/// Every wait the batch loop performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub wait_after_open_item: Duration,
    pub wait_between_doc_clicks: Duration,
    pub wait_after_close_overlay: Duration,
    pub after_each_item_pace: Duration,
    pub auto_scroll_delay: Duration,
    pub focus_delay: Duration,
    pub modal_poll_interval: Duration,
    pub close_check_window: Duration,
    pub backdrop_click_gap: Duration,
    pub overlay_open_timeout: Duration,
    pub close_poll_interval: Duration,
    pub tab_fix_timeout: Duration,
}

impl Timings {
    pub fn slow() -> Self {
        Self {
            wait_after_open_item: Duration::from_millis(900),
            wait_between_doc_clicks: Duration::from_millis(900),
            wait_after_close_overlay: Duration::from_millis(900),
            after_each_item_pace: Duration::from_millis(120),
            auto_scroll_delay: Duration::from_millis(500),
            focus_delay: Duration::from_millis(80),
            modal_poll_interval: Duration::from_millis(50),
            close_check_window: Duration::from_millis(500),
            backdrop_click_gap: Duration::from_millis(80),
            overlay_open_timeout: Duration::from_millis(5000),
            close_poll_interval: Duration::from_millis(40),
            tab_fix_timeout: Duration::from_millis(800),
        }
    }

    pub fn fast() -> Self {
        Self {
            wait_after_open_item: Duration::from_millis(300),
            wait_between_doc_clicks: Duration::from_millis(220),
            wait_after_close_overlay: Duration::from_millis(300),
            after_each_item_pace: Duration::from_millis(60),
            auto_scroll_delay: Duration::from_millis(300),
            focus_delay: Duration::from_millis(40),
            modal_poll_interval: Duration::from_millis(40),
            close_check_window: Duration::from_millis(300),
            backdrop_click_gap: Duration::from_millis(60),
            ..Self::slow()
        }
    }

    pub fn for_speed(speed: Speed) -> Self {
        match speed {
            Speed::Slow => Self::slow(),
            Speed::Fast => Self::fast(),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::slow()
    }
}

/// A logical tab of the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    /// Visible caption of the tab control leading to `path`.
    pub label: String,
}

impl Route {
    pub fn new(path: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }

    /// 路徑最後一段，例如 `/activities`
    fn tail(&self) -> &str {
        match self.path.rfind('/') {
            Some(pos) => &self.path[pos..],
            None => &self.path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// The first route is the fallback when the current location matches none.
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Route the run should stay on, derived from where the browser is now.
    pub fn desired_for(&self, current_path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| current_path.contains(route.tail()))
            .or_else(|| self.routes.first())
    }

    pub fn is_eligible(&self, current_path: &str) -> bool {
        let trimmed = current_path.trim_end_matches('/');
        self.routes.iter().any(|route| route.path == trimmed)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![
            Route::new("/profile/transactions", "Transaktionen"),
            Route::new("/profile/activities", "Aktivität"),
        ])
    }
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub selectors: Selectors,
    pub timings: Timings,
    pub routes: RouteTable,
    pub auto_load: bool,
    pub debug_highlight: bool,
    pub lock_route: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selectors: Selectors::default(),
            timings: Timings::slow(),
            routes: RouteTable::default(),
            auto_load: true,
            debug_highlight: true,
            lock_route: true,
        }
    }
}
