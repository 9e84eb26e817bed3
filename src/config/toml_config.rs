use crate::config::settings::{Route, RouteTable, Selectors, Settings, Speed, Timings};
use crate::domain::model::RunRange;
use crate::utils::error::{BatchError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub run: RunDefaults,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub selectors: Selectors,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub timings: TimingConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    pub start: i64,
    pub end: i64,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self { start: 0, end: -1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub auto_load: bool,
    pub speed: Speed,
    pub debug_highlight: bool,
    pub lock_route: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            auto_load: true,
            speed: Speed::Slow,
            debug_highlight: true,
            lock_route: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default)]
    pub slow: TimingOverrides,
    #[serde(default)]
    pub fast: TimingOverrides,
}

/// 只覆寫有填寫的欄位，其餘沿用內建值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingOverrides {
    pub wait_after_open_item_ms: Option<u64>,
    pub wait_between_doc_clicks_ms: Option<u64>,
    pub wait_after_close_overlay_ms: Option<u64>,
    pub after_each_item_pace_ms: Option<u64>,
    pub auto_scroll_delay_ms: Option<u64>,
    pub focus_delay_ms: Option<u64>,
    pub modal_poll_interval_ms: Option<u64>,
    pub close_check_window_ms: Option<u64>,
    pub backdrop_click_gap_ms: Option<u64>,
    pub overlay_open_timeout_ms: Option<u64>,
    pub close_poll_interval_ms: Option<u64>,
    pub tab_fix_timeout_ms: Option<u64>,
}

impl TimingOverrides {
    pub fn apply(&self, base: Timings) -> Timings {
        let pick = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_millis).unwrap_or(fallback)
        };

        Timings {
            wait_after_open_item: pick(self.wait_after_open_item_ms, base.wait_after_open_item),
            wait_between_doc_clicks: pick(
                self.wait_between_doc_clicks_ms,
                base.wait_between_doc_clicks,
            ),
            wait_after_close_overlay: pick(
                self.wait_after_close_overlay_ms,
                base.wait_after_close_overlay,
            ),
            after_each_item_pace: pick(self.after_each_item_pace_ms, base.after_each_item_pace),
            auto_scroll_delay: pick(self.auto_scroll_delay_ms, base.auto_scroll_delay),
            focus_delay: pick(self.focus_delay_ms, base.focus_delay),
            modal_poll_interval: pick(self.modal_poll_interval_ms, base.modal_poll_interval),
            close_check_window: pick(self.close_check_window_ms, base.close_check_window),
            backdrop_click_gap: pick(self.backdrop_click_gap_ms, base.backdrop_click_gap),
            overlay_open_timeout: pick(self.overlay_open_timeout_ms, base.overlay_open_timeout),
            close_poll_interval: pick(self.close_poll_interval_ms, base.close_poll_interval),
            tab_fix_timeout: pick(self.tab_fix_timeout_ms, base.tab_fix_timeout),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// DevTools endpoint of the running browser.
    pub endpoint: String,
    /// Substring of the tab URL to attach to.
    pub page_match: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9222".to_string(),
            page_match: "app.traderepublic.com".to_string(),
        }
    }
}

impl BatchConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BatchError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BatchError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CDP_ENDPOINT})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BatchError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn route_table(&self) -> RouteTable {
        if self.routes.is_empty() {
            RouteTable::default()
        } else {
            RouteTable::new(self.routes.clone())
        }
    }

    pub fn timings(&self, speed: Speed) -> Timings {
        match speed {
            Speed::Slow => self.timings.slow.apply(Timings::slow()),
            Speed::Fast => self.timings.fast.apply(Timings::fast()),
        }
    }

    pub fn default_range(&self) -> RunRange {
        RunRange {
            start: self.run.start,
            end: self.run.end,
        }
    }

    /// Effective settings once the user's toggles are known.
    pub fn settings(&self, speed: Speed, auto_load: bool) -> Settings {
        Settings {
            selectors: self.selectors.clone(),
            timings: self.timings(speed),
            routes: self.route_table(),
            auto_load,
            debug_highlight: self.behavior.debug_highlight,
            lock_route: self.behavior.lock_route,
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_endpoint("browser.endpoint", &self.browser.endpoint)?;

        let selectors = [
            ("selectors.list_item", &self.selectors.list_item),
            ("selectors.document_trigger", &self.selectors.document_trigger),
            ("selectors.overlay", &self.selectors.overlay),
            ("selectors.close_control", &self.selectors.close_control),
            ("selectors.backdrop", &self.selectors.backdrop),
            ("selectors.tab_candidates", &self.selectors.tab_candidates),
        ];
        for (field, value) in selectors {
            validation::validate_non_empty_string(field, value)?;
        }

        for route in &self.routes {
            validation::validate_route_path("routes.path", &route.path)?;
            validation::validate_non_empty_string("routes.label", &route.label)?;
        }

        for speed in [Speed::Slow, Speed::Fast] {
            let timings = self.timings(speed);
            validation::validate_positive_number(
                "timings.modal_poll_interval_ms",
                timings.modal_poll_interval.as_millis() as u64,
                1,
            )?;
            validation::validate_positive_number(
                "timings.close_poll_interval_ms",
                timings.close_poll_interval.as_millis() as u64,
                1,
            )?;
            validation::validate_range(
                "timings.overlay_open_timeout_ms",
                timings.overlay_open_timeout.as_millis() as u64,
                timings.modal_poll_interval.as_millis() as u64,
                600_000,
            )?;
        }

        Ok(())
    }
}

impl Validate for BatchConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
