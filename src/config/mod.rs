pub mod cli;
pub mod settings;
pub mod toml_config;

use crate::config::settings::Speed;
use crate::config::toml_config::BatchConfig;
use crate::domain::model::RunRange;
use crate::domain::ports::Preferences;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};

#[cfg(feature = "cli")]
use clap::Parser;

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "doc-batch-dl"))]
#[cfg_attr(
    feature = "cli",
    command(about = "Open every timeline entry in a running browser tab and download its documents")
)]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub config: Option<String>,

    /// DevTools endpoint, e.g. http://127.0.0.1:9222
    #[cfg_attr(feature = "cli", arg(long))]
    pub endpoint: Option<String>,

    /// Attach to the first tab whose URL contains this text
    #[cfg_attr(feature = "cli", arg(long))]
    pub page_match: Option<String>,

    /// First list index to process
    #[cfg_attr(feature = "cli", arg(long, allow_hyphen_values = true))]
    pub start: Option<i64>,

    /// Last list index to process, -1 for the end of the list
    #[cfg_attr(feature = "cli", arg(long, allow_hyphen_values = true))]
    pub end: Option<i64>,

    /// Scroll the list to load more entries
    #[cfg_attr(feature = "cli", arg(long))]
    pub auto_load: Option<bool>,

    #[cfg_attr(feature = "cli", arg(long, value_enum))]
    pub speed: Option<Speed>,

    /// Do not outline the elements being clicked
    #[cfg_attr(feature = "cli", arg(long))]
    pub no_highlight: bool,

    /// Where the last used start/end and toggles are remembered
    #[cfg_attr(feature = "cli", arg(long, default_value = ".doc-batch-prefs.json"))]
    pub prefs: String,

    /// Show what would be processed without clicking anything
    #[cfg_attr(feature = "cli", arg(long))]
    pub dry_run: bool,

    /// Write logs as JSON lines
    #[cfg_attr(feature = "cli", arg(long))]
    pub json_log: bool,

    #[cfg_attr(feature = "cli", arg(short, long, help = "Enable verbose output"))]
    pub verbose: bool,
}

/// Range and toggles a run starts with.
#[derive(Debug, Clone, PartialEq)]
pub struct RunChoice {
    pub range: RunRange,
    pub speed: Speed,
    pub auto_load: bool,
}

impl RunChoice {
    pub fn to_preferences(&self) -> Preferences {
        Preferences {
            start: self.range.start,
            end: self.range.end,
            auto_load: self.auto_load,
            slow_mode: self.speed.is_slow(),
        }
    }
}

impl CliConfig {
    /// 合併順序：命令列 > 上次保存的偏好 > 設定檔
    pub fn resolve(&self, config: &BatchConfig, stored: Option<&Preferences>) -> RunChoice {
        let range = RunRange {
            start: self
                .start
                .or(stored.map(|p| p.start))
                .unwrap_or(config.run.start),
            end: self
                .end
                .or(stored.map(|p| p.end))
                .unwrap_or(config.run.end),
        };

        let speed = self
            .speed
            .or(stored.map(|p| Speed::from_slow_mode(p.slow_mode)))
            .unwrap_or(config.behavior.speed);

        let auto_load = self
            .auto_load
            .or(stored.map(|p| p.auto_load))
            .unwrap_or(config.behavior.auto_load);

        RunChoice {
            range,
            speed,
            auto_load,
        }
    }

    /// Fold endpoint and highlight flags into the file config.
    pub fn apply_to(&self, config: &mut BatchConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.browser.endpoint = endpoint.clone();
        }
        if let Some(page_match) = &self.page_match {
            config.browser.page_match = page_match.clone();
        }
        if self.no_highlight {
            config.behavior.debug_highlight = false;
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            validation::validate_endpoint("--endpoint", endpoint)?;
        }
        if let Some(page_match) = &self.page_match {
            validation::validate_non_empty_string("--page-match", page_match)?;
        }
        validation::validate_non_empty_string("--prefs", &self.prefs)?;
        Ok(())
    }
}
