pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

#[cfg(feature = "cdp")]
pub use adapters::cdp::{CdpPage, CdpSession, CdpTabHook};

pub use adapters::status::ConsoleStatus;
pub use config::cli::LocalPreferences;
pub use config::settings::{Settings, Speed};
pub use config::toml_config::BatchConfig;
pub use core::engine::{BatchEngine, StopHandle};
pub use domain::model::{RunRange, RunReport, RunStatus};
pub use domain::ports::{PageDriver, PreferenceStore, Preferences, StatusSink, TabOpenHook};
pub use utils::error::{BatchError, Result};
