use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Page driver error: {message}")]
    DriverError { message: String },

    #[error("Page script failed: {message}")]
    ScriptError { message: String },

    #[error("Browser connection error: {message}")]
    BrowserError { message: String },

    #[error("No page matching '{pattern}' is open in the browser")]
    PageNotFound { pattern: String },

    #[error("A batch run is already in progress")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, BatchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Browser,
    Page,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BatchError {
    pub fn script(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::BrowserError { .. } | Self::PageNotFound { .. } => ErrorCategory::Browser,
            Self::DriverError { .. } | Self::ScriptError { .. } | Self::AlreadyRunning => {
                ErrorCategory::Page
            }
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AlreadyRunning => ErrorSeverity::Low,
            Self::DriverError { .. } | Self::ScriptError { .. } => ErrorSeverity::Medium,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::PageNotFound { .. } => ErrorSeverity::High,
            Self::BrowserError { .. } | Self::IoError(_) | Self::SerializationError(_) => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the TOML config file and the command line flags",
            ErrorCategory::Browser => {
                "Start Chromium with --remote-debugging-port and open the timeline page"
            }
            ErrorCategory::Page => "Reload the timeline page and start the run again",
            ErrorCategory::System => "Check file permissions and free disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::PageNotFound { pattern } => {
                format!("No open tab matches '{}'. Open the timeline first.", pattern)
            }
            Self::AlreadyRunning => "A run is already in progress.".to_string(),
            Self::BrowserError { message } => format!("Could not talk to the browser: {}", message),
            other => other.to_string(),
        }
    }
}
