use crate::domain::model::RunStatus;
use crate::domain::ports::StatusSink;
use std::sync::Mutex;

/// Prints the status line to stdout and mirrors it into the log.
#[derive(Debug, Default)]
pub struct ConsoleStatus {
    last: Mutex<Option<String>>,
}

impl ConsoleStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent status text.
    pub fn last(&self) -> Option<String> {
        self.last.lock().ok().and_then(|last| last.clone())
    }
}

impl StatusSink for ConsoleStatus {
    fn update(&self, status: &RunStatus) {
        let text = status.to_string();
        tracing::debug!(status = %text, "status");
        println!("{}", text);
        if let Ok(mut last) = self.last.lock() {
            *last = Some(text);
        }
    }
}
