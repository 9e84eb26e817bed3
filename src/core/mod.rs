pub mod documents;
pub mod engine;
pub mod list;
pub mod locator;
pub mod navigation;
pub mod overlay;
pub mod poll;
pub mod probe;

pub use crate::domain::model::{ElementId, ListEntry, RunRange, RunReport, RunStatus};
pub use crate::domain::ports::{PageDriver, StatusSink, TabOpenHook};
pub use crate::utils::error::Result;
pub use engine::{BatchEngine, StopHandle};
