use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to an element living in the host page.
///
/// Handles are only meaningful until the next suspension point; the page may
/// re-render at any time, so callers re-query instead of caching them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Geometry and computed style of a connected element at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub display: String,
    pub visibility: String,
    #[serde(default)]
    pub overflow_y: String,
    #[serde(default)]
    pub scroll_height: f64,
    #[serde(default)]
    pub client_height: f64,
}

impl ElementSnapshot {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// 中心點（向下取整，與瀏覽器座標一致）
    pub fn center(&self) -> (f64, f64) {
        (
            (self.left + self.width / 2.0).floor(),
            (self.top + self.height / 2.0).floor(),
        )
    }
}

/// One row of the timeline list, positioned within a single enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntry {
    pub index: usize,
    pub element: ElementId,
}

/// Requested index window. `end < 0` stands for "last available entry".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRange {
    pub start: i64,
    pub end: i64,
}

impl Default for RunRange {
    fn default() -> Self {
        Self { start: 0, end: -1 }
    }
}

/// Range after clamping against the number of loaded entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedRange {
    pub start: usize,
    pub end: usize,
}

impl ResolvedRange {
    /// Number of entries in the window, never zero.
    pub fn count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

impl RunRange {
    /// Clamp the window against `available` entries.
    ///
    /// Returns the clamped `(start, end)` pair as an error when the window is
    /// empty so the caller can report it.
    pub fn resolve(&self, available: usize) -> Result<ResolvedRange, (i64, i64)> {
        let last = available as i64 - 1;
        let start = self.start.max(0);
        let end = if self.end < 0 { last } else { self.end.min(last) };

        if available == 0 || start > end {
            return Err((start, end));
        }

        Ok(ResolvedRange {
            start: start as usize,
            end: end as usize,
        })
    }
}

/// What happened to one list index during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Entry was not rendered, even after a load-more pass.
    NotLoaded,
    /// Clicking the entry produced no overlay.
    NoOverlay,
    Processed { documents: usize, closed: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub index: usize,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Stopped,
    InvalidRange { start: i64, end: i64 },
    NoEntries,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub desired_route: String,
    pub range: Option<ResolvedRange>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
    pub items: Vec<ItemReport>,
    pub tabs_forwarded: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn visited_indices(&self) -> Vec<usize> {
        self.items.iter().map(|item| item.index).collect()
    }

    pub fn documents_total(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item.outcome {
                ItemOutcome::Processed { documents, .. } => documents,
                _ => 0,
            })
            .sum()
    }

    pub fn skipped(&self) -> Vec<&ItemReport> {
        self.items
            .iter()
            .filter(|item| !matches!(item.outcome, ItemOutcome::Processed { .. }))
            .collect()
    }

    pub fn item(&self, index: usize) -> Option<&ItemReport> {
        self.items.iter().find(|item| item.index == index)
    }
}

/// The single status line shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Searching,
    Opening { index: usize, end: usize },
    NoOverlay { index: usize, end: usize },
    OpeningDocuments { index: usize, end: usize },
    Closing { index: usize, end: usize },
    ItemDone { index: usize, end: usize, documents: usize },
    StopRequested,
    Completed,
    Stopped,
    InvalidRange { start: i64, end: i64 },
    NoEntries,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Stopped | Self::InvalidRange { .. } | Self::NoEntries
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Searching => write!(f, "Searching list entries ..."),
            Self::Opening { index, end } => write!(f, "({}/{}) Opening entry ...", index, end),
            Self::NoOverlay { index, end } => write!(f, "({}/{}) No overlay, skipped", index, end),
            Self::OpeningDocuments { index, end } => {
                write!(f, "({}/{}) Opening documents ...", index, end)
            }
            Self::Closing { index, end } => write!(f, "({}/{}) Closing overlay ...", index, end),
            Self::ItemDone {
                index,
                end,
                documents,
            } => write!(f, "({}/{}) Done, {} document(s)", index, end, documents),
            Self::StopRequested => write!(f, "Stop requested ..."),
            Self::Completed => write!(f, "Run completed"),
            Self::Stopped => write!(f, "Stopped"),
            Self::InvalidRange { start, end } => {
                write!(f, "Invalid range ({} > {})", start, end)
            }
            Self::NoEntries => write!(f, "No entries found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_end_resolves_to_last_entry() {
        let range = RunRange { start: 0, end: -1 };
        assert_eq!(range.resolve(5), Ok(ResolvedRange { start: 0, end: 4 }));
    }

    #[test]
    fn test_end_is_clamped_to_last_entry() {
        let range = RunRange { start: 2, end: 40 };
        assert_eq!(range.resolve(5), Ok(ResolvedRange { start: 2, end: 4 }));
    }

    #[test]
    fn test_negative_start_is_clamped_to_zero() {
        let range = RunRange { start: -3, end: 1 };
        assert_eq!(range.resolve(5), Ok(ResolvedRange { start: 0, end: 1 }));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let range = RunRange { start: 3, end: 1 };
        assert_eq!(range.resolve(5), Err((3, 1)));
    }

    #[test]
    fn test_start_past_loaded_entries_is_rejected() {
        let range = RunRange { start: 7, end: -1 };
        assert_eq!(range.resolve(5), Err((7, 4)));
    }

    #[test]
    fn test_resolved_range_never_inverted() {
        for available in 0..6usize {
            for start in -2..8i64 {
                for end in -2..8i64 {
                    if let Ok(resolved) = (RunRange { start, end }).resolve(available) {
                        assert!(resolved.start <= resolved.end);
                        assert!(resolved.end < available);
                        assert_eq!(resolved.count(), resolved.indices().count());
                        assert!(resolved.count() >= 1);
                    }
                }
            }
        }
    }

    #[test]
    fn test_snapshot_center_is_floored() {
        let snap = ElementSnapshot {
            left: 10.0,
            top: 0.0,
            width: 101.0,
            height: 51.0,
            display: "block".to_string(),
            visibility: "visible".to_string(),
            overflow_y: String::new(),
            scroll_height: 0.0,
            client_height: 0.0,
        };
        assert_eq!(snap.center(), (60.0, 25.0));
    }

    #[test]
    fn test_status_line_text() {
        let status = RunStatus::ItemDone {
            index: 1,
            end: 4,
            documents: 3,
        };
        assert_eq!(status.to_string(), "(1/4) Done, 3 document(s)");
        assert!(RunStatus::Stopped.is_terminal());
        assert!(!status.is_terminal());
    }
}
