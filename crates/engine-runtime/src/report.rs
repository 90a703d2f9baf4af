use crate::error::SyncError;
use engine_core::metrics::MetricsSnapshot;
use model::core::identifiers::DatasetKey;
use serde::Serialize;
use std::fmt;

/// Lifecycle of one dataset within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Pending,
    Fetching,
    AppendingPublishing,
    Committed,
    Failed,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitState::Pending => "pending",
            UnitState::Fetching => "fetching",
            UnitState::AppendingPublishing => "appending_publishing",
            UnitState::Committed => "committed",
            UnitState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub dataset: DatasetKey,
    pub state: UnitState,
    pub rows_appended: usize,
    /// Cursor committed by this run, if it moved.
    pub cursor: Option<String>,
    pub url: Option<String>,
    pub error_kind: Option<&'static str>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl UnitReport {
    pub fn failed(err: &SyncError, elapsed_ms: u64) -> Self {
        UnitReport {
            dataset: err.key().clone(),
            state: UnitState::Failed,
            rows_appended: 0,
            cursor: None,
            url: None,
            error_kind: Some(err.kind()),
            error: Some(err.to_string()),
            elapsed_ms,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state == UnitState::Failed
    }

    /// Committed without appending anything.
    pub fn is_unchanged(&self) -> bool {
        self.state == UnitState::Committed && self.cursor.is_none()
    }
}

/// Outcome of one run, one entry per catalog dataset.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub units: Vec<UnitReport>,
    pub metrics: MetricsSnapshot,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn failed(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| u.is_failed())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn unit(&self, key: &DatasetKey) -> Option<&UnitReport> {
        self.units.iter().find(|u| &u.dataset == key)
    }

    pub fn rows_appended(&self) -> usize {
        self.units.iter().map(|u| u.rows_appended).sum()
    }
}
