//! Pagination state persisted between invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of a cursor table.
///
/// An empty `continuation_token` on a stored row means the query run is
/// complete; a missing row means no run was ever started.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CursorState {
    /// Assigned by the cursor store on insert; doubles as the batch id
    pub id: u64,

    /// Records fetched across every cycle of this run
    pub total_fetched: u64,

    /// Token for the next page, empty when the run is complete
    #[serde(default)]
    pub continuation_token: String,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CursorState {
    /// Whether the source reported no further pages for this run.
    pub fn is_complete(&self) -> bool {
        self.continuation_token.is_empty()
    }
}

/// Where a fetch cycle starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePoint {
    /// No run in flight; a new cursor row will be created.
    Fresh,
    /// Continue an in-flight run.
    Resume {
        id: u64,
        token: String,
        total_fetched: u64,
    },
}

impl ResumePoint {
    /// Resolve the starting point from the latest stored row.
    ///
    /// A completed row starts a fresh run rather than resuming.
    pub fn from_latest(latest: Option<&CursorState>) -> Self {
        match latest {
            Some(state) if !state.is_complete() => ResumePoint::Resume {
                id: state.id,
                token: state.continuation_token.clone(),
                total_fetched: state.total_fetched,
            },
            _ => ResumePoint::Fresh,
        }
    }

    /// Token to request the first page of this cycle with.
    pub fn token(&self) -> &str {
        match self {
            ResumePoint::Fresh => "",
            ResumePoint::Resume { token, .. } => token,
        }
    }

    pub fn total_fetched(&self) -> u64 {
        match self {
            ResumePoint::Fresh => 0,
            ResumePoint::Resume { total_fetched, .. } => *total_fetched,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, ResumePoint::Fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: u64, token: &str) -> CursorState {
        let now = Utc::now();
        CursorState {
            id,
            total_fetched: 10,
            continuation_token: token.to_string(),
            started_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_missing_row_is_fresh() {
        assert_eq!(ResumePoint::from_latest(None), ResumePoint::Fresh);
    }

    #[test]
    fn test_completed_row_is_fresh() {
        let done = state(3, "");
        assert!(done.is_complete());
        assert_eq!(ResumePoint::from_latest(Some(&done)), ResumePoint::Fresh);
    }

    #[test]
    fn test_in_flight_row_resumes() {
        let running = state(3, "abc");
        let point = ResumePoint::from_latest(Some(&running));
        assert_eq!(point.token(), "abc");
        assert_eq!(point.total_fetched(), 10);
        assert!(!point.is_fresh());
    }
}
