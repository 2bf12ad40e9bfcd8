//! Canonical job status
//!
//! Every backend's native state vocabulary is mapped into this enum. The
//! numeric codes are part of the persisted contract with the web layer and
//! the ordering is significant: legality checks compare statuses directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical job status, ordered by lifecycle progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
#[repr(i8)]
pub enum JobStatus {
    Undefined = -1,
    Created = 0,
    Prepared = 1,
    Queued = 2,
    Running = 3,
    Suspended = 4,
    /// Run completed remotely, results not yet retrieved
    Completed = 5,
    /// Results retrieved
    Finished = 6,
    Cancelled = 7,
    /// Exit code 0 but the job wrote to stderr
    Warning = 8,
    Error = 9,
}

impl JobStatus {
    /// All statuses in canonical order
    pub const ALL: [JobStatus; 11] = [
        JobStatus::Undefined,
        JobStatus::Created,
        JobStatus::Prepared,
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Suspended,
        JobStatus::Completed,
        JobStatus::Finished,
        JobStatus::Cancelled,
        JobStatus::Warning,
        JobStatus::Error,
    ];

    /// Numeric code shared with the datastore
    pub fn code(self) -> i8 {
        self as i8
    }

    /// Looks a status up by numeric code
    pub fn from_code(code: i8) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    /// Human readable label, as shown to end users
    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Undefined => "Undefined",
            JobStatus::Created => "Created",
            JobStatus::Prepared => "Prepared",
            JobStatus::Queued => "Queued",
            JobStatus::Running => "Running",
            JobStatus::Suspended => "Suspended",
            JobStatus::Completed => "Run completed, pending data retrieval",
            JobStatus::Finished => "Results data retrieved",
            JobStatus::Cancelled => "Cancelled",
            JobStatus::Warning => "Warnings",
            JobStatus::Error => "Error",
        }
    }

    /// Whether the reconciliation loop still has work to do for this status
    pub fn is_pending(self) -> bool {
        self < JobStatus::Finished
    }

    /// Terminal statuses never change again
    pub fn is_terminal(self) -> bool {
        !self.is_pending()
    }

    /// A job can be cancelled until it has finished running
    pub fn is_cancellable(self) -> bool {
        self <= JobStatus::Suspended
    }

    /// The status a successful step moves to, if the step is part of the
    /// forward path
    pub fn next(self) -> Option<JobStatus> {
        match self {
            JobStatus::Created => Some(JobStatus::Prepared),
            JobStatus::Prepared => Some(JobStatus::Queued),
            JobStatus::Queued => Some(JobStatus::Running),
            JobStatus::Running => Some(JobStatus::Completed),
            JobStatus::Completed => Some(JobStatus::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<JobStatus> for i8 {
    fn from(status: JobStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i8> for JobStatus {
    type Error = String;

    fn try_from(code: i8) -> Result<Self, String> {
        JobStatus::from_code(code).ok_or_else(|| format!("unknown job status code {}", code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_matches_codes() {
        for pair in JobStatus::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].code() < pair[1].code());
        }
        assert_eq!(JobStatus::Undefined.code(), -1);
        assert_eq!(JobStatus::Error.code(), 9);
    }

    #[test]
    fn test_cancellable_and_pending() {
        assert!(JobStatus::Suspended.is_cancellable());
        assert!(!JobStatus::Completed.is_cancellable());
        assert!(JobStatus::Completed.is_pending());
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Warning.is_terminal());
    }

    #[test]
    fn test_serializes_as_code() {
        let json = serde_json::to_string(&JobStatus::Queued).unwrap();
        assert_eq!(json, "2");

        let status: JobStatus = serde_json::from_str("-1").unwrap();
        assert_eq!(status, JobStatus::Undefined);

        assert!(serde_json::from_str::<JobStatus>("42").is_err());
    }

    #[test]
    fn test_try_from_code() {
        assert_eq!(JobStatus::try_from(9), Ok(JobStatus::Error));
        assert_eq!(JobStatus::try_from(-1), Ok(JobStatus::Undefined));
        assert_eq!(
            JobStatus::try_from(42),
            Err("unknown job status code 42".to_string())
        );
        assert_eq!(i8::from(JobStatus::Finished), 6);
    }

    #[test]
    fn test_next_follows_forward_path() {
        assert_eq!(JobStatus::Created.next(), Some(JobStatus::Prepared));
        assert_eq!(JobStatus::Completed.next(), Some(JobStatus::Finished));
        assert_eq!(JobStatus::Suspended.next(), None);
    }
}
