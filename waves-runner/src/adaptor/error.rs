//! Adaptor errors

use thiserror::Error;
use waves_core::domain::JobStatus;

use crate::adaptor::config::ConfigError;

/// How the lifecycle should react to a failed adaptor operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backend fault, worth another attempt
    Transient,
    /// Retrying cannot help
    Permanent,
    /// The action was not legal for the job's status
    PreconditionViolation,
}

#[derive(Debug, Error)]
pub enum AdaptorError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Job(String),

    #[error("adaptor not ready, missing: {}", .0.join(", "))]
    NotReady(Vec<String>),

    #[error("adaptor not available: {0}")]
    NotAvailable(String),

    #[error("job status is '{current}', expected {expected}")]
    InconsistentState {
        current: JobStatus,
        expected: &'static str,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdaptorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdaptorError::Connect(_) | AdaptorError::Job(_) => ErrorKind::Transient,
            AdaptorError::InconsistentState { .. } => ErrorKind::PreconditionViolation,
            AdaptorError::NotReady(_)
            | AdaptorError::NotAvailable(_)
            | AdaptorError::Config(_)
            | AdaptorError::Io(_) => ErrorKind::Permanent,
        }
    }

    pub fn job(message: impl Into<String>) -> Self {
        AdaptorError::Job(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(AdaptorError::Connect("refused".into()).kind(), ErrorKind::Transient);
        assert_eq!(AdaptorError::job("qsub failed").kind(), ErrorKind::Transient);
        assert_eq!(
            AdaptorError::NotReady(vec!["host".into()]).kind(),
            ErrorKind::Permanent
        );
        assert_eq!(
            AdaptorError::InconsistentState {
                current: JobStatus::Queued,
                expected: "Prepared",
            }
            .kind(),
            ErrorKind::PreconditionViolation
        );
    }

    #[test]
    fn test_not_ready_message_lists_params() {
        let err = AdaptorError::NotReady(vec!["host".into(), "user".into()]);
        assert_eq!(err.to_string(), "adaptor not ready, missing: host, user");
    }
}
