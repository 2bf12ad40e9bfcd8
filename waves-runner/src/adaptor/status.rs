//! Native status mapping
//!
//! Each backend declares a static table translating its own state vocabulary
//! into the canonical [`JobStatus`]. Tables must carry an explicit `UNKNOWN`
//! entry and never list the same native state twice.

use waves_core::domain::JobStatus;

/// Native state name every table maps to `Undefined`
pub const UNKNOWN: &str = "UNKNOWN";

/// Translation table from native backend states to canonical statuses
#[derive(Debug, Clone, Copy)]
pub struct StatusMap {
    entries: &'static [(&'static str, JobStatus)],
}

impl StatusMap {
    pub const fn new(entries: &'static [(&'static str, JobStatus)]) -> Self {
        Self { entries }
    }

    /// Maps a native state; states missing from the table are `Undefined`
    pub fn map(&self, native: &str) -> JobStatus {
        let native = native.trim();
        self.entries
            .iter()
            .find(|(name, _)| *name == native)
            .map(|(_, status)| *status)
            .unwrap_or(JobStatus::Undefined)
    }

    pub fn entries(&self) -> &'static [(&'static str, JobStatus)] {
        self.entries
    }

    /// Checks the table is well formed, returning the offending state if not
    pub fn check(&self) -> Result<(), String> {
        if self.map(UNKNOWN) != JobStatus::Undefined
            || !self.entries.iter().any(|(name, _)| *name == UNKNOWN)
        {
            return Err(format!("{} must map to Undefined", UNKNOWN));
        }
        for (i, (name, _)) in self.entries.iter().enumerate() {
            if self.entries[..i].iter().any(|(other, _)| other == name) {
                return Err(format!("duplicate native state '{}'", name));
            }
        }
        Ok(())
    }
}

/// States reported by the job launcher for shell backends
pub const SHELL_STATES: StatusMap = StatusMap::new(&[
    (UNKNOWN, JobStatus::Undefined),
    ("NEW", JobStatus::Queued),
    ("PENDING", JobStatus::Queued),
    ("RUNNING", JobStatus::Running),
    ("SUSPENDED", JobStatus::Suspended),
    ("CANCELED", JobStatus::Cancelled),
    ("DONE", JobStatus::Completed),
    ("FAILED", JobStatus::Error),
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_states_are_well_formed() {
        assert_eq!(SHELL_STATES.check(), Ok(()));
        assert_eq!(SHELL_STATES.map("DONE"), JobStatus::Completed);
        assert_eq!(SHELL_STATES.map(" RUNNING\n"), JobStatus::Running);
        assert_eq!(SHELL_STATES.map("bogus"), JobStatus::Undefined);
    }

    #[test]
    fn test_check_rejects_duplicates_and_missing_unknown() {
        const DUPLICATED: StatusMap = StatusMap::new(&[
            (UNKNOWN, JobStatus::Undefined),
            ("R", JobStatus::Running),
            ("R", JobStatus::Queued),
        ]);
        assert!(DUPLICATED.check().is_err());

        const NO_UNKNOWN: StatusMap = StatusMap::new(&[("R", JobStatus::Running)]);
        assert!(NO_UNKNOWN.check().is_err());
    }
}
