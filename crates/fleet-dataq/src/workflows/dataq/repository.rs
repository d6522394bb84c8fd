use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ChallengeStatus, CompanyId, Violation, ViolationId};

/// Stored violation paired with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub record: T,
}

/// Narrowing applied to a company's violations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationFilter {
    /// Only violations with a submitted challenge.
    pub submitted: Option<bool>,
    /// Only violations whose challenge is in one of these statuses.
    pub statuses: Option<Vec<ChallengeStatus>>,
    /// Only violations whose challenge carries a pending response deadline.
    pub has_deadline: Option<bool>,
}

impl ViolationFilter {
    pub fn submitted() -> Self {
        Self {
            submitted: Some(true),
            ..Self::default()
        }
    }

    pub fn with_statuses(statuses: impl IntoIterator<Item = ChallengeStatus>) -> Self {
        Self {
            submitted: Some(true),
            statuses: Some(statuses.into_iter().collect()),
            has_deadline: None,
        }
    }

    pub fn matches(&self, violation: &Violation) -> bool {
        let challenge = violation.data_q_challenge.as_ref();

        if let Some(submitted) = self.submitted {
            let actual = challenge.map(|challenge| challenge.submitted).unwrap_or(false);
            if actual != submitted {
                return false;
            }
        }

        if let Some(statuses) = &self.statuses {
            match challenge {
                Some(challenge) if statuses.contains(&challenge.status) => {}
                _ => return false,
            }
        }

        if let Some(has_deadline) = self.has_deadline {
            let actual = challenge
                .and_then(|challenge| challenge.pending_response_deadline)
                .is_some();
            if actual != has_deadline {
                return false;
            }
        }

        true
    }
}

/// Violation store with compare-and-swap writes.
///
/// Every mutation goes through [`ViolationRepository::compare_and_swap`] so two
/// writers racing on the same violation cannot silently overwrite each other.
pub trait ViolationRepository: Send + Sync {
    fn fetch(&self, id: &ViolationId) -> Result<Option<Versioned<Violation>>, RepositoryError>;
    fn company_violations(
        &self,
        company: &CompanyId,
        filter: &ViolationFilter,
    ) -> Result<Vec<Versioned<Violation>>, RepositoryError>;
    /// Store `record` if the current version equals `expected_version`, returning the new version.
    fn compare_and_swap(
        &self,
        record: Violation,
        expected_version: u64,
    ) -> Result<u64, RepositoryError>;
    fn insert(&self, record: Violation) -> Result<Versioned<Violation>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound deadline reminder hook (e-mail, SMS, or task adapters).
pub trait ReminderDispatcher: Send + Sync {
    fn dispatch(&self, reminder: DeadlineReminder) -> Result<(), ReminderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineReminder {
    pub template: String,
    pub violation_id: ViolationId,
    pub company_id: CompanyId,
    pub deadline: DateTime<Utc>,
    pub days_remaining: i64,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("reminder transport unavailable: {0}")]
    Transport(String),
}
