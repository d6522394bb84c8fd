use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{ActorId, CompanyId, DenialOptionId, RoundType, Violation, ViolationId};
use super::facts::{FactSources, GatherError};
use super::lifecycle::{
    ActiveChallenge, ChallengeError, ChallengeLifecycle, ChallengeSubmission, CountdownStatus,
    CourtOutcomeUpdate, DenialOption, PendingDeadline, ResponseUpdate,
};
use super::portfolio::{
    BatchDashboard, HealthCheckSummary, OutcomeAnalytics, PortfolioAggregator, TriageAccuracy,
};
use super::repository::{
    DeadlineReminder, ReminderDispatcher, ReminderError, RepositoryError, ViolationRepository,
};
use super::scan::{ScanError, ScanOptions, ScanOutcome, ScanSummary, ViolationScanner};
use super::triage::{ScanResult, TriageConfig, TriageEngine, TriageError};

/// Facade composing the scanner, lifecycle manager, portfolio aggregator, and reminder hook.
pub struct DataQService<R, D> {
    repository: Arc<R>,
    reminders: Arc<D>,
    engine: Arc<TriageEngine>,
    scanner: ViolationScanner<R>,
    lifecycle: ChallengeLifecycle<R>,
    portfolio: PortfolioAggregator<R>,
}

impl<R, D> DataQService<R, D>
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    pub fn new(repository: Arc<R>, reminders: Arc<D>, sources: FactSources, config: TriageConfig) -> Self {
        let urgent_days = config.urgent_days;
        let config = Arc::new(config);
        let engine = Arc::new(TriageEngine::new(config.as_ref().clone()));
        let scanner = ViolationScanner::new(Arc::clone(&repository), sources.clone(), Arc::clone(&engine));
        let lifecycle = ChallengeLifecycle::new(
            Arc::clone(&repository),
            Arc::clone(&sources.directory),
            urgent_days,
        );
        let portfolio = PortfolioAggregator::new(Arc::clone(&repository), config);

        Self {
            repository,
            reminders,
            engine,
            scanner,
            lifecycle,
            portfolio,
        }
    }

    pub fn config(&self) -> &TriageConfig {
        self.engine.config()
    }

    pub fn violation(&self, violation_id: &ViolationId) -> Result<Violation, DataQServiceError> {
        let stored = self
            .repository
            .fetch(violation_id)?
            .ok_or_else(|| DataQServiceError::NotFound(violation_id.clone()))?;
        Ok(stored.record)
    }

    pub fn scan_company(
        &self,
        company: &CompanyId,
        options: ScanOptions,
        now: DateTime<Utc>,
    ) -> Result<ScanSummary, DataQServiceError> {
        Ok(self.scanner.scan_company(company, options, now)?)
    }

    pub fn scan_violation(
        &self,
        violation_id: &ViolationId,
        options: ScanOptions,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, DataQServiceError> {
        Ok(self.scanner.scan_violation(violation_id, options, now)?)
    }

    /// Score a violation without storing the result.
    pub fn preview_score(
        &self,
        violation_id: &ViolationId,
        now: DateTime<Utc>,
    ) -> Result<ScanResult, DataQServiceError> {
        let facts = self
            .scanner
            .gatherer()
            .gather(violation_id, now)
            .map_err(ScanError::from)?;
        Ok(self.engine.score(&facts).map_err(ScanError::from)?)
    }

    pub fn submit_challenge(
        &self,
        violation_id: &ViolationId,
        submission: ChallengeSubmission,
        now: DateTime<Utc>,
    ) -> Result<Violation, DataQServiceError> {
        Ok(self.lifecycle.submit(violation_id, submission, now)?)
    }

    pub fn record_response(
        &self,
        violation_id: &ViolationId,
        update: ResponseUpdate,
        now: DateTime<Utc>,
    ) -> Result<Violation, DataQServiceError> {
        Ok(self.lifecycle.record_response(violation_id, update, now)?)
    }

    pub fn set_response_deadline(
        &self,
        violation_id: &ViolationId,
        deadline: DateTime<Utc>,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<Violation, DataQServiceError> {
        Ok(self
            .lifecycle
            .set_response_deadline(violation_id, deadline, actor, now)?)
    }

    pub fn countdown(
        &self,
        violation_id: &ViolationId,
        now: DateTime<Utc>,
    ) -> Result<CountdownStatus, DataQServiceError> {
        let violation = self.violation(violation_id)?;
        Ok(self.lifecycle.countdown(&violation, now))
    }

    pub fn pending_deadlines(
        &self,
        company: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingDeadline>, DataQServiceError> {
        Ok(self.lifecycle.check_pending_deadlines(company, now)?)
    }

    pub fn denial_options(&self, violation_id: &ViolationId) -> Result<Vec<DenialOption>, DataQServiceError> {
        Ok(self.lifecycle.denial_options(violation_id)?)
    }

    pub fn select_denial_option(
        &self,
        violation_id: &ViolationId,
        option: DenialOptionId,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<Violation, DataQServiceError> {
        Ok(self
            .lifecycle
            .select_denial_option(violation_id, option, actor, now)?)
    }

    pub fn initiate_round(
        &self,
        violation_id: &ViolationId,
        round_type: RoundType,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<Violation, DataQServiceError> {
        Ok(self
            .lifecycle
            .initiate_round(violation_id, round_type, actor, now)?)
    }

    pub fn record_court_outcome(
        &self,
        violation_id: &ViolationId,
        update: CourtOutcomeUpdate,
        now: DateTime<Utc>,
    ) -> Result<Violation, DataQServiceError> {
        Ok(self.lifecycle.record_court_outcome(violation_id, update, now)?)
    }

    pub fn close_challenge(
        &self,
        violation_id: &ViolationId,
        actor: &ActorId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Violation, DataQServiceError> {
        Ok(self
            .lifecycle
            .close_challenge(violation_id, actor, notes, now)?)
    }

    pub fn active_challenges(
        &self,
        company: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActiveChallenge>, DataQServiceError> {
        Ok(self.lifecycle.active_challenges(company, now)?)
    }

    pub fn dashboard(
        &self,
        company: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<BatchDashboard, DataQServiceError> {
        Ok(self.portfolio.batch_dashboard(company, now)?)
    }

    pub fn outcome_analytics(&self, company: &CompanyId) -> Result<OutcomeAnalytics, DataQServiceError> {
        Ok(self.portfolio.outcome_analytics(company)?)
    }

    pub fn triage_accuracy(&self, company: &CompanyId) -> Result<TriageAccuracy, DataQServiceError> {
        Ok(self.portfolio.triage_accuracy(company)?)
    }

    pub fn health_check(
        &self,
        company: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<HealthCheckSummary, DataQServiceError> {
        Ok(self.portfolio.health_check_summary(company, now)?)
    }

    /// Run the deadline sweep and hand urgent or expired deadlines to the reminder dispatcher.
    pub fn send_deadline_reminders(
        &self,
        company: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<ReminderSweep, DataQServiceError> {
        let pending = self.pending_deadlines(company, now)?;
        let mut sweep = ReminderSweep {
            checked: pending.len(),
            ..ReminderSweep::default()
        };

        for deadline in pending {
            let urgent = deadline.countdown.is_urgent.unwrap_or(false);
            let expired = deadline.countdown.is_expired.unwrap_or(false);
            let Some(due) = deadline.countdown.deadline else {
                continue;
            };
            if !urgent && !expired {
                continue;
            }

            let template = if expired {
                "dataq_deadline_expired"
            } else {
                "dataq_deadline_urgent"
            };
            let mut details = BTreeMap::new();
            details.insert("status".to_string(), deadline.status.label().to_string());
            if let Some(code) = &deadline.violation_code {
                details.insert("violation_code".to_string(), code.clone());
            }

            let reminder = DeadlineReminder {
                template: template.to_string(),
                violation_id: deadline.violation_id.clone(),
                company_id: deadline.company_id.clone(),
                deadline: due,
                days_remaining: deadline.days_remaining(),
                details,
            };

            match self.reminders.dispatch(reminder) {
                Ok(()) => sweep.dispatched += 1,
                Err(error) => {
                    warn!(violation_id = %deadline.violation_id, error = %error, "deadline reminder failed");
                    sweep.failed.push(deadline.violation_id);
                }
            }
        }

        info!(
            company_id = %company.0,
            checked = sweep.checked,
            dispatched = sweep.dispatched,
            failed = sweep.failed.len(),
            "deadline reminders dispatched"
        );
        Ok(sweep)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSweep {
    pub checked: usize,
    pub dispatched: usize,
    pub failed: Vec<ViolationId>,
}

/// Error raised by the DataQ service.
#[derive(Debug, thiserror::Error)]
pub enum DataQServiceError {
    #[error("violation {0} not found")]
    NotFound(ViolationId),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Reminder(#[from] ReminderError),
}

impl DataQServiceError {
    /// True when the error came from a missing violation rather than an infrastructure fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DataQServiceError::NotFound(_)
                | DataQServiceError::Challenge(ChallengeError::NotFound(_))
                | DataQServiceError::Scan(ScanError::Gather(GatherError::NotFound(_)))
        )
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            DataQServiceError::Challenge(ChallengeError::InvalidInput { .. })
                | DataQServiceError::Scan(ScanError::Triage(TriageError::InvalidInput { .. }))
        )
    }
}
