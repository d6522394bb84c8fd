//! Company-wide and single-violation scan passes.
//!
//! A scan gathers facts, scores them, and stores the result on the violation.
//! Failures are isolated per violation: the pass records them and moves on, and
//! the violation keeps its previous result flagged as stale.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{months_between, CompanyId, Violation, ViolationId};
use super::facts::{CompanyContext, FactGatherer, FactSources, GatherError};
use super::repository::{RepositoryError, Versioned, ViolationFilter, ViolationRepository};
use super::triage::{ScanResult, TriageCategory, TriageEngine, TriageError, SCAN_VERSION};

const MAX_WRITE_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Rescan even when the stored result is inside the cooldown.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    Scored(Box<ScanResult>),
    SkippedActive,
    SkippedFresh,
    SkippedExpired,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Gather(#[from] GatherError),
    #[error(transparent)]
    Triage(#[from] TriageError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("violation {0} was modified during the scan")]
    ConcurrentModification(ViolationId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub violation_id: ViolationId,
    pub error: String,
}

/// Totals for one company scan pass. A pass with failures is still a success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub company_id: Option<CompanyId>,
    pub scanned: usize,
    pub flagged: usize,
    pub skipped_active: usize,
    pub skipped_fresh: usize,
    pub skipped_expired: usize,
    pub categories: BTreeMap<TriageCategory, usize>,
    pub failures: Vec<ScanFailure>,
}

pub struct ViolationScanner<R> {
    repository: Arc<R>,
    gatherer: FactGatherer<R>,
    engine: Arc<TriageEngine>,
}

impl<R> ViolationScanner<R>
where
    R: ViolationRepository + 'static,
{
    pub fn new(repository: Arc<R>, sources: FactSources, engine: Arc<TriageEngine>) -> Self {
        let gatherer = FactGatherer::new(Arc::clone(&repository), sources);
        Self {
            repository,
            gatherer,
            engine,
        }
    }

    pub fn gatherer(&self) -> &FactGatherer<R> {
        &self.gatherer
    }

    pub fn scan_company(
        &self,
        company: &CompanyId,
        options: ScanOptions,
        now: DateTime<Utc>,
    ) -> Result<ScanSummary, ScanError> {
        let context = self.gatherer.company_context(company)?;
        let violations = self
            .repository
            .company_violations(company, &ViolationFilter::default())?;

        let mut summary = ScanSummary {
            company_id: Some(company.clone()),
            ..ScanSummary::default()
        };

        for stored in violations {
            let violation_id = stored.record.id.clone();
            match self.process(stored, &context, options, now) {
                Ok(ScanOutcome::Scored(result)) => {
                    summary.scanned += 1;
                    if result.flag_count > 0 {
                        summary.flagged += 1;
                    }
                    *summary.categories.entry(result.category).or_insert(0) += 1;
                }
                Ok(ScanOutcome::SkippedActive) => summary.skipped_active += 1,
                Ok(ScanOutcome::SkippedFresh) => summary.skipped_fresh += 1,
                Ok(ScanOutcome::SkippedExpired) => summary.skipped_expired += 1,
                Err(error) => {
                    warn!(violation_id = %violation_id, error = %error, "violation scan failed");
                    summary.failures.push(ScanFailure {
                        violation_id,
                        error: error.to_string(),
                    });
                }
            }
        }

        info!(
            company_id = %company.0,
            scanned = summary.scanned,
            flagged = summary.flagged,
            skipped = summary.skipped_active + summary.skipped_fresh + summary.skipped_expired,
            failed = summary.failures.len(),
            "company scan complete"
        );
        Ok(summary)
    }

    pub fn scan_violation(
        &self,
        violation_id: &ViolationId,
        options: ScanOptions,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, ScanError> {
        let stored = self
            .repository
            .fetch(violation_id)?
            .ok_or_else(|| GatherError::NotFound(violation_id.clone()))?;
        let context = self.gatherer.company_context(&stored.record.company_id)?;
        let outcome = self.process(stored, &context, options, now);
        if let Err(error) = &outcome {
            warn!(violation_id = %violation_id, error = %error, "violation scan failed");
        }
        outcome
    }

    fn process(
        &self,
        stored: Versioned<Violation>,
        context: &CompanyContext,
        options: ScanOptions,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome, ScanError> {
        let config = self.engine.config();
        let violation = &stored.record;

        if violation.has_active_challenge() {
            self.mark_stale(&violation.id)?;
            return Ok(ScanOutcome::SkippedActive);
        }

        if months_between(violation.violation_date, now) >= config.impact.lookback_months {
            return Ok(ScanOutcome::SkippedExpired);
        }

        if !options.force && is_fresh(violation, now, config.scan_cooldown_hours) {
            return Ok(ScanOutcome::SkippedFresh);
        }

        let scored = self
            .gatherer
            .facts_for(violation, context, now)
            .map_err(ScanError::from)
            .and_then(|facts| self.engine.score(&facts).map_err(ScanError::from));

        let result = match scored {
            Ok(result) => result,
            Err(error) => {
                self.mark_stale(&violation.id)?;
                return Err(error);
            }
        };

        let stored_result = result.clone();
        self.write(&violation.id, move |record| {
            if record.has_active_challenge() {
                return false;
            }
            record.scan_results = Some(stored_result.clone());
            true
        })?;
        Ok(ScanOutcome::Scored(Box::new(result)))
    }

    fn mark_stale(&self, violation_id: &ViolationId) -> Result<(), ScanError> {
        self.write(violation_id, |record| match record.scan_results.as_mut() {
            Some(result) if !result.stale => {
                result.stale = true;
                true
            }
            _ => false,
        })
    }

    /// Compare-and-swap write; `apply` returns `false` when there is nothing to store.
    fn write<F>(&self, violation_id: &ViolationId, mut apply: F) -> Result<(), ScanError>
    where
        F: FnMut(&mut Violation) -> bool,
    {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let Some(stored) = self.repository.fetch(violation_id)? else {
                return Err(GatherError::NotFound(violation_id.clone()).into());
            };
            let mut record = stored.record;
            if !apply(&mut record) {
                return Ok(());
            }
            match self.repository.compare_and_swap(record, stored.version) {
                Ok(_) => return Ok(()),
                Err(RepositoryError::VersionConflict { .. }) => continue,
                Err(error) => return Err(error.into()),
            }
        }
        Err(ScanError::ConcurrentModification(violation_id.clone()))
    }
}

fn is_fresh(violation: &Violation, now: DateTime<Utc>, cooldown_hours: i64) -> bool {
    match &violation.scan_results {
        Some(result) => {
            !result.stale
                && result.scan_version >= SCAN_VERSION
                && now - result.scanned_at < Duration::hours(cooldown_hours)
        }
        None => false,
    }
}
