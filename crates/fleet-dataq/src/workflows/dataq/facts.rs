//! Evidence and fact gathering.
//!
//! The gatherer reads a violation, its company peers, and the external
//! collaborators (regulatory snapshot, jurisdiction statistics, evidence
//! checklist, fleet directory) and produces an immutable [`FactBundle`]. It never
//! writes. Batch scans build one [`CompanyContext`] and reuse it across every
//! violation of the company.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Basic, ChallengeStatus, CompanyId, CourtOutcome, CrashReport, DriverId, DriverProfile,
    EvidenceItem, InspectionContext, Location, VehicleId, VehicleProfile, Violation, ViolationId,
    ViolationStatus,
};
use super::repository::{RepositoryError, ViolationFilter, ViolationRepository};

/// Percentile for one BASIC at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasicPercentile {
    pub percent: f32,
    pub threshold: Option<f32>,
}

/// Point-in-time regulatory standing supplied for a carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatorySnapshot {
    pub company_id: CompanyId,
    pub captured_at: DateTime<Utc>,
    pub basics: BTreeMap<Basic, BasicPercentile>,
}

impl RegulatorySnapshot {
    pub fn standing(&self, basic: Basic) -> BasicStanding {
        match self.basics.get(&basic) {
            Some(entry) => BasicStanding {
                basic,
                current_percent: Some(entry.percent),
                threshold: entry.threshold.unwrap_or_else(|| basic.default_threshold()),
            },
            None => BasicStanding::unknown(basic),
        }
    }
}

/// Where the violation's BASIC currently sits relative to its intervention threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasicStanding {
    pub basic: Basic,
    pub current_percent: Option<f32>,
    pub threshold: f32,
}

impl BasicStanding {
    pub fn unknown(basic: Basic) -> Self {
        Self {
            basic,
            current_percent: None,
            threshold: basic.default_threshold(),
        }
    }
}

/// Historical challenge statistics for an inspection jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionStats {
    pub jurisdiction: String,
    pub approval_rate: f32,
    pub average_response_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierProfile {
    pub id: CompanyId,
    pub name: String,
    pub dot_number: Option<String>,
}

/// Another violation of the same carrier, used for duplicate detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerViolation {
    pub id: ViolationId,
    pub violation_code: Option<String>,
    pub violation_date: DateTime<Utc>,
    pub inspection_number: String,
    pub vehicle_id: Option<VehicleId>,
    pub location: Location,
}

impl From<&Violation> for PeerViolation {
    fn from(violation: &Violation) -> Self {
        Self {
            id: violation.id.clone(),
            violation_code: violation.violation_code.clone(),
            violation_date: violation.violation_date,
            inspection_number: violation.inspection.inspection_number.clone(),
            vehicle_id: violation.vehicle_id.clone(),
            location: violation.location.clone(),
        }
    }
}

/// Everything the scorer needs, captured at `as_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactBundle {
    pub violation_id: ViolationId,
    pub company_id: CompanyId,
    pub as_of: DateTime<Utc>,
    pub violation_date: DateTime<Utc>,
    pub violation_code: Option<String>,
    pub violation_type: String,
    pub basic: Basic,
    pub severity_weight: u8,
    pub crash_related: bool,
    pub crash: Option<CrashReport>,
    pub document_count: usize,
    pub location: Location,
    pub inspection: InspectionContext,
    pub company_dot: Option<String>,
    pub driver: Option<DriverProfile>,
    pub vehicle_id: Option<VehicleId>,
    pub evidence: Vec<EvidenceItem>,
    pub court_outcome: Option<CourtOutcome>,
    pub violation_status: ViolationStatus,
    pub prior_challenge_status: Option<ChallengeStatus>,
    pub jurisdiction_stats: Option<JurisdictionStats>,
    pub standing: BasicStanding,
    pub peers: Vec<PeerViolation>,
}

impl FactBundle {
    pub fn jurisdiction(&self) -> Option<&str> {
        self.location.state.as_deref()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

pub trait RegulatorySnapshotProvider: Send + Sync {
    fn snapshot(&self, company: &CompanyId) -> Result<Option<RegulatorySnapshot>, ProviderError>;
}

/// Missing data is `Ok(None)`, which scores as "no data" rather than a zero approval rate.
pub trait JurisdictionStatsProvider: Send + Sync {
    fn stats(&self, jurisdiction: &str) -> Result<Option<JurisdictionStats>, ProviderError>;
}

pub trait EvidenceChecklistProvider: Send + Sync {
    fn checklist(&self, violation: &ViolationId) -> Result<Vec<EvidenceItem>, ProviderError>;
}

/// Driver, vehicle, and carrier lookups owned by the surrounding fleet system.
pub trait FleetDirectory: Send + Sync {
    fn carrier(&self, company: &CompanyId) -> Result<Option<CarrierProfile>, ProviderError>;
    fn driver(&self, driver: &DriverId) -> Result<Option<DriverProfile>, ProviderError>;
    fn vehicle(&self, vehicle: &VehicleId) -> Result<Option<VehicleProfile>, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    #[error("violation {0} not found")]
    NotFound(ViolationId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Carrier-wide data fetched once per scan pass.
#[derive(Debug, Clone)]
pub struct CompanyContext {
    pub company_id: CompanyId,
    pub carrier: Option<CarrierProfile>,
    pub snapshot: Option<RegulatorySnapshot>,
    pub peers: Vec<PeerViolation>,
    pub jurisdictions: BTreeMap<String, Option<JurisdictionStats>>,
}

/// Collaborators the gatherer reads from.
#[derive(Clone)]
pub struct FactSources {
    pub snapshots: Arc<dyn RegulatorySnapshotProvider>,
    pub jurisdictions: Arc<dyn JurisdictionStatsProvider>,
    pub evidence: Arc<dyn EvidenceChecklistProvider>,
    pub directory: Arc<dyn FleetDirectory>,
}

pub struct FactGatherer<R> {
    repository: Arc<R>,
    sources: FactSources,
}

impl<R> FactGatherer<R>
where
    R: ViolationRepository + 'static,
{
    pub fn new(repository: Arc<R>, sources: FactSources) -> Self {
        Self {
            repository,
            sources,
        }
    }

    pub fn sources(&self) -> &FactSources {
        &self.sources
    }

    /// Gather the fact bundle for a single violation.
    pub fn gather(&self, id: &ViolationId, as_of: DateTime<Utc>) -> Result<FactBundle, GatherError> {
        let stored = self
            .repository
            .fetch(id)?
            .ok_or_else(|| GatherError::NotFound(id.clone()))?;
        let context = self.company_context(&stored.record.company_id)?;
        self.facts_for(&stored.record, &context, as_of)
    }

    pub fn company_context(&self, company: &CompanyId) -> Result<CompanyContext, GatherError> {
        let carrier = self.sources.directory.carrier(company)?;
        let snapshot = self.sources.snapshots.snapshot(company)?;
        let violations = self
            .repository
            .company_violations(company, &ViolationFilter::default())?;

        let mut jurisdictions = BTreeMap::new();
        for stored in &violations {
            if let Some(state) = stored.record.location.state.as_deref() {
                let key = state.to_ascii_uppercase();
                if !jurisdictions.contains_key(&key) {
                    let stats = self.sources.jurisdictions.stats(&key)?;
                    jurisdictions.insert(key, stats);
                }
            }
        }

        let peers = violations
            .iter()
            .map(|stored| PeerViolation::from(&stored.record))
            .collect();

        Ok(CompanyContext {
            company_id: company.clone(),
            carrier,
            snapshot,
            peers,
            jurisdictions,
        })
    }

    pub fn facts_for(
        &self,
        violation: &Violation,
        context: &CompanyContext,
        as_of: DateTime<Utc>,
    ) -> Result<FactBundle, GatherError> {
        let driver = match &violation.driver_id {
            Some(id) => self.sources.directory.driver(id)?,
            None => None,
        };
        let evidence = self.sources.evidence.checklist(&violation.id)?;

        let jurisdiction_stats = match violation.location.state.as_deref() {
            Some(state) => {
                let key = state.to_ascii_uppercase();
                match context.jurisdictions.get(&key) {
                    Some(cached) => cached.clone(),
                    None => self.sources.jurisdictions.stats(&key)?,
                }
            }
            None => None,
        };

        let standing = context
            .snapshot
            .as_ref()
            .map(|snapshot| snapshot.standing(violation.basic))
            .unwrap_or_else(|| BasicStanding::unknown(violation.basic));

        let peers = context
            .peers
            .iter()
            .filter(|peer| peer.id != violation.id)
            .cloned()
            .collect();

        Ok(FactBundle {
            violation_id: violation.id.clone(),
            company_id: violation.company_id.clone(),
            as_of,
            violation_date: violation.violation_date,
            violation_code: violation.violation_code.clone(),
            violation_type: violation.violation_type.clone(),
            basic: violation.basic,
            severity_weight: violation.severity_weight,
            crash_related: violation.crash_related,
            crash: violation.crash,
            document_count: violation.documents.len(),
            location: violation.location.clone(),
            inspection: violation.inspection.clone(),
            company_dot: context
                .carrier
                .as_ref()
                .and_then(|carrier| carrier.dot_number.clone()),
            driver,
            vehicle_id: violation.vehicle_id.clone(),
            evidence,
            court_outcome: violation.court_outcome.as_ref().map(|record| record.outcome),
            violation_status: violation.status,
            prior_challenge_status: violation.challenge_status(),
            jurisdiction_stats,
            standing,
            peers,
        })
    }
}
