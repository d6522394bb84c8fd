use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::dataq::domain::{
    ActorId, Basic, ChallengeStatus, ChallengeType, CompanyId, DataQChallenge, DocumentKind,
    DriverEmployment, DriverId, DriverProfile, EvidenceItem, InspectionContext, Location, RdrType,
    StateReview, VehicleId, VehicleProfile, Violation, ViolationDocument, ViolationId,
    ViolationStatus,
};
use crate::workflows::dataq::facts::{
    BasicPercentile, BasicStanding, CarrierProfile, EvidenceChecklistProvider, FactBundle,
    FactSources, FleetDirectory, JurisdictionStats, JurisdictionStatsProvider, ProviderError,
    RegulatorySnapshot, RegulatorySnapshotProvider,
};
use crate::workflows::dataq::repository::{
    DeadlineReminder, ReminderDispatcher, ReminderError, RepositoryError, Versioned,
    ViolationFilter, ViolationRepository,
};
use crate::workflows::dataq::{DataQService, TriageConfig};

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).single().expect("valid instant")
}

pub(super) fn company() -> CompanyId {
    CompanyId("carrier-ridgeline".to_string())
}

pub(super) fn actor() -> ActorId {
    ActorId("safety-manager".to_string())
}

pub(super) const CARRIER_DOT: &str = "3141592";

/// Hours-of-service logbook violation from a complete level 1 inspection in Iowa.
pub(super) fn violation(id: &str) -> Violation {
    Violation {
        id: ViolationId(id.to_string()),
        company_id: company(),
        driver_id: Some(DriverId("drv-ortiz".to_string())),
        vehicle_id: Some(VehicleId("unit-42".to_string())),
        violation_date: now() - Duration::days(40),
        location: Location {
            city: Some("Des Moines".to_string()),
            state: Some("IA".to_string()),
        },
        inspection: InspectionContext {
            inspection_number: format!("IA-{id}"),
            carrier_dot: Some(CARRIER_DOT.to_string()),
            level: Some(1),
            inspector_name: Some("Trooper Hale".to_string()),
            inspector_badge: Some("4471".to_string()),
        },
        basic: Basic::HoursOfService,
        violation_type: "False log".to_string(),
        violation_code: Some("395.8(e)".to_string()),
        description: "False report of driver's record of duty status".to_string(),
        severity_weight: 7,
        out_of_service: false,
        crash_related: false,
        crash: None,
        fine_amount: None,
        documents: Vec::new(),
        status: ViolationStatus::Open,
        scan_results: None,
        data_q_challenge: None,
        court_outcome: None,
        history: Vec::new(),
    }
}

pub(super) fn aged(mut violation: Violation, days: i64) -> Violation {
    violation.violation_date = now() - Duration::days(days);
    violation
}

pub(super) fn cited(mut violation: Violation) -> Violation {
    violation.fine_amount = Some(350);
    violation.documents.push(ViolationDocument {
        name: "citation.pdf".to_string(),
        kind: DocumentKind::Citation,
        uploaded_at: Some(now() - Duration::days(30)),
    });
    violation
}

pub(super) fn challenge(status: ChallengeStatus, submitted_days_ago: i64) -> DataQChallenge {
    DataQChallenge {
        submitted: true,
        status,
        challenge_type: ChallengeType::DataError,
        rdr_type: Some(RdrType::InspectionViolationIncorrect),
        reason: Some("ELD records contradict the logbook finding".to_string()),
        submission_date: now() - Duration::days(submitted_days_ago),
        response_date: None,
        response_notes: None,
        pending_response_deadline: None,
        state_review: StateReview::default(),
        denial_workflow: None,
        rounds: Default::default(),
        escalated_to_fmcsa: false,
        escalation_date: None,
    }
}

pub(super) fn with_challenge(mut violation: Violation, status: ChallengeStatus) -> Violation {
    violation.data_q_challenge = Some(challenge(status, 10));
    violation
}

pub(super) fn snapshot() -> RegulatorySnapshot {
    let mut basics = BTreeMap::new();
    basics.insert(
        Basic::HoursOfService,
        BasicPercentile {
            percent: 82.0,
            threshold: Some(80.0),
        },
    );
    basics.insert(
        Basic::VehicleMaintenance,
        BasicPercentile {
            percent: 41.0,
            threshold: None,
        },
    );
    RegulatorySnapshot {
        company_id: company(),
        captured_at: now() - Duration::days(3),
        basics,
    }
}

pub(super) fn iowa_stats() -> JurisdictionStats {
    JurisdictionStats {
        jurisdiction: "IA".to_string(),
        approval_rate: 0.70,
        average_response_days: Some(21),
    }
}

/// Fact bundle equivalent to what the gatherer produces for [`violation`] with [`FleetFixture::standard`].
pub(super) fn facts() -> FactBundle {
    let violation = violation("v-100");
    FactBundle {
        violation_id: violation.id.clone(),
        company_id: violation.company_id.clone(),
        as_of: now(),
        violation_date: violation.violation_date,
        violation_code: violation.violation_code.clone(),
        violation_type: violation.violation_type.clone(),
        basic: violation.basic,
        severity_weight: violation.severity_weight,
        crash_related: false,
        crash: None,
        document_count: 0,
        location: violation.location.clone(),
        inspection: violation.inspection.clone(),
        company_dot: Some(CARRIER_DOT.to_string()),
        driver: Some(driver(DriverEmployment::CompanyDriver)),
        vehicle_id: violation.vehicle_id.clone(),
        evidence: Vec::new(),
        court_outcome: None,
        violation_status: ViolationStatus::Open,
        prior_challenge_status: None,
        jurisdiction_stats: Some(iowa_stats()),
        standing: snapshot().standing(Basic::HoursOfService),
        peers: Vec::new(),
    }
}

pub(super) fn unknown_standing(basic: Basic) -> BasicStanding {
    BasicStanding::unknown(basic)
}

pub(super) fn driver(employment: DriverEmployment) -> DriverProfile {
    DriverProfile {
        id: DriverId("drv-ortiz".to_string()),
        first_name: "Luis".to_string(),
        last_name: "Ortiz".to_string(),
        employment,
    }
}

pub(super) fn evidence(obtained: usize, required: usize) -> Vec<EvidenceItem> {
    (0..required)
        .map(|index| EvidenceItem {
            item: format!("document-{index}"),
            required: true,
            obtained: index < obtained,
        })
        .collect()
}

#[derive(Default, Clone)]
pub(super) struct MemoryViolationRepository {
    pub(super) records: Arc<Mutex<HashMap<ViolationId, Versioned<Violation>>>>,
}

impl MemoryViolationRepository {
    pub(super) fn seeded(violations: impl IntoIterator<Item = Violation>) -> Self {
        let repository = Self::default();
        for violation in violations {
            repository.insert(violation).expect("seed violation");
        }
        repository
    }

    pub(super) fn get(&self, id: &str) -> Violation {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(&ViolationId(id.to_string()))
            .map(|stored| stored.record.clone())
            .expect("violation stored")
    }

    pub(super) fn version(&self, id: &str) -> u64 {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(&ViolationId(id.to_string()))
            .map(|stored| stored.version)
            .expect("violation stored")
    }

    /// Simulate another writer committing first.
    pub(super) fn bump(&self, id: &ViolationId) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if let Some(stored) = guard.get_mut(id) {
            stored.version += 1;
        }
    }
}

impl ViolationRepository for MemoryViolationRepository {
    fn fetch(&self, id: &ViolationId) -> Result<Option<Versioned<Violation>>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn company_violations(
        &self,
        company: &CompanyId,
        filter: &ViolationFilter,
    ) -> Result<Vec<Versioned<Violation>>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut matching: Vec<_> = guard
            .values()
            .filter(|stored| &stored.record.company_id == company)
            .filter(|stored| filter.matches(&stored.record))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.record.id.cmp(&b.record.id));
        Ok(matching)
    }

    fn compare_and_swap(
        &self,
        record: Violation,
        expected_version: u64,
    ) -> Result<u64, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard.get_mut(&record.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                expected: expected_version,
                found: stored.version,
            });
        }
        stored.version += 1;
        stored.record = record;
        Ok(stored.version)
    }

    fn insert(&self, record: Violation) -> Result<Versioned<Violation>, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        let stored = Versioned { version: 1, record };
        guard.insert(stored.record.id.clone(), stored.clone());
        Ok(stored)
    }
}

/// Repository where another writer wins the first `conflicts` compare-and-swaps.
pub(super) struct ContendedRepository {
    pub(super) inner: MemoryViolationRepository,
    conflicts: Mutex<usize>,
}

impl ContendedRepository {
    pub(super) fn new(inner: MemoryViolationRepository, conflicts: usize) -> Self {
        Self {
            inner,
            conflicts: Mutex::new(conflicts),
        }
    }
}

impl ViolationRepository for ContendedRepository {
    fn fetch(&self, id: &ViolationId) -> Result<Option<Versioned<Violation>>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn company_violations(
        &self,
        company: &CompanyId,
        filter: &ViolationFilter,
    ) -> Result<Vec<Versioned<Violation>>, RepositoryError> {
        self.inner.company_violations(company, filter)
    }

    fn compare_and_swap(
        &self,
        record: Violation,
        expected_version: u64,
    ) -> Result<u64, RepositoryError> {
        let mut remaining = self.conflicts.lock().expect("conflict mutex poisoned");
        if *remaining > 0 {
            *remaining -= 1;
            self.inner.bump(&record.id);
        }
        drop(remaining);
        self.inner.compare_and_swap(record, expected_version)
    }

    fn insert(&self, record: Violation) -> Result<Versioned<Violation>, RepositoryError> {
        self.inner.insert(record)
    }
}

pub(super) struct UnavailableRepository;

impl ViolationRepository for UnavailableRepository {
    fn fetch(&self, _id: &ViolationId) -> Result<Option<Versioned<Violation>>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn company_violations(
        &self,
        _company: &CompanyId,
        _filter: &ViolationFilter,
    ) -> Result<Vec<Versioned<Violation>>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn compare_and_swap(
        &self,
        _record: Violation,
        _expected_version: u64,
    ) -> Result<u64, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert(&self, _record: Violation) -> Result<Versioned<Violation>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Static collaborator data for the fact gatherer and lifecycle lookups.
#[derive(Default)]
pub(super) struct FleetFixture {
    pub(super) snapshot: Option<RegulatorySnapshot>,
    pub(super) jurisdictions: BTreeMap<String, JurisdictionStats>,
    pub(super) evidence: HashMap<ViolationId, Vec<EvidenceItem>>,
    pub(super) carrier: Option<CarrierProfile>,
    pub(super) drivers: Vec<DriverProfile>,
    pub(super) vehicles: Vec<VehicleProfile>,
    pub(super) evidence_offline: bool,
}

impl FleetFixture {
    pub(super) fn standard() -> Self {
        let mut jurisdictions = BTreeMap::new();
        jurisdictions.insert("IA".to_string(), iowa_stats());
        Self {
            snapshot: Some(snapshot()),
            jurisdictions,
            evidence: HashMap::new(),
            carrier: Some(CarrierProfile {
                id: company(),
                name: "Ridgeline Freight".to_string(),
                dot_number: Some(CARRIER_DOT.to_string()),
            }),
            drivers: vec![driver(DriverEmployment::CompanyDriver)],
            vehicles: vec![VehicleProfile {
                id: VehicleId("unit-42".to_string()),
                unit_number: "42".to_string(),
                vin: Some("1FUJGLDR0CLBP8834".to_string()),
            }],
            evidence_offline: false,
        }
    }

    pub(super) fn into_sources(self) -> FactSources {
        let fixture = Arc::new(self);
        FactSources {
            snapshots: fixture.clone(),
            jurisdictions: fixture.clone(),
            evidence: fixture.clone(),
            directory: fixture,
        }
    }
}

impl RegulatorySnapshotProvider for FleetFixture {
    fn snapshot(&self, _company: &CompanyId) -> Result<Option<RegulatorySnapshot>, ProviderError> {
        Ok(self.snapshot.clone())
    }
}

impl JurisdictionStatsProvider for FleetFixture {
    fn stats(&self, jurisdiction: &str) -> Result<Option<JurisdictionStats>, ProviderError> {
        Ok(self.jurisdictions.get(jurisdiction).cloned())
    }
}

impl EvidenceChecklistProvider for FleetFixture {
    fn checklist(&self, violation: &ViolationId) -> Result<Vec<EvidenceItem>, ProviderError> {
        if self.evidence_offline {
            return Err(ProviderError::Unavailable("evidence store offline".to_string()));
        }
        Ok(self.evidence.get(violation).cloned().unwrap_or_default())
    }
}

impl FleetDirectory for FleetFixture {
    fn carrier(&self, _company: &CompanyId) -> Result<Option<CarrierProfile>, ProviderError> {
        Ok(self.carrier.clone())
    }

    fn driver(&self, driver: &DriverId) -> Result<Option<DriverProfile>, ProviderError> {
        Ok(self.drivers.iter().find(|profile| &profile.id == driver).cloned())
    }

    fn vehicle(&self, vehicle: &VehicleId) -> Result<Option<VehicleProfile>, ProviderError> {
        Ok(self.vehicles.iter().find(|profile| &profile.id == vehicle).cloned())
    }
}

#[derive(Default, Clone)]
pub(super) struct RecordingReminders {
    sent: Arc<Mutex<Vec<DeadlineReminder>>>,
    offline: bool,
}

impl RecordingReminders {
    pub(super) fn offline() -> Self {
        Self {
            sent: Arc::default(),
            offline: true,
        }
    }

    pub(super) fn sent(&self) -> Vec<DeadlineReminder> {
        self.sent.lock().expect("reminder mutex poisoned").clone()
    }
}

impl ReminderDispatcher for RecordingReminders {
    fn dispatch(&self, reminder: DeadlineReminder) -> Result<(), ReminderError> {
        if self.offline {
            return Err(ReminderError::Transport("smtp relay refused".to_string()));
        }
        self.sent
            .lock()
            .expect("reminder mutex poisoned")
            .push(reminder);
        Ok(())
    }
}

pub(super) type TestService = DataQService<MemoryViolationRepository, RecordingReminders>;

pub(super) fn build_service(
    violations: impl IntoIterator<Item = Violation>,
) -> (
    TestService,
    Arc<MemoryViolationRepository>,
    Arc<RecordingReminders>,
) {
    build_service_with(violations, FleetFixture::standard())
}

pub(super) fn build_service_with(
    violations: impl IntoIterator<Item = Violation>,
    fixture: FleetFixture,
) -> (
    TestService,
    Arc<MemoryViolationRepository>,
    Arc<RecordingReminders>,
) {
    let repository = Arc::new(MemoryViolationRepository::seeded(violations));
    let reminders = Arc::new(RecordingReminders::default());
    let service = DataQService::new(
        repository.clone(),
        reminders.clone(),
        fixture.into_sources(),
        TriageConfig::default(),
    );
    (service, repository, reminders)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
