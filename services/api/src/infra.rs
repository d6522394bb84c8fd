use chrono::{DateTime, Duration, NaiveDate, Utc};
use fleet_dataq::workflows::dataq::{
    domain::{DocumentKind, ViolationDocument},
    Basic, BasicPercentile, CarrierProfile, ChallengeStatus, ChallengeType, CompanyId,
    DataQChallenge, DataQService, DeadlineReminder, DriverEmployment, DriverId, DriverProfile,
    EvidenceChecklistProvider, EvidenceItem, FactSources, FleetDirectory, InspectionContext,
    JurisdictionStats, JurisdictionStatsProvider, Location, ProviderError, RdrType,
    RegulatorySnapshot, RegulatorySnapshotProvider, ReminderDispatcher, ReminderError,
    RepositoryError, TriageConfig, VehicleId, VehicleProfile, Versioned, Violation,
    ViolationFilter, ViolationId, ViolationRepository, ViolationStatus,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type DemoService = DataQService<InMemoryViolationRepository, TracingReminderDispatcher>;

pub(crate) const DEMO_CARRIER: &str = "carrier-demo";
const DEMO_DOT: &str = "3141592";

#[derive(Default, Clone)]
pub(crate) struct InMemoryViolationRepository {
    records: Arc<Mutex<HashMap<ViolationId, Versioned<Violation>>>>,
}

impl InMemoryViolationRepository {
    fn guard(&self) -> Result<MutexGuard<'_, HashMap<ViolationId, Versioned<Violation>>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("violation store lock poisoned".to_string()))
    }
}

impl ViolationRepository for InMemoryViolationRepository {
    fn fetch(&self, id: &ViolationId) -> Result<Option<Versioned<Violation>>, RepositoryError> {
        Ok(self.guard()?.get(id).cloned())
    }

    fn company_violations(
        &self,
        company: &CompanyId,
        filter: &ViolationFilter,
    ) -> Result<Vec<Versioned<Violation>>, RepositoryError> {
        let mut matching: Vec<_> = self
            .guard()?
            .values()
            .filter(|stored| &stored.record.company_id == company && filter.matches(&stored.record))
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
        let mut guard = self.guard()?;
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
        let mut guard = self.guard()?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        let stored = Versioned { version: 1, record };
        guard.insert(stored.record.id.clone(), stored.clone());
        Ok(stored)
    }
}

/// Reminder sink that records each reminder in the service log.
#[derive(Default, Clone)]
pub(crate) struct TracingReminderDispatcher {
    sent: Arc<Mutex<Vec<DeadlineReminder>>>,
}

impl TracingReminderDispatcher {
    pub(crate) fn sent(&self) -> Vec<DeadlineReminder> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ReminderDispatcher for TracingReminderDispatcher {
    fn dispatch(&self, reminder: DeadlineReminder) -> Result<(), ReminderError> {
        info!(
            template = %reminder.template,
            violation_id = %reminder.violation_id,
            days_remaining = reminder.days_remaining,
            deadline = %reminder.deadline,
            "deadline reminder queued"
        );
        self.sent
            .lock()
            .map_err(|_| ReminderError::Transport("reminder log lock poisoned".to_string()))?
            .push(reminder);
        Ok(())
    }
}

/// Fixed carrier, driver, and jurisdiction data standing in for the fleet system.
#[derive(Debug, Clone)]
pub(crate) struct StaticFleetData {
    snapshot: RegulatorySnapshot,
    jurisdictions: BTreeMap<String, JurisdictionStats>,
    evidence: HashMap<ViolationId, Vec<EvidenceItem>>,
    carrier: CarrierProfile,
    drivers: Vec<DriverProfile>,
    vehicles: Vec<VehicleProfile>,
}

impl StaticFleetData {
    pub(crate) fn into_sources(self) -> FactSources {
        let data = Arc::new(self);
        FactSources {
            snapshots: data.clone(),
            jurisdictions: data.clone(),
            evidence: data.clone(),
            directory: data,
        }
    }
}

impl RegulatorySnapshotProvider for StaticFleetData {
    fn snapshot(&self, company: &CompanyId) -> Result<Option<RegulatorySnapshot>, ProviderError> {
        Ok((company == &self.snapshot.company_id).then(|| self.snapshot.clone()))
    }
}

impl JurisdictionStatsProvider for StaticFleetData {
    fn stats(&self, jurisdiction: &str) -> Result<Option<JurisdictionStats>, ProviderError> {
        Ok(self.jurisdictions.get(jurisdiction).cloned())
    }
}

impl EvidenceChecklistProvider for StaticFleetData {
    fn checklist(&self, violation: &ViolationId) -> Result<Vec<EvidenceItem>, ProviderError> {
        Ok(self.evidence.get(violation).cloned().unwrap_or_default())
    }
}

impl FleetDirectory for StaticFleetData {
    fn carrier(&self, company: &CompanyId) -> Result<Option<CarrierProfile>, ProviderError> {
        Ok((company == &self.carrier.id).then(|| self.carrier.clone()))
    }

    fn driver(&self, driver: &DriverId) -> Result<Option<DriverProfile>, ProviderError> {
        Ok(self.drivers.iter().find(|profile| &profile.id == driver).cloned())
    }

    fn vehicle(&self, vehicle: &VehicleId) -> Result<Option<VehicleProfile>, ProviderError> {
        Ok(self.vehicles.iter().find(|profile| &profile.id == vehicle).cloned())
    }
}

pub(crate) fn demo_carrier() -> CompanyId {
    CompanyId(DEMO_CARRIER.to_string())
}

fn stat(jurisdiction: &str, approval_rate: f32, average_response_days: u32) -> JurisdictionStats {
    JurisdictionStats {
        jurisdiction: jurisdiction.to_string(),
        approval_rate,
        average_response_days: Some(average_response_days),
    }
}

fn driver(id: &str, first: &str, last: &str, employment: DriverEmployment) -> DriverProfile {
    DriverProfile {
        id: DriverId(id.to_string()),
        first_name: first.to_string(),
        last_name: last.to_string(),
        employment,
    }
}

pub(crate) fn demo_fleet(now: DateTime<Utc>) -> StaticFleetData {
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
            percent: 58.0,
            threshold: None,
        },
    );
    basics.insert(
        Basic::UnsafeDriving,
        BasicPercentile {
            percent: 44.0,
            threshold: None,
        },
    );

    let mut jurisdictions = BTreeMap::new();
    for stats in [stat("IA", 0.70, 21), stat("NE", 0.38, 34), stat("MO", 0.52, 28)] {
        jurisdictions.insert(stats.jurisdiction.clone(), stats);
    }

    let mut evidence = HashMap::new();
    evidence.insert(
        ViolationId("dv-brakes".to_string()),
        vec![
            EvidenceItem {
                item: "Annual inspection report".to_string(),
                required: true,
                obtained: true,
            },
            EvidenceItem {
                item: "Brake adjustment work order".to_string(),
                required: true,
                obtained: true,
            },
            EvidenceItem {
                item: "Post-trip DVIR".to_string(),
                required: true,
                obtained: false,
            },
        ],
    );

    StaticFleetData {
        snapshot: RegulatorySnapshot {
            company_id: demo_carrier(),
            captured_at: now - Duration::days(2),
            basics,
        },
        jurisdictions,
        evidence,
        carrier: CarrierProfile {
            id: demo_carrier(),
            name: "Ridgeline Freight".to_string(),
            dot_number: Some(DEMO_DOT.to_string()),
        },
        drivers: vec![
            driver("drv-ortiz", "Luis", "Ortiz", DriverEmployment::CompanyDriver),
            driver("drv-banks", "Renee", "Banks", DriverEmployment::OwnerOperator),
        ],
        vehicles: vec![
            VehicleProfile {
                id: VehicleId("unit-42".to_string()),
                unit_number: "42".to_string(),
                vin: Some("1FUJGLDR0CLBP8834".to_string()),
            },
            VehicleProfile {
                id: VehicleId("unit-17".to_string()),
                unit_number: "17".to_string(),
                vin: None,
            },
        ],
    }
}

struct Seed<'a> {
    id: &'a str,
    days_old: i64,
    state: &'a str,
    city: &'a str,
    basic: Basic,
    code: &'a str,
    violation_type: &'a str,
    severity_weight: u8,
    driver: &'a str,
    vehicle: &'a str,
}

fn seeded(seed: Seed<'_>, now: DateTime<Utc>) -> Violation {
    Violation {
        id: ViolationId(seed.id.to_string()),
        company_id: demo_carrier(),
        driver_id: Some(DriverId(seed.driver.to_string())),
        vehicle_id: Some(VehicleId(seed.vehicle.to_string())),
        violation_date: now - Duration::days(seed.days_old),
        location: Location {
            city: Some(seed.city.to_string()),
            state: Some(seed.state.to_string()),
        },
        inspection: InspectionContext {
            inspection_number: format!("{}-{}", seed.state, seed.id),
            carrier_dot: Some(DEMO_DOT.to_string()),
            level: Some(1),
            inspector_name: Some("Trooper Hale".to_string()),
            inspector_badge: Some("4471".to_string()),
        },
        basic: seed.basic,
        violation_type: seed.violation_type.to_string(),
        violation_code: Some(seed.code.to_string()),
        description: seed.violation_type.to_string(),
        severity_weight: seed.severity_weight,
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

/// Demo carrier portfolio: fresh, aging, expiring, cited, and already-challenged violations.
pub(crate) fn demo_violations(now: DateTime<Utc>) -> Vec<Violation> {
    let logbook = seeded(
        Seed {
            id: "dv-logbook",
            days_old: 31,
            state: "IA",
            city: "Des Moines",
            basic: Basic::HoursOfService,
            code: "395.8(e)",
            violation_type: "False log",
            severity_weight: 7,
            driver: "drv-ortiz",
            vehicle: "unit-42",
        },
        now,
    );

    let brakes = seeded(
        Seed {
            id: "dv-brakes",
            days_old: 140,
            state: "MO",
            city: "Kansas City",
            basic: Basic::VehicleMaintenance,
            code: "393.47(e)",
            violation_type: "Brake out of adjustment",
            severity_weight: 4,
            driver: "drv-banks",
            vehicle: "unit-17",
        },
        now,
    );

    let expiring = seeded(
        Seed {
            id: "dv-expiring",
            days_old: 705,
            state: "IA",
            city: "Ames",
            basic: Basic::HoursOfService,
            code: "395.3(a)(2)",
            violation_type: "14-hour rule",
            severity_weight: 7,
            driver: "drv-ortiz",
            vehicle: "unit-42",
        },
        now,
    );

    let mut speeding = seeded(
        Seed {
            id: "dv-speeding",
            days_old: 260,
            state: "NE",
            city: "Omaha",
            basic: Basic::UnsafeDriving,
            code: "392.2S",
            violation_type: "Speeding 6-10 mph over",
            severity_weight: 4,
            driver: "drv-banks",
            vehicle: "unit-17",
        },
        now,
    );
    speeding.fine_amount = Some(180);
    speeding.documents.push(ViolationDocument {
        name: "citation-omaha.pdf".to_string(),
        kind: DocumentKind::Citation,
        uploaded_at: Some(now - Duration::days(250)),
    });

    let mut lamps = seeded(
        Seed {
            id: "dv-lamps",
            days_old: 90,
            state: "IA",
            city: "Davenport",
            basic: Basic::VehicleMaintenance,
            code: "393.9",
            violation_type: "Inoperable required lamp",
            severity_weight: 6,
            driver: "drv-ortiz",
            vehicle: "unit-42",
        },
        now,
    );
    lamps.status = ViolationStatus::DisputeInProgress;
    lamps.data_q_challenge = Some(DataQChallenge {
        submitted: true,
        status: ChallengeStatus::UnderReview,
        challenge_type: ChallengeType::DataError,
        rdr_type: Some(RdrType::InspectionViolationIncorrect),
        reason: Some("Lamp repaired roadside before the inspection closed".to_string()),
        submission_date: now - Duration::days(12),
        response_date: None,
        response_notes: None,
        pending_response_deadline: Some(now + Duration::days(2)),
        state_review: Default::default(),
        denial_workflow: None,
        rounds: Default::default(),
        escalated_to_fmcsa: false,
        escalation_date: None,
    });

    vec![logbook, brakes, expiring, speeding, lamps]
}

/// Build the service over in-memory adapters seeded with the demo portfolio.
pub(crate) fn demo_service(
    config: TriageConfig,
    now: DateTime<Utc>,
) -> Result<(DemoService, Arc<TracingReminderDispatcher>), RepositoryError> {
    let repository = Arc::new(InMemoryViolationRepository::default());
    for violation in demo_violations(now) {
        repository.insert(violation)?;
    }
    let reminders = Arc::new(TracingReminderDispatcher::default());
    let service = DataQService::new(
        repository,
        reminders.clone(),
        demo_fleet(now).into_sources(),
        config,
    );
    Ok((service, reminders))
}

/// Parse a `YYYY-MM-DD` flag into noon UTC of that day.
pub(crate) fn parse_as_of(raw: &str) -> Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
        .and_then(|date| {
            date.and_hms_opt(12, 0, 0)
                .map(|noon| noon.and_utc())
                .ok_or_else(|| format!("'{raw}' has no noon instant"))
        })
}
