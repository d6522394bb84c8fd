use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::triage::ScanResult;

const AVERAGE_DAYS_PER_MONTH: f64 = 30.44;

/// Identifier wrapper for recorded violations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ViolationId(pub String);

impl fmt::Display for ViolationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DriverId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub String);

/// User or job identity recorded against every audited transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Safety measurement categories a violation accumulates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basic {
    UnsafeDriving,
    HoursOfService,
    VehicleMaintenance,
    ControlledSubstances,
    DriverFitness,
    CrashIndicator,
}

impl Basic {
    pub const fn ordered() -> [Basic; 6] {
        [
            Basic::UnsafeDriving,
            Basic::HoursOfService,
            Basic::VehicleMaintenance,
            Basic::ControlledSubstances,
            Basic::DriverFitness,
            Basic::CrashIndicator,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Basic::UnsafeDriving => "Unsafe Driving",
            Basic::HoursOfService => "Hours of Service",
            Basic::VehicleMaintenance => "Vehicle Maintenance",
            Basic::ControlledSubstances => "Controlled Substances/Alcohol",
            Basic::DriverFitness => "Driver Fitness",
            Basic::CrashIndicator => "Crash Indicator",
        }
    }

    /// Intervention threshold used when a snapshot does not carry its own.
    pub const fn default_threshold(self) -> f32 {
        match self {
            Basic::UnsafeDriving | Basic::HoursOfService | Basic::CrashIndicator => 65.0,
            Basic::VehicleMaintenance | Basic::ControlledSubstances | Basic::DriverFitness => 80.0,
        }
    }

    /// Estimated percentile movement per weighted severity point.
    pub const fn percentile_per_point(self) -> f32 {
        match self {
            Basic::UnsafeDriving => 2.5,
            Basic::HoursOfService => 2.0,
            Basic::VehicleMaintenance => 1.5,
            Basic::ControlledSubstances => 3.0,
            Basic::DriverFitness => 2.0,
            Basic::CrashIndicator => 4.0,
        }
    }
}

/// Overall status of the violation record owned by the compliance system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationStatus {
    Open,
    DisputeInProgress,
    Resolved,
    Dismissed,
    Upheld,
}

impl ViolationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ViolationStatus::Open => "open",
            ViolationStatus::DisputeInProgress => "dispute_in_progress",
            ViolationStatus::Resolved => "resolved",
            ViolationStatus::Dismissed => "dismissed",
            ViolationStatus::Upheld => "upheld",
        }
    }
}

/// Status of the challenge sub-record. Only [`ChallengeStatus::can_transition_to`] moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    UnderReview,
    Accepted,
    Denied,
}

impl ChallengeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::UnderReview => "under_review",
            ChallengeStatus::Accepted => "accepted",
            ChallengeStatus::Denied => "denied",
        }
    }

    pub const fn is_active(self) -> bool {
        matches!(self, ChallengeStatus::Pending | ChallengeStatus::UnderReview)
    }

    /// Reviewer responses only; `Denied -> Pending` happens through round initiation.
    pub const fn can_transition_to(self, next: ChallengeStatus) -> bool {
        matches!(
            (self, next),
            (ChallengeStatus::Pending, ChallengeStatus::UnderReview)
                | (ChallengeStatus::UnderReview, ChallengeStatus::Accepted)
                | (ChallengeStatus::UnderReview, ChallengeStatus::Denied)
        )
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    DataError,
    PolicyViolation,
    ProceduralError,
    NotResponsible,
}

/// Request-for-data-review templates a challenge can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RdrType {
    CrashWrongCarrier,
    CrashWrongDriver,
    CrashNotReportable,
    CrashIncorrectInfo,
    CrashCpdp,
    CrashDuplicate,
    CrashMissing,
    InspectionNeverReceived,
    InspectionCitationCourt,
    InspectionViolationIncorrect,
    InspectionWrongCarrier,
    InspectionWrongDriver,
    InspectionIncorrectOther,
    InspectionMissing,
    InspectionDuplicate,
    Investigation,
    SafetyAudit,
    FineNocNov,
    CarrierInfo,
    OperatingAuthority,
    InsuranceInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RdrCategory {
    Crash,
    Inspection,
    Investigation,
    Registration,
}

impl RdrType {
    pub const fn category(self) -> RdrCategory {
        match self {
            RdrType::CrashWrongCarrier
            | RdrType::CrashWrongDriver
            | RdrType::CrashNotReportable
            | RdrType::CrashIncorrectInfo
            | RdrType::CrashCpdp
            | RdrType::CrashDuplicate
            | RdrType::CrashMissing => RdrCategory::Crash,
            RdrType::InspectionNeverReceived
            | RdrType::InspectionCitationCourt
            | RdrType::InspectionViolationIncorrect
            | RdrType::InspectionWrongCarrier
            | RdrType::InspectionWrongDriver
            | RdrType::InspectionIncorrectOther
            | RdrType::InspectionMissing
            | RdrType::InspectionDuplicate => RdrCategory::Inspection,
            RdrType::Investigation | RdrType::SafetyAudit | RdrType::FineNocNov => {
                RdrCategory::Investigation
            }
            RdrType::CarrierInfo | RdrType::OperatingAuthority | RdrType::InsuranceInfo => {
                RdrCategory::Registration
            }
        }
    }

    /// Crash and inspection requests are first decided by the state agency.
    pub const fn is_state_reviewable(self) -> bool {
        matches!(
            self.category(),
            RdrCategory::Crash | RdrCategory::Inspection
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    /// Two-letter inspection jurisdiction code.
    pub state: Option<String>,
}

/// Inspection report fields used by the carrier and procedural checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionContext {
    pub inspection_number: String,
    pub carrier_dot: Option<String>,
    pub level: Option<u8>,
    pub inspector_name: Option<String>,
    pub inspector_badge: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    InspectionReport,
    Citation,
    Evidence,
    DataqSubmission,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashType {
    RearEnd,
    Animal,
    Pedestrian,
    Cyclist,
    WeatherRelated,
    HeadOn,
    Sideswipe,
    Other,
}

impl CrashType {
    /// Crash types where the commercial driver is commonly found not at fault.
    pub const fn is_preventability_eligible(self) -> bool {
        matches!(
            self,
            CrashType::RearEnd
                | CrashType::Animal
                | CrashType::Pedestrian
                | CrashType::Cyclist
                | CrashType::WeatherRelated
        )
    }
}

/// Associated crash details for crash-related violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashReport {
    pub crash_type: CrashType,
    pub fatality: bool,
    pub injury: bool,
    pub tow_away: bool,
}

impl CrashReport {
    pub const fn is_recordable(&self) -> bool {
        self.fatality || self.injury || self.tow_away
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourtOutcome {
    Dismissed,
    Reduced,
    Upheld,
}

impl CourtOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            CourtOutcome::Dismissed => "dismissed",
            CourtOutcome::Reduced => "reduced",
            CourtOutcome::Upheld => "upheld",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtRecord {
    pub outcome: CourtOutcome,
    pub decided_on: DateTime<Utc>,
    pub notes: Option<String>,
    pub recorded_by: ActorId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverEmployment {
    CompanyDriver,
    OwnerOperator,
    Leased,
}

/// Driver context resolved from the fleet directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: DriverId,
    pub first_name: String,
    pub last_name: String,
    pub employment: DriverEmployment,
}

impl DriverProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub id: VehicleId,
    pub unit_number: String,
    pub vin: Option<String>,
}

/// Normalized checklist entry supplied by the evidence module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub item: String,
    pub required: bool,
    pub obtained: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    ChallengeSubmitted,
    StatusUpdated,
    DeadlineSet,
    DenialResponseSelected,
    RoundInitiated,
    CourtOutcomeRecorded,
    ChallengeClosed,
}

/// Human-readable audit entry appended for every lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub at: DateTime<Utc>,
    pub actor: ActorId,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReview {
    pub submitted: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Canonical next steps offered after a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenialOptionId {
    A,
    B,
    C,
    D,
    E,
}

impl DenialOptionId {
    pub const fn ordered() -> [DenialOptionId; 5] {
        [
            DenialOptionId::A,
            DenialOptionId::B,
            DenialOptionId::C,
            DenialOptionId::D,
            DenialOptionId::E,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            DenialOptionId::A => "Request FMCSA review",
            DenialOptionId::B => "Reopen with additional evidence",
            DenialOptionId::C => "Refile under different RDR type",
            DenialOptionId::D => "Go to court",
            DenialOptionId::E => "Accept and focus on clean inspections",
        }
    }
}

impl fmt::Display for DenialOptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            DenialOptionId::A => "A",
            DenialOptionId::B => "B",
            DenialOptionId::C => "C",
            DenialOptionId::D => "D",
            DenialOptionId::E => "E",
        };
        f.write_str(letter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialWorkflow {
    pub selected_option: DenialOptionId,
    pub selected_label: String,
    pub selected_at: DateTime<Utc>,
    pub selected_by: ActorId,
    pub action_taken: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundType {
    Reconsideration,
    FmcsaEscalation,
}

impl RoundType {
    pub const fn label(self) -> &'static str {
        match self {
            RoundType::Reconsideration => "Reconsideration",
            RoundType::FmcsaEscalation => "FMCSA Escalation",
        }
    }
}

/// Archived state of the challenge at the moment a new round was opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRound {
    pub round_number: u32,
    pub round_type: RoundType,
    pub initiated_at: DateTime<Utc>,
    pub initiated_by: ActorId,
    pub previous_status: ChallengeStatus,
    pub previous_response_notes: Option<String>,
}

/// Append-only round history. Round numbers are the 1-based position in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ChallengeRound>", into = "Vec<ChallengeRound>")]
pub struct RoundLog {
    rounds: Vec<ChallengeRound>,
}

impl RoundLog {
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChallengeRound> {
        self.rounds.iter()
    }

    pub fn last(&self) -> Option<&ChallengeRound> {
        self.rounds.last()
    }

    pub fn next_round_number(&self) -> u32 {
        self.rounds.len() as u32 + 1
    }

    pub fn append(
        &mut self,
        round_type: RoundType,
        initiated_at: DateTime<Utc>,
        initiated_by: ActorId,
        previous_status: ChallengeStatus,
        previous_response_notes: Option<String>,
    ) -> &ChallengeRound {
        let round_number = self.next_round_number();
        self.rounds.push(ChallengeRound {
            round_number,
            round_type,
            initiated_at,
            initiated_by,
            previous_status,
            previous_response_notes,
        });
        &self.rounds[self.rounds.len() - 1]
    }
}

impl<'a> IntoIterator for &'a RoundLog {
    type Item = &'a ChallengeRound;
    type IntoIter = std::slice::Iter<'a, ChallengeRound>;

    fn into_iter(self) -> Self::IntoIter {
        self.rounds.iter()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("round {found} recorded at position {position}; round numbers must be contiguous from 1")]
pub struct RoundSequenceError {
    pub position: usize,
    pub found: u32,
}

impl TryFrom<Vec<ChallengeRound>> for RoundLog {
    type Error = RoundSequenceError;

    fn try_from(rounds: Vec<ChallengeRound>) -> Result<Self, Self::Error> {
        for (position, round) in rounds.iter().enumerate() {
            if round.round_number as usize != position + 1 {
                return Err(RoundSequenceError {
                    position,
                    found: round.round_number,
                });
            }
        }
        Ok(Self { rounds })
    }
}

impl From<RoundLog> for Vec<ChallengeRound> {
    fn from(log: RoundLog) -> Self {
        log.rounds
    }
}

/// Challenge sub-record mutated only by the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQChallenge {
    pub submitted: bool,
    pub status: ChallengeStatus,
    pub challenge_type: ChallengeType,
    pub rdr_type: Option<RdrType>,
    pub reason: Option<String>,
    pub submission_date: DateTime<Utc>,
    pub response_date: Option<DateTime<Utc>>,
    pub response_notes: Option<String>,
    pub pending_response_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state_review: StateReview,
    pub denial_workflow: Option<DenialWorkflow>,
    #[serde(default)]
    pub rounds: RoundLog,
    #[serde(default)]
    pub escalated_to_fmcsa: bool,
    pub escalation_date: Option<DateTime<Utc>>,
}

impl DataQChallenge {
    pub fn is_active(&self) -> bool {
        self.submitted && self.status.is_active()
    }
}

/// Violation aggregate as stored by the compliance system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: ViolationId,
    pub company_id: CompanyId,
    pub driver_id: Option<DriverId>,
    pub vehicle_id: Option<VehicleId>,
    pub violation_date: DateTime<Utc>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub inspection: InspectionContext,
    pub basic: Basic,
    pub violation_type: String,
    pub violation_code: Option<String>,
    pub description: String,
    pub severity_weight: u8,
    #[serde(default)]
    pub out_of_service: bool,
    #[serde(default)]
    pub crash_related: bool,
    pub crash: Option<CrashReport>,
    pub fine_amount: Option<u32>,
    #[serde(default)]
    pub documents: Vec<ViolationDocument>,
    pub status: ViolationStatus,
    pub scan_results: Option<ScanResult>,
    pub data_q_challenge: Option<DataQChallenge>,
    pub court_outcome: Option<CourtRecord>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Violation {
    /// A fine or an attached citation document counts as a citation on record.
    pub fn has_citation(&self) -> bool {
        self.fine_amount.map(|amount| amount > 0).unwrap_or(false)
            || self
                .documents
                .iter()
                .any(|document| document.kind == DocumentKind::Citation)
    }

    pub fn has_active_challenge(&self) -> bool {
        self.data_q_challenge
            .as_ref()
            .map(DataQChallenge::is_active)
            .unwrap_or(false)
    }

    pub fn challenge_status(&self) -> Option<ChallengeStatus> {
        self.data_q_challenge
            .as_ref()
            .filter(|challenge| challenge.submitted)
            .map(|challenge| challenge.status)
    }

    pub fn record_history(
        &mut self,
        action: HistoryAction,
        at: DateTime<Utc>,
        actor: &ActorId,
        notes: impl Into<String>,
    ) {
        self.history.push(HistoryEntry {
            action,
            at,
            actor: actor.clone(),
            notes: notes.into(),
        });
    }
}

/// Whole months elapsed between two instants, never negative.
pub fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    let days = (to - from).num_days();
    if days <= 0 {
        return 0;
    }
    (days as f64 / AVERAGE_DAYS_PER_MONTH).floor() as u32
}
