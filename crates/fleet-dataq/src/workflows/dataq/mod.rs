//! DataQ challenge triage and lifecycle.
//!
//! Scans a carrier's recorded violations, ranks each one by how likely a data
//! review challenge is to succeed, projects the regulatory and insurance impact
//! of removing it, and tracks filed challenges through responses, denial
//! handling, and follow-up rounds.

pub mod domain;
pub mod facts;
pub mod impact;
pub mod lifecycle;
pub mod portfolio;
pub mod repository;
pub mod router;
pub mod scan;
pub mod service;
pub mod triage;

#[cfg(test)]
mod tests;

pub use domain::{
    ActorId, Basic, ChallengeRound, ChallengeStatus, ChallengeType, CompanyId, CourtOutcome,
    CrashReport, CrashType, DataQChallenge, DenialOptionId, DriverEmployment, DriverId,
    DriverProfile, EvidenceItem, HistoryAction, InspectionContext, Location, RdrType, RoundLog,
    RoundType, VehicleId, VehicleProfile, Violation, ViolationId, ViolationStatus,
};
pub use facts::{
    BasicPercentile, CarrierProfile, EvidenceChecklistProvider, FactBundle, FactGatherer,
    FactSources, FleetDirectory, JurisdictionStats, JurisdictionStatsProvider, ProviderError,
    RegulatorySnapshot, RegulatorySnapshotProvider,
};
pub use lifecycle::{
    ChallengeError, ChallengeLifecycle, ChallengeSubmission, CountdownStatus, CourtOutcomeUpdate,
    DenialOption, ResponseUpdate,
};
pub use portfolio::{BatchDashboard, HealthCheckSummary, OutcomeAnalytics, TriageAccuracy};
pub use repository::{
    DeadlineReminder, ReminderDispatcher, ReminderError, RepositoryError, Versioned,
    ViolationFilter, ViolationRepository,
};
pub use router::dataq_router;
pub use scan::{ScanOptions, ScanOutcome, ScanSummary};
pub use service::{DataQService, DataQServiceError, ReminderSweep};
pub use triage::{ScanResult, TriageCategory, TriageConfig, TriageEngine};
