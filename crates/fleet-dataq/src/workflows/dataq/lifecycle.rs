//! Challenge lifecycle state machine.
//!
//! Every mutation is a single read-modify-write committed through
//! [`ViolationRepository::compare_and_swap`]. A version conflict is retried once
//! against a fresh read; a second conflict surfaces as
//! [`ChallengeError::ConcurrentModification`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{
    ActorId, ChallengeStatus, ChallengeType, CompanyId, CourtOutcome, CourtRecord, DataQChallenge,
    DenialOptionId, DenialWorkflow, DriverProfile, HistoryAction, RdrType, RoundType, StateReview,
    VehicleProfile, Violation, ViolationId, ViolationStatus,
};
use super::facts::{FleetDirectory, ProviderError};
use super::repository::{RepositoryError, ViolationFilter, ViolationRepository};

const MAX_WRITE_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSubmission {
    pub challenge_type: ChallengeType,
    pub rdr_type: Option<RdrType>,
    pub reason: Option<String>,
    pub response_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state_review_submitted: bool,
    pub actor: ActorId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseUpdate {
    pub status: ChallengeStatus,
    pub notes: Option<String>,
    pub actor: ActorId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtOutcomeUpdate {
    pub outcome: CourtOutcome,
    pub decided_on: DateTime<Utc>,
    pub notes: Option<String>,
    pub actor: ActorId,
}

/// Deadline urgency for a challenge. All fields but `has_pending_deadline` are `None` without a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownStatus {
    pub has_pending_deadline: bool,
    pub deadline: Option<DateTime<Utc>>,
    pub days_remaining: Option<i64>,
    pub is_urgent: Option<bool>,
    pub is_expired: Option<bool>,
}

impl CountdownStatus {
    pub fn none() -> Self {
        Self {
            has_pending_deadline: false,
            deadline: None,
            days_remaining: None,
            is_urgent: None,
            is_expired: None,
        }
    }
}

fn pending_deadline(violation: &Violation) -> Option<DateTime<Utc>> {
    violation
        .data_q_challenge
        .as_ref()
        .and_then(|challenge| challenge.pending_response_deadline)
}

fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    const MILLIS_PER_DAY: f64 = 86_400_000.0;
    let remaining_ms = (deadline - now).num_milliseconds() as f64;
    (remaining_ms / MILLIS_PER_DAY).ceil() as i64
}

/// Whole days left before the pending response deadline, partial days rounded up.
pub fn days_remaining(violation: &Violation, now: DateTime<Utc>) -> Option<i64> {
    pending_deadline(violation).map(|deadline| days_until(deadline, now))
}

/// Countdown to the pending response deadline, rounding partial days up.
pub fn countdown_status(violation: &Violation, now: DateTime<Utc>, urgent_days: i64) -> CountdownStatus {
    let Some(deadline) = pending_deadline(violation) else {
        return CountdownStatus::none();
    };
    let days_remaining = days_until(deadline, now);

    CountdownStatus {
        has_pending_deadline: true,
        deadline: Some(deadline),
        days_remaining: Some(days_remaining),
        is_urgent: Some(days_remaining > 0 && days_remaining <= urgent_days),
        is_expired: Some(days_remaining <= 0),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingDeadline {
    pub violation_id: ViolationId,
    pub company_id: CompanyId,
    pub violation_code: Option<String>,
    pub status: ChallengeStatus,
    pub countdown: CountdownStatus,
}

impl PendingDeadline {
    pub fn days_remaining(&self) -> i64 {
        self.countdown.days_remaining.unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveChallenge {
    pub violation: Violation,
    pub driver: Option<DriverProfile>,
    pub vehicle: Option<VehicleProfile>,
    pub countdown: CountdownStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialOption {
    pub id: DenialOptionId,
    pub label: String,
    pub description: String,
    pub available: bool,
    pub reason: Option<String>,
}

fn option_description(option: DenialOptionId) -> &'static str {
    match option {
        DenialOptionId::A => "Escalate to FMCSA for federal review of the state decision.",
        DenialOptionId::B => {
            "Submit documents or information that were not part of the original challenge."
        }
        DenialOptionId::C => "Start a new challenge under a request type that fits the situation better.",
        DenialOptionId::D => {
            "Contest the underlying citation in court and use a dismissal or reduction to support a new challenge."
        }
        DenialOptionId::E => {
            "Accept the denial; the violation ages off the record with decreasing weight."
        }
    }
}

/// The five canonical post-denial options, each gated on the violation's context.
pub fn denial_options_for(violation: &Violation) -> Vec<DenialOption> {
    let challenge = violation.data_q_challenge.as_ref();
    let state_reviewable = challenge
        .and_then(|challenge| challenge.rdr_type)
        .map(RdrType::is_state_reviewable)
        .unwrap_or(false);
    let state_review_done = challenge
        .map(|challenge| challenge.state_review.submitted)
        .unwrap_or(false);
    let has_citation = violation.has_citation();

    DenialOptionId::ordered()
        .into_iter()
        .map(|id| {
            let unavailable = match id {
                DenialOptionId::A if !state_reviewable => Some(
                    "Only available for RDR-type challenges that are reviewed at state level",
                ),
                DenialOptionId::A if !state_review_done => {
                    Some("Requires state-level review to have been completed first")
                }
                DenialOptionId::D if !has_citation => Some(
                    "No citation on record for this violation. Court option requires a citation to contest.",
                ),
                _ => None,
            };

            DenialOption {
                id,
                label: id.label().to_string(),
                description: option_description(id).to_string(),
                available: unavailable.is_none(),
                reason: unavailable.map(str::to_string),
            }
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    #[error("violation {0} not found")]
    NotFound(ViolationId),
    #[error("violation {violation_id}: {reason}")]
    PreconditionFailed {
        violation_id: ViolationId,
        reason: String,
    },
    #[error("violation {0} was modified concurrently; retry the request")]
    ConcurrentModification(ViolationId),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("option {option} unavailable: {reason}")]
    OptionUnavailable {
        option: DenialOptionId,
        reason: String,
    },
    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Lifecycle manager for the challenge sub-record of a violation.
pub struct ChallengeLifecycle<R> {
    repository: Arc<R>,
    directory: Arc<dyn FleetDirectory>,
    urgent_days: i64,
}

impl<R> ChallengeLifecycle<R>
where
    R: ViolationRepository + 'static,
{
    pub fn new(repository: Arc<R>, directory: Arc<dyn FleetDirectory>, urgent_days: i64) -> Self {
        Self {
            repository,
            directory,
            urgent_days,
        }
    }

    pub fn countdown(&self, violation: &Violation, now: DateTime<Utc>) -> CountdownStatus {
        countdown_status(violation, now, self.urgent_days)
    }

    /// File a challenge for a violation that has none on record.
    pub fn submit(
        &self,
        violation_id: &ViolationId,
        submission: ChallengeSubmission,
        now: DateTime<Utc>,
    ) -> Result<Violation, ChallengeError> {
        if let Some(reason) = submission.reason.as_deref() {
            if reason.trim().is_empty() {
                return Err(ChallengeError::InvalidInput {
                    field: "reason",
                    reason: "reason must not be blank".to_string(),
                });
            }
        }

        let violation = self.commit(violation_id, |violation| {
            if violation.data_q_challenge.is_some() {
                return Err(ChallengeError::InvalidTransition(format!(
                    "violation {} already has a challenge on record",
                    violation.id
                )));
            }

            violation.data_q_challenge = Some(DataQChallenge {
                submitted: true,
                status: ChallengeStatus::Pending,
                challenge_type: submission.challenge_type,
                rdr_type: submission.rdr_type,
                reason: submission.reason.clone(),
                submission_date: now,
                response_date: None,
                response_notes: None,
                pending_response_deadline: submission.response_deadline,
                state_review: StateReview {
                    submitted: submission.state_review_submitted,
                    submitted_at: submission.state_review_submitted.then_some(now),
                },
                denial_workflow: None,
                rounds: Default::default(),
                escalated_to_fmcsa: false,
                escalation_date: None,
            });
            violation.status = ViolationStatus::DisputeInProgress;
            let notes = match submission.rdr_type {
                Some(rdr) => format!("DataQ challenge submitted ({rdr:?})"),
                None => "DataQ challenge submitted".to_string(),
            };
            violation.record_history(HistoryAction::ChallengeSubmitted, now, &submission.actor, notes);
            Ok(())
        })?;

        info!(violation_id = %violation_id, actor = %submission.actor, status = "pending", "challenge submitted");
        Ok(violation)
    }

    /// Record a reviewer response. Only `pending -> under_review -> accepted|denied` is allowed.
    pub fn record_response(
        &self,
        violation_id: &ViolationId,
        update: ResponseUpdate,
        now: DateTime<Utc>,
    ) -> Result<Violation, ChallengeError> {
        let violation = self.commit(violation_id, |violation| {
            let challenge = challenge_mut(violation)?;
            let current = challenge.status;
            if !current.can_transition_to(update.status) {
                return Err(ChallengeError::InvalidTransition(format!(
                    "cannot move challenge from {current} to {}",
                    update.status
                )));
            }

            challenge.status = update.status;
            if let Some(notes) = &update.notes {
                challenge.response_notes = Some(notes.clone());
            }
            let parent_status = match update.status {
                ChallengeStatus::Accepted => Some(ViolationStatus::Dismissed),
                ChallengeStatus::Denied => Some(ViolationStatus::Upheld),
                _ => None,
            };
            if parent_status.is_some() {
                challenge.response_date = Some(now);
                challenge.pending_response_deadline = None;
            }
            if let Some(status) = parent_status {
                violation.status = status;
            }

            let mut notes = format!("Challenge status updated: {current} -> {}", update.status);
            if let Some(extra) = &update.notes {
                notes.push_str(&format!(" ({extra})"));
            }
            violation.record_history(HistoryAction::StatusUpdated, now, &update.actor, notes);
            Ok(())
        })?;

        info!(violation_id = %violation_id, actor = %update.actor, status = %update.status, "challenge response recorded");
        Ok(violation)
    }

    pub fn set_response_deadline(
        &self,
        violation_id: &ViolationId,
        deadline: DateTime<Utc>,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<Violation, ChallengeError> {
        let violation = self.commit(violation_id, |violation| {
            let challenge = challenge_mut(violation)?;
            if !challenge.is_active() {
                return Err(ChallengeError::InvalidTransition(format!(
                    "deadline requires an active challenge, status is {}",
                    challenge.status
                )));
            }
            challenge.pending_response_deadline = Some(deadline);
            violation.record_history(
                HistoryAction::DeadlineSet,
                now,
                actor,
                format!("Response deadline set to {}", deadline.format("%Y-%m-%d")),
            );
            Ok(())
        })?;

        info!(violation_id = %violation_id, actor = %actor, deadline = %deadline, "response deadline set");
        Ok(violation)
    }

    /// Active challenges with a deadline, most urgent first.
    pub fn check_pending_deadlines(
        &self,
        company: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingDeadline>, ChallengeError> {
        let filter = ViolationFilter {
            has_deadline: Some(true),
            ..ViolationFilter::with_statuses([ChallengeStatus::Pending, ChallengeStatus::UnderReview])
        };

        let mut pending: Vec<PendingDeadline> = self
            .repository
            .company_violations(company, &filter)?
            .into_iter()
            .filter_map(|stored| {
                let violation = stored.record;
                let countdown = self.countdown(&violation, now);
                let status = violation.challenge_status()?;
                countdown.has_pending_deadline.then(|| PendingDeadline {
                    violation_id: violation.id.clone(),
                    company_id: violation.company_id.clone(),
                    violation_code: violation.violation_code.clone(),
                    status,
                    countdown,
                })
            })
            .collect();

        pending.sort_by(|a, b| {
            a.days_remaining()
                .cmp(&b.days_remaining())
                .then_with(|| a.violation_id.cmp(&b.violation_id))
        });

        debug!(company_id = %company.0, count = pending.len(), "deadline sweep computed");
        Ok(pending)
    }

    pub fn denial_options(&self, violation_id: &ViolationId) -> Result<Vec<DenialOption>, ChallengeError> {
        let stored = self
            .repository
            .fetch(violation_id)?
            .ok_or_else(|| ChallengeError::NotFound(violation_id.clone()))?;
        if stored.record.data_q_challenge.is_none() {
            return Err(no_challenge(violation_id));
        }
        Ok(denial_options_for(&stored.record))
    }

    /// Record the chosen post-denial step. The challenge status is left untouched.
    pub fn select_denial_option(
        &self,
        violation_id: &ViolationId,
        option: DenialOptionId,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<Violation, ChallengeError> {
        let violation = self.commit(violation_id, |violation| {
            require_denied(violation)?;
            ensure_option_available(violation, option)?;

            let challenge = challenge_mut(violation)?;
            challenge.denial_workflow = Some(DenialWorkflow {
                selected_option: option,
                selected_label: option.label().to_string(),
                selected_at: now,
                selected_by: actor.clone(),
                action_taken: false,
            });
            violation.record_history(
                HistoryAction::DenialResponseSelected,
                now,
                actor,
                format!("Selected denial response: Option {option} - {}", option.label()),
            );
            Ok(())
        })?;

        info!(violation_id = %violation_id, actor = %actor, option = %option, "denial response selected");
        Ok(violation)
    }

    /// Archive the denied round and reopen the challenge as pending.
    pub fn initiate_round(
        &self,
        violation_id: &ViolationId,
        round_type: RoundType,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<Violation, ChallengeError> {
        let mut round_number = 0;
        let violation = self.commit(violation_id, |violation| {
            require_denied(violation)?;
            if round_type == RoundType::FmcsaEscalation {
                ensure_option_available(violation, DenialOptionId::A)?;
            }

            let challenge = challenge_mut(violation)?;
            let previous_status = challenge.status;
            let previous_notes = challenge.response_notes.take();
            round_number = challenge
                .rounds
                .append(round_type, now, actor.clone(), previous_status, previous_notes)
                .round_number;

            challenge.status = ChallengeStatus::Pending;
            challenge.response_date = None;
            if round_type == RoundType::FmcsaEscalation {
                challenge.escalated_to_fmcsa = true;
                challenge.escalation_date = Some(now);
            }
            if let Some(workflow) = challenge.denial_workflow.as_mut() {
                workflow.action_taken = true;
            }

            violation.status = ViolationStatus::DisputeInProgress;
            violation.record_history(
                HistoryAction::RoundInitiated,
                now,
                actor,
                format!("Round {round_number} initiated: {}", round_type.label()),
            );
            Ok(())
        })?;

        info!(
            violation_id = %violation_id,
            actor = %actor,
            round = round_number,
            round_type = round_type.label(),
            status = "pending",
            "challenge round initiated"
        );
        Ok(violation)
    }

    /// Record the court result for the underlying citation.
    pub fn record_court_outcome(
        &self,
        violation_id: &ViolationId,
        update: CourtOutcomeUpdate,
        now: DateTime<Utc>,
    ) -> Result<Violation, ChallengeError> {
        let violation = self.commit(violation_id, |violation| {
            if !violation.has_citation() {
                return Err(ChallengeError::PreconditionFailed {
                    violation_id: violation.id.clone(),
                    reason: "No citation on record for this violation. Court option requires a citation to contest.".to_string(),
                });
            }

            violation.court_outcome = Some(CourtRecord {
                outcome: update.outcome,
                decided_on: update.decided_on,
                notes: update.notes.clone(),
                recorded_by: update.actor.clone(),
            });
            if let Some(workflow) = violation
                .data_q_challenge
                .as_mut()
                .and_then(|challenge| challenge.denial_workflow.as_mut())
                .filter(|workflow| workflow.selected_option == DenialOptionId::D)
            {
                workflow.action_taken = true;
            }
            violation.record_history(
                HistoryAction::CourtOutcomeRecorded,
                now,
                &update.actor,
                format!("Court outcome recorded: {}", update.outcome.label()),
            );
            Ok(())
        })?;

        info!(violation_id = %violation_id, actor = %update.actor, outcome = update.outcome.label(), "court outcome recorded");
        Ok(violation)
    }

    /// Close a denied challenge without another round.
    pub fn close_challenge(
        &self,
        violation_id: &ViolationId,
        actor: &ActorId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Violation, ChallengeError> {
        let violation = self.commit(violation_id, |violation| {
            require_denied(violation)?;

            let challenge = challenge_mut(violation)?;
            let workflow = challenge.denial_workflow.get_or_insert_with(|| DenialWorkflow {
                selected_option: DenialOptionId::E,
                selected_label: DenialOptionId::E.label().to_string(),
                selected_at: now,
                selected_by: actor.clone(),
                action_taken: false,
            });
            workflow.action_taken = true;
            let option = workflow.selected_option;

            violation.status = ViolationStatus::Upheld;
            let mut entry = format!("Challenge closed after denial (Option {option})");
            if let Some(extra) = notes.as_deref() {
                entry.push_str(&format!(": {extra}"));
            }
            violation.record_history(HistoryAction::ChallengeClosed, now, actor, entry);
            Ok(())
        })?;

        info!(violation_id = %violation_id, actor = %actor, status = "denied", "challenge closed");
        Ok(violation)
    }

    /// Pending and under-review challenges, newest submission first.
    pub fn active_challenges(
        &self,
        company: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActiveChallenge>, ChallengeError> {
        let filter =
            ViolationFilter::with_statuses([ChallengeStatus::Pending, ChallengeStatus::UnderReview]);
        let mut active = Vec::new();
        for stored in self.repository.company_violations(company, &filter)? {
            let violation = stored.record;
            let driver = match &violation.driver_id {
                Some(id) => self.directory.driver(id)?,
                None => None,
            };
            let vehicle = match &violation.vehicle_id {
                Some(id) => self.directory.vehicle(id)?,
                None => None,
            };
            let countdown = self.countdown(&violation, now);
            active.push(ActiveChallenge {
                violation,
                driver,
                vehicle,
                countdown,
            });
        }

        active.sort_by(|a, b| submission_date(&b.violation).cmp(&submission_date(&a.violation)));
        Ok(active)
    }

    fn commit<F>(&self, violation_id: &ViolationId, mut apply: F) -> Result<Violation, ChallengeError>
    where
        F: FnMut(&mut Violation) -> Result<(), ChallengeError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let stored = self
                .repository
                .fetch(violation_id)?
                .ok_or_else(|| ChallengeError::NotFound(violation_id.clone()))?;

            let mut record = stored.record;
            apply(&mut record)?;

            match self.repository.compare_and_swap(record.clone(), stored.version) {
                Ok(_) => return Ok(record),
                Err(RepositoryError::VersionConflict { expected, found }) => {
                    if attempt >= MAX_WRITE_ATTEMPTS {
                        return Err(ChallengeError::ConcurrentModification(violation_id.clone()));
                    }
                    debug!(violation_id = %violation_id, expected, found, "version conflict, retrying");
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}

fn submission_date(violation: &Violation) -> Option<DateTime<Utc>> {
    violation
        .data_q_challenge
        .as_ref()
        .map(|challenge| challenge.submission_date)
}

fn no_challenge(violation_id: &ViolationId) -> ChallengeError {
    ChallengeError::PreconditionFailed {
        violation_id: violation_id.clone(),
        reason: "No DataQ challenge exists for this violation".to_string(),
    }
}

fn challenge_mut(violation: &mut Violation) -> Result<&mut DataQChallenge, ChallengeError> {
    let id = violation.id.clone();
    violation
        .data_q_challenge
        .as_mut()
        .ok_or_else(|| no_challenge(&id))
}

fn require_denied(violation: &Violation) -> Result<(), ChallengeError> {
    match violation.data_q_challenge.as_ref() {
        None => Err(no_challenge(&violation.id)),
        Some(challenge) if challenge.status == ChallengeStatus::Denied => Ok(()),
        Some(challenge) => Err(ChallengeError::InvalidTransition(format!(
            "challenge must be denied, status is {}",
            challenge.status
        ))),
    }
}

fn ensure_option_available(violation: &Violation, option: DenialOptionId) -> Result<(), ChallengeError> {
    let gated = denial_options_for(violation)
        .into_iter()
        .find(|candidate| candidate.id == option);
    match gated {
        Some(candidate) if !candidate.available => Err(ChallengeError::OptionUnavailable {
            option,
            reason: candidate.reason.unwrap_or_default(),
        }),
        _ => Ok(()),
    }
}
