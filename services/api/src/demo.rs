use crate::infra::{demo_carrier, demo_service, DemoService};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use fleet_dataq::config::AppConfig;
use fleet_dataq::error::AppError;
use fleet_dataq::telemetry;
use fleet_dataq::workflows::dataq::{
    ActorId, ChallengeStatus, ChallengeSubmission, ChallengeType, DataQServiceError,
    DenialOptionId, RdrType, ResponseUpdate, RoundType, ScanOptions, ViolationId,
};

const DEMO_ACTOR: &str = "safety-manager";
const DEMO_CHALLENGE: &str = "dv-logbook";

#[derive(Args, Debug, Default)]
pub(crate) struct ScanArgs {
    /// Rescan violations that already carry a recent scan result.
    #[arg(long)]
    pub(crate) force: bool,
    /// Evaluation date (YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_as_of)]
    pub(crate) as_of: Option<DateTime<Utc>>,
    /// Print every scored violation after the summary.
    #[arg(long)]
    pub(crate) list: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct SweepArgs {
    /// Evaluation date (YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_as_of)]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Evaluation date (YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_as_of)]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

fn build(as_of: Option<DateTime<Utc>>) -> Result<(DemoService, DateTime<Utc>), AppError> {
    let config = AppConfig::load()?;
    let now = as_of.unwrap_or_else(Utc::now);
    let (service, _) = demo_service(config.triage, now).map_err(DataQServiceError::from)?;
    Ok((service, now))
}

pub(crate) fn run_scan(args: ScanArgs) -> Result<(), AppError> {
    let (service, now) = build(args.as_of)?;
    let carrier = demo_carrier();

    let summary = service.scan_company(&carrier, ScanOptions { force: args.force }, now)?;

    println!("Violation scan for {} as of {}", carrier.0, now.format("%Y-%m-%d"));
    println!("Scanned: {}", summary.scanned);
    println!("Flagged: {}", summary.flagged);
    println!(
        "Skipped: {} active challenge(s), {} recently scanned, {} expired",
        summary.skipped_active, summary.skipped_fresh, summary.skipped_expired
    );

    if !summary.categories.is_empty() {
        println!("\nCategories");
        for (category, count) in &summary.categories {
            println!("- {}: {}", category.label(), count);
        }
    }

    if !summary.failures.is_empty() {
        println!("\nFailures");
        for failure in &summary.failures {
            println!("- {}: {}", failure.violation_id, failure.error);
        }
    }

    if args.list {
        let health = service.health_check(&carrier, now)?;
        println!("\nTop flagged violations");
        if health.top_flagged.is_empty() {
            println!("- none");
        }
        for entry in &health.top_flagged {
            println!(
                "- {} [{}] {} score {} ({} flag(s))",
                entry.violation_id,
                entry.violation_code.as_deref().unwrap_or("no code"),
                entry.category.label(),
                entry.priority_score,
                entry.flag_count
            );
        }
    }

    Ok(())
}

pub(crate) fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let now = args.as_of.unwrap_or_else(Utc::now);
    let (service, reminders) =
        demo_service(config.triage, now).map_err(DataQServiceError::from)?;

    let sweep = service.send_deadline_reminders(&demo_carrier(), now)?;

    println!("Deadline sweep as of {}", now.format("%Y-%m-%d"));
    println!("Pending deadlines checked: {}", sweep.checked);
    println!("Reminders dispatched: {}", sweep.dispatched);
    for reminder in reminders.sent() {
        println!(
            "- {} {} ({} day(s) remaining, due {})",
            reminder.violation_id,
            reminder.template,
            reminder.days_remaining,
            reminder.deadline.format("%Y-%m-%d")
        );
    }
    if !sweep.failed.is_empty() {
        println!("Failed to dispatch:");
        for violation_id in &sweep.failed {
            println!("- {}", violation_id);
        }
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let (service, now) = build(args.as_of)?;
    let carrier = demo_carrier();
    let actor = ActorId(DEMO_ACTOR.to_string());
    let target = ViolationId(DEMO_CHALLENGE.to_string());

    let summary = service.scan_company(&carrier, ScanOptions::default(), now)?;
    println!("Fleet DataQ walkthrough for {}", carrier.0);
    println!(
        "Scanned {} violation(s), {} flagged for review",
        summary.scanned, summary.flagged
    );

    let health = service.health_check(&carrier, now)?;
    println!("\nHealth check");
    println!(
        "- {} actionable, {} severity point(s) removable, ${} estimated savings",
        health.actionable, health.total_points_removable, health.total_estimated_savings
    );
    for entry in &health.top_flagged {
        println!(
            "- {}: {} (score {})",
            entry.violation_id,
            entry.category.label(),
            entry.priority_score
        );
    }

    let preview = service.preview_score(&target, now)?;
    println!("\nChallenging {}", target);
    println!(
        "- {} / {}",
        preview.category.label(),
        preview.recommendation.action.label()
    );

    service.submit_challenge(
        &target,
        ChallengeSubmission {
            challenge_type: ChallengeType::DataError,
            rdr_type: Some(RdrType::InspectionViolationIncorrect),
            reason: Some("ELD records show the driver was off duty".to_string()),
            response_deadline: Some(now + Duration::days(30)),
            state_review_submitted: false,
            actor: actor.clone(),
        },
        now,
    )?;
    println!("- submitted, response due in 30 days");

    for status in [ChallengeStatus::UnderReview, ChallengeStatus::Denied] {
        service.record_response(
            &target,
            ResponseUpdate {
                status,
                notes: (status == ChallengeStatus::Denied)
                    .then(|| "Inspector stands by the original log review".to_string()),
                actor: actor.clone(),
            },
            now,
        )?;
        println!("- state response: {}", status);
    }

    println!("\nDenial options");
    for option in service.denial_options(&target)? {
        let availability = if option.available {
            "available".to_string()
        } else {
            option
                .reason
                .unwrap_or_else(|| "unavailable".to_string())
        };
        println!("- {}: {} ({})", option.id, option.label, availability);
    }

    service.select_denial_option(&target, DenialOptionId::B, &actor, now)?;
    let reopened = service.initiate_round(&target, RoundType::Reconsideration, &actor, now)?;
    if let Some(challenge) = &reopened.data_q_challenge {
        if let Some(round) = challenge.rounds.last() {
            println!(
                "\nOpened round {} ({}), challenge back to {}",
                round.round_number,
                round.round_type.label(),
                challenge.status
            );
        }
    }

    let dashboard = service.dashboard(&carrier, now)?;
    println!("\nDashboard");
    println!("- Filed: {}", dashboard.total_filed);
    println!("- Active: {}", dashboard.active);
    println!("- Awaiting response: {}", dashboard.pending_response);
    println!("- Won/Lost: {}/{}", dashboard.won, dashboard.lost);
    println!("- Success rate: {}%", dashboard.success_rate);

    Ok(())
}
