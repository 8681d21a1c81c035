use crate::infra::{parse_date, InMemoryPlanningStore, LoggingNotifier};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use clap::Args;
use shift_planner::config::AppConfig;
use shift_planner::error::AppError;
use shift_planner::planning::export::{write_capacity_csv, write_requests_csv};
use shift_planner::planning::requests::{
    check_range, VacationRequestService, VacationServiceError, VacationSubmission,
};
use shift_planner::planning::{
    build_overview, AccessScopeGate, ActivityType, Actor, Decision, ImpactReport, LeaveCounting,
    PlanningOverview, PlanningSnapshot, RequestId, RequestStatus, Role, ShiftRecord, Team,
    TeamFilter, TeamId, TeamMembership, UserId, VacationRequest,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// Planning snapshot (JSON) with teams, memberships, requests and shifts
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// First day of the report (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) from: NaiveDate,
    /// Last day of the report, inclusive (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) to: NaiveDate,
    /// Restrict the report to a single team
    #[arg(long)]
    pub(crate) team: Option<String>,
    /// User the report is generated for
    #[arg(long, default_value = "planning-report")]
    pub(crate) actor: String,
    /// Comma-separated roles of the reporting user
    #[arg(long, value_delimiter = ',', default_value = "planner")]
    pub(crate) roles: Vec<String>,
    /// Count pending requests as leave in the baseline
    #[arg(long)]
    pub(crate) count_pending: bool,
    /// Write the per-team capacity grid to this CSV file
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Write the requests in range to this CSV file
    #[arg(long)]
    pub(crate) requests_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Monday of the demo week (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, default_value = "2025-06-09")]
    pub(crate) week_of: NaiveDate,
    /// Print the manager overview as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        snapshot,
        from,
        to,
        team,
        actor,
        roles,
        count_pending,
        csv,
        requests_csv,
    } = args;

    check_range(from, to).map_err(VacationServiceError::from)?;

    let mut settings = AppConfig::load()?.planning.settings();
    if count_pending {
        settings.counting = LeaveCounting::IncludePending;
    }

    let snapshot = PlanningSnapshot::from_path(snapshot)?;
    let hierarchy = snapshot.hierarchy().map_err(VacationServiceError::from)?;
    let actor = Actor::new(actor, roles.iter().filter_map(|raw| Role::parse(raw)));
    let filter = match team {
        Some(team) => TeamFilter::Team(TeamId(team)),
        None => TeamFilter::All,
    };
    let scope = AccessScopeGate::new(&hierarchy, &snapshot.memberships)
        .evaluate(&actor, &filter)
        .map_err(VacationServiceError::from)?;

    let overview = build_overview(&snapshot, &hierarchy, &scope, from, to, &settings);
    render_overview(&overview);

    if let Some(path) = csv {
        write_capacity_csv(File::create(&path)?, &overview.capacity)?;
        println!("\nCapacity grid written to {}", path.display());
    }
    if let Some(path) = requests_csv {
        let in_range: Vec<VacationRequest> = snapshot
            .requests
            .iter()
            .filter(|request| {
                request.requested_date >= from
                    && request.requested_date <= to
                    && scope.can_adjudicate(&request.team_id)
            })
            .cloned()
            .collect();
        write_requests_csv(File::create(&path)?, &in_range)?;
        println!("Requests written to {}", path.display());
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { week_of, json } = args;
    let friday = week_of + Duration::days(4);
    let thursday = week_of + Duration::days(3);

    let store = Arc::new(InMemoryPlanningStore::from_snapshot(demo_snapshot(week_of)));
    let notifier = Arc::new(LoggingNotifier::default());
    let settings = AppConfig::load()?.planning.settings();
    let service = VacationRequestService::new(store.clone(), notifier.clone(), settings);

    let nora = Actor::new("nora", [Role::Manager]);
    let lena = Actor::new("lena", [Role::TeamMember]);
    let omar = Actor::new("omar", [Role::TeamMember]);
    let quinn = Actor::new("quinn", [Role::TeamMember]);
    let payments = TeamFilter::Team(TeamId("payments".to_string()));

    println!("Vacation planning demo ({} -> {})", week_of, friday);

    println!("\nSubmissions");
    let lena_group = service.submit(&lena, day_off(thursday, Some(friday), "Long weekend"))?;
    println!(
        "- lena filed {} day(s) as group {}",
        lena_group.len(),
        lena_group
            .group_id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string())
    );

    match service.submit(&omar, day_off(thursday, None, "Dentist")) {
        Ok(_) => println!("- omar filed a second request for {thursday}"),
        Err(err) => println!("- omar refused: {err}"),
    }

    let morning = VacationSubmission {
        is_full_day: false,
        start_time: NaiveTime::from_hms_opt(8, 0, 0),
        end_time: NaiveTime::from_hms_opt(12, 0, 0),
        ..day_off(thursday, None, "School play")
    };
    let quinn_group = service.submit(&quinn, morning)?;
    println!("- quinn filed a morning off on {thursday}");

    let pending: BTreeMap<RequestId, Decision> = lena_group
        .request_ids()
        .into_iter()
        .chain(quinn_group.request_ids())
        .map(|id| (id, Decision::Approve))
        .collect();
    let impact = service.what_if(&nora, &payments, week_of, friday, &pending)?;
    println!("\nWhat-if: approve every pending request");
    render_impact(&impact);

    println!("\nDecisions");
    if let Some(first) = lena_group.requests.first() {
        let approved = service.approve(&nora, &first.id)?;
        println!(
            "- nora approved {} for {} on {}",
            approved.id, approved.user_id, approved.requested_date
        );
    }
    if let Some(request) = quinn_group.requests.first() {
        let rejected = service.reject(&nora, &request.id, "Release day needs full coverage")?;
        println!(
            "- nora rejected {}: {}",
            rejected.id,
            rejected.rejection_reason.as_deref().unwrap_or_default()
        );
    }
    match lena_group.requests.first() {
        Some(first) => match service.withdraw(&lena, &first.id) {
            Ok(ids) => println!("- lena withdrew {} request(s)", ids.len()),
            Err(err) => println!("- lena cannot withdraw: {err}"),
        },
        None => println!("- lena has nothing to withdraw"),
    }

    store.add_membership(TeamMembership {
        team_id: TeamId("payments".to_string()),
        user_id: UserId("ravi".to_string()),
        is_manager: false,
    })
    .map_err(VacationServiceError::from)?;
    println!("- ravi joined payments");

    let overview = service.overview(&nora, &payments, week_of, friday)?;
    if json {
        match serde_json::to_string_pretty(&overview) {
            Ok(body) => println!("\n{body}"),
            Err(err) => println!("\nOverview payload unavailable: {err}"),
        }
    } else {
        println!();
        render_overview(&overview);
    }

    let events = notifier.events();
    if events.is_empty() {
        println!("\nNotifications: none dispatched");
    } else {
        println!("\nNotifications");
        for event in events {
            println!(
                "- {} -> {} ({})",
                event.kind.label(),
                event.requester_id,
                event.request_id
            );
        }
    }

    Ok(())
}

fn day_off(start: NaiveDate, end: Option<NaiveDate>, notes: &str) -> VacationSubmission {
    VacationSubmission {
        team_id: TeamId("payments".to_string()),
        start_date: start,
        end_date: end,
        is_full_day: true,
        start_time: None,
        end_time: None,
        notes: Some(notes.to_string()),
        selected_approver_id: Some(UserId("nora".to_string())),
    }
}

/// Small organisation used by the demo and the service tests.
///
/// Engineering owns payments and platform; support stands alone. Omar already has approved
/// leave on Thursday and platform has one hotline shift and one sick day.
pub(crate) fn demo_snapshot(week_of: NaiveDate) -> PlanningSnapshot {
    let team = |id: &str, name: &str, parent: Option<&str>| Team {
        id: TeamId(id.to_string()),
        name: name.to_string(),
        parent_team_id: parent.map(|parent| TeamId(parent.to_string())),
    };
    let member = |team_id: &str, user_id: &str, is_manager: bool| TeamMembership {
        team_id: TeamId(team_id.to_string()),
        user_id: UserId(user_id.to_string()),
        is_manager,
    };
    let shift = |user_id: &str, offset: i64, activity_type: ActivityType, notes: &str| ShiftRecord {
        user_id: UserId(user_id.to_string()),
        team_id: TeamId("platform".to_string()),
        date: week_of + Duration::days(offset),
        activity_type,
        availability_status: activity_type.availability(),
        notes: Some(notes.to_string()),
    };

    PlanningSnapshot {
        teams: vec![
            team("engineering", "Engineering", None),
            team("payments", "Payments", Some("engineering")),
            team("platform", "Platform", Some("engineering")),
            team("support", "Customer Support", None),
        ],
        memberships: vec![
            member("payments", "nora", true),
            member("payments", "lena", false),
            member("payments", "omar", false),
            member("payments", "pia", false),
            member("payments", "quinn", false),
            member("platform", "raj", false),
            member("platform", "sven", false),
            member("platform", "tara", false),
            member("support", "uma", false),
            member("support", "vik", false),
        ],
        requests: vec![VacationRequest {
            id: RequestId("vr-seed-1".to_string()),
            user_id: UserId("omar".to_string()),
            team_id: TeamId("payments".to_string()),
            requested_date: week_of + Duration::days(3),
            is_full_day: true,
            start_time: None,
            end_time: None,
            status: RequestStatus::Approved,
            notes: Some("Moving house".to_string()),
            rejection_reason: None,
            approver_id: Some(UserId("nora".to_string())),
            request_group_id: None,
            selected_approver_id: Some(UserId("nora".to_string())),
            created_at: Utc::now(),
            decided_at: Some(Utc::now()),
        }],
        shifts: vec![
            shift("raj", 0, ActivityType::HotlineSupport, "Hotline rota"),
            shift("tara", 1, ActivityType::SickLeave, "Flu"),
        ],
    }
}

pub(crate) fn render_overview(overview: &PlanningOverview) {
    let scope = &overview.scope;
    println!(
        "Planning overview {} -> {} | audience {:?} | {} team(s) visible",
        overview.from,
        overview.to,
        scope.audience,
        scope.visible_team_ids.len()
    );

    println!("\nCapacity by team");
    for day in &overview.capacity {
        println!(
            "- {} {}: {}/{} available (needs {}) | {}% | {}",
            day.date,
            day.team_id,
            day.available,
            day.total_members,
            day.required_capacity,
            day.coverage_percentage,
            day.risk_level.label()
        );
    }

    if !overview.combined.is_empty() {
        println!("\nCombined capacity");
        for day in &overview.combined {
            println!(
                "- {}: {} available (needs {}) across {} team(s) | {}% | {}",
                day.date,
                day.available,
                day.required_capacity,
                day.team_ids.len(),
                day.coverage_percentage,
                day.risk_level.label()
            );
        }
    }

    if overview.conflicts.is_empty() {
        println!("\nConflicts: none");
    } else {
        println!("\nConflicts");
        for conflict in &overview.conflicts {
            println!("- [{}] {}", conflict.severity.label(), conflict.message);
        }
    }

    if overview.pending_requests.is_empty() {
        println!("\nPending requests: none");
    } else {
        println!("\nPending requests");
        for request in &overview.pending_requests {
            println!(
                "- {} {} on {} ({})",
                request.id,
                request.user_id,
                request.requested_date,
                request.window().describe()
            );
        }
    }

    let fairness = &overview.fairness;
    if fairness.employees.is_empty() {
        println!("\nFairness: not available for this audience");
        return;
    }
    println!(
        "\nFairness score {:.0} | mean {:.1} day(s) over {} working day(s)",
        fairness.fairness_score, fairness.mean_total_days, fairness.period_days
    );
    for stat in fairness.employees.iter().filter(|stat| stat.is_outlier) {
        println!(
            "- outlier {}: {:.1} day(s) ({:+.1} vs mean)",
            stat.user_id, stat.total_days, stat.deviation_from_mean
        );
    }
}

fn render_impact(impact: &ImpactReport) {
    println!(
        "- {} approval(s), {} rejection(s)",
        impact.approvals, impact.rejections
    );
    println!(
        "- average coverage {:.1}% -> {:.1}% ({:+.1})",
        impact.baseline_average_coverage, impact.simulated_average_coverage, impact.coverage_delta
    );
    println!(
        "- critical days {} -> {}",
        impact.baseline_risk.critical, impact.simulated_risk.critical
    );
    for delta in &impact.changed_days {
        println!(
            "  - {} {}: {} -> {} available ({} -> {})",
            delta.date,
            delta.team_id,
            delta.available_before,
            delta.available_after,
            delta.risk_before.label(),
            delta.risk_after.label()
        );
    }
}
