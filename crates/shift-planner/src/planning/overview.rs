//! Scoped planning dashboard assembled from a [`PlanningSnapshot`].
//!
//! The pipeline runs in a fixed order: the access scope picks teams, capacity is computed for
//! every working day in range, conflicts and fairness read only requests the actor may see in
//! full, and the shift roster is redacted per record.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use super::access::{AccessScope, Audience, DetailLevel, ShiftView, TeamFilter};
use super::calendar::{days_between, is_weekend};
use super::capacity::{
    combine_by_date, CapacityCalculator, CombinedCapacity, LeaveCounting, StaffingPolicy,
};
use super::conflicts::{detect, Conflict};
use super::domain::{DayCapacity, RequestId, TeamId, UserId, VacationRequest};
use super::fairness::{analyze, FairnessReport};
use super::hierarchy::TeamHierarchy;
use super::simulation::{simulate, Decision, ImpactReport};
use super::snapshot::PlanningSnapshot;

/// Tunables shared by every capacity computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanningSettings {
    pub staffing: StaffingPolicy,
    pub counting: LeaveCounting,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanningOverview {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub scope: AccessScope,
    pub capacity: Vec<DayCapacity>,
    pub combined: Vec<CombinedCapacity>,
    pub conflicts: Vec<Conflict>,
    pub fairness: FairnessReport,
    /// Pending requests visible in full detail; the input for what-if runs.
    pub pending_requests: Vec<VacationRequest>,
    pub roster: Vec<ShiftView>,
    /// Approved-only capacity; pending requests are what a simulation decides on.
    #[serde(skip)]
    committed: Vec<DayCapacity>,
}

impl PlanningOverview {
    /// Replays hypothetical decisions over committed capacity.
    pub fn simulate(&self, decisions: &BTreeMap<RequestId, Decision>) -> ImpactReport {
        simulate(&self.committed, &self.pending_requests, decisions)
    }
}

/// Working days in `[from, to]`, weekends excluded.
pub fn working_days(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    days_between(from, to)
        .into_iter()
        .filter(|date| !is_weekend(*date))
        .collect()
}

pub fn build_overview(
    snapshot: &PlanningSnapshot,
    hierarchy: &TeamHierarchy,
    scope: &AccessScope,
    from: NaiveDate,
    to: NaiveDate,
    settings: &PlanningSettings,
) -> PlanningOverview {
    let dates = working_days(from, to);
    let in_range = |date: NaiveDate| date >= from && date <= to;

    let scoped_requests: Vec<VacationRequest> = snapshot
        .requests
        .iter()
        .filter(|request| {
            in_range(request.requested_date)
                && scope.can_see_team(&request.team_id)
                && scope.detail_for(&request.user_id) == DetailLevel::Full
        })
        .cloned()
        .collect();

    let capacity_with = |counting: LeaveCounting| {
        CapacityCalculator::new(counting).compute_teams(
            &scope.visible_team_ids,
            &snapshot.memberships,
            &dates,
            &snapshot.requests,
            &snapshot.shifts,
            &settings.staffing,
        )
    };
    let capacity = capacity_with(settings.counting);
    let committed = match settings.counting {
        LeaveCounting::ApprovedOnly => capacity.clone(),
        LeaveCounting::IncludePending => capacity_with(LeaveCounting::ApprovedOnly),
    };

    let pending_requests: Vec<VacationRequest> = scoped_requests
        .iter()
        .filter(|request| request.is_pending())
        .cloned()
        .collect();

    let conflicts = detect(&capacity, &pending_requests);

    let fairness_roster: Vec<UserId> = if scope.audience == Audience::Member {
        Vec::new()
    } else {
        members_of(&scope.visible_team_ids, snapshot)
            .into_iter()
            .filter(|user| scope.detail_for(user) == DetailLevel::Full)
            .collect()
    };
    let fairness = analyze(&fairness_roster, &scoped_requests, dates.len() as u32);

    let calendar_users = members_of(&calendar_teams(scope, hierarchy), snapshot);
    let roster = scope.view_shifts(
        snapshot
            .shifts
            .iter()
            .filter(|shift| in_range(shift.date) && calendar_users.contains(&shift.user_id)),
    );

    PlanningOverview {
        from,
        to,
        scope: scope.clone(),
        combined: combine_by_date(&capacity),
        capacity,
        conflicts,
        fairness,
        pending_requests,
        roster,
        committed,
    }
}

/// Teams whose shifts appear on the calendar.
///
/// Managers browsing all teams see the whole organisation, redacted outside their subtree;
/// everyone else sees exactly the teams in scope.
fn calendar_teams(scope: &AccessScope, hierarchy: &TeamHierarchy) -> BTreeSet<TeamId> {
    match (scope.audience, &scope.filter) {
        (Audience::Manager, TeamFilter::All) => hierarchy.team_ids(),
        _ => scope.visible_team_ids.clone(),
    }
}

fn members_of(teams: &BTreeSet<TeamId>, snapshot: &PlanningSnapshot) -> BTreeSet<UserId> {
    snapshot
        .memberships
        .iter()
        .filter(|membership| teams.contains(&membership.team_id))
        .map(|membership| membership.user_id.clone())
        .collect()
}
