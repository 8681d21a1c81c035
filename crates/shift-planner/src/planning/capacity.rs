//! Per-day staffing adequacy derived from membership and time-off state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    coverage_percentage, AvailabilityStatus, DayCapacity, RequestStatus, RiskLevel, ShiftRecord,
    TeamId, TeamMembership, UserId, VacationRequest,
};

/// Which requests take a member off the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveCounting {
    /// Only committed (approved) time-off.
    #[default]
    ApprovedOnly,
    /// Approved plus still-pending requests, for pessimistic dashboards.
    IncludePending,
}

impl LeaveCounting {
    fn counts(self, status: RequestStatus) -> bool {
        match (self, status) {
            (_, RequestStatus::Approved) => true,
            (LeaveCounting::IncludePending, RequestStatus::Pending) => true,
            _ => false,
        }
    }
}

/// Derives the staff a team needs on any working day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingPolicy {
    pub minimum_staff: u32,
    pub minimum_ratio: f32,
    #[serde(default)]
    pub overrides: BTreeMap<TeamId, u32>,
}

impl Default for StaffingPolicy {
    fn default() -> Self {
        Self {
            minimum_staff: 1,
            minimum_ratio: 0.5,
            overrides: BTreeMap::new(),
        }
    }
}

impl StaffingPolicy {
    pub fn with_override(mut self, team_id: TeamId, required: u32) -> Self {
        self.overrides.insert(team_id, required);
        self
    }

    /// Explicit override, else `max(minimum_staff, ceil(total × ratio))` capped at the team size.
    pub fn required_for(&self, team_id: &TeamId, total_members: u32) -> u32 {
        if let Some(required) = self.overrides.get(team_id) {
            return *required;
        }
        let ratio = if self.minimum_ratio.is_finite() {
            self.minimum_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let by_ratio = (total_members as f64 * ratio as f64).ceil() as u32;
        by_ratio.max(self.minimum_staff).min(total_members)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityCalculator {
    counting: LeaveCounting,
}

impl CapacityCalculator {
    pub fn new(counting: LeaveCounting) -> Self {
        Self { counting }
    }

    pub fn counting(&self) -> LeaveCounting {
        self.counting
    }

    /// Staffing for one team on one day.
    ///
    /// A member is on leave when a counted request for `date` exists or a shift record marks
    /// them unavailable that day; each member is counted once.
    pub fn compute(
        &self,
        team_id: &TeamId,
        date: NaiveDate,
        members: &BTreeSet<UserId>,
        requests: &[VacationRequest],
        shifts: &[ShiftRecord],
        required_capacity: u32,
    ) -> DayCapacity {
        let from_requests = requests.iter().filter(|request| {
            request.requested_date == date && self.counting.counts(request.status)
        });
        let from_shifts = shifts.iter().filter(|shift| {
            shift.date == date && shift.availability_status == AvailabilityStatus::Unavailable
        });

        let absent: BTreeSet<&UserId> = from_requests
            .map(|request| &request.user_id)
            .chain(from_shifts.map(|shift| &shift.user_id))
            .filter(|user| members.contains(*user))
            .collect();

        DayCapacity::new(
            team_id.clone(),
            date,
            members.len() as u32,
            absent.len() as u32,
            required_capacity,
        )
    }

    /// Capacity for every team in `team_ids` on every date, ordered by date then team.
    pub fn compute_teams(
        &self,
        team_ids: &BTreeSet<TeamId>,
        memberships: &[TeamMembership],
        dates: &[NaiveDate],
        requests: &[VacationRequest],
        shifts: &[ShiftRecord],
        policy: &StaffingPolicy,
    ) -> Vec<DayCapacity> {
        let rosters = rosters(team_ids, memberships);
        let mut days = Vec::with_capacity(dates.len() * rosters.len());

        for date in dates {
            for (team_id, members) in &rosters {
                let required = policy.required_for(team_id, members.len() as u32);
                days.push(self.compute(team_id, *date, members, requests, shifts, required));
            }
        }

        days
    }
}

/// Members per team, restricted to `team_ids`; teams without members get an empty roster.
pub fn rosters(
    team_ids: &BTreeSet<TeamId>,
    memberships: &[TeamMembership],
) -> BTreeMap<TeamId, BTreeSet<UserId>> {
    let mut rosters: BTreeMap<TeamId, BTreeSet<UserId>> = team_ids
        .iter()
        .map(|team_id| (team_id.clone(), BTreeSet::new()))
        .collect();

    for membership in memberships {
        if let Some(members) = rosters.get_mut(&membership.team_id) {
            members.insert(membership.user_id.clone());
        }
    }

    rosters
}

/// Several teams folded into one figure for a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedCapacity {
    pub date: NaiveDate,
    pub team_ids: Vec<TeamId>,
    pub total_members: u32,
    pub available: u32,
    pub required_capacity: u32,
    pub coverage_percentage: u32,
    pub risk_level: RiskLevel,
}

/// Sums members, availability and requirement before reclassifying; risk levels are never
/// averaged.
pub fn combine(date: NaiveDate, days: &[DayCapacity]) -> CombinedCapacity {
    let relevant = days.iter().filter(|day| day.date == date);
    let mut team_ids = Vec::new();
    let (mut total_members, mut available, mut required) = (0u32, 0u32, 0u32);

    for day in relevant {
        team_ids.push(day.team_id.clone());
        total_members += day.total_members;
        available += day.available;
        required += day.required_capacity;
    }

    team_ids.sort();
    team_ids.dedup();

    CombinedCapacity {
        date,
        team_ids,
        total_members,
        available,
        required_capacity: required,
        coverage_percentage: coverage_percentage(available, required),
        risk_level: RiskLevel::classify(available, required),
    }
}

/// One combined figure per distinct date, ascending.
pub fn combine_by_date(days: &[DayCapacity]) -> Vec<CombinedCapacity> {
    let dates: BTreeSet<NaiveDate> = days.iter().map(|day| day.date).collect();
    dates.into_iter().map(|date| combine(date, days)).collect()
}
