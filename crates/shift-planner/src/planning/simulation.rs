//! Hypothetical approve/reject decisions replayed over a capacity baseline.
//!
//! Nothing here touches stored state: inputs are borrowed immutably and every call returns a
//! fresh [`ImpactReport`]. Ordered maps keep the output identical across repeated calls.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{DayCapacity, RequestId, RiskLevel, TeamId, VacationRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskTally {
    pub safe: usize,
    pub warning: usize,
    pub critical: usize,
}

impl RiskTally {
    pub fn of(days: &[DayCapacity]) -> Self {
        let mut tally = Self::default();
        for day in days {
            match day.risk_level {
                RiskLevel::Safe => tally.safe += 1,
                RiskLevel::Warning => tally.warning += 1,
                RiskLevel::Critical => tally.critical += 1,
            }
        }
        tally
    }
}

/// A team-day whose availability or risk moved under the simulated decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayDelta {
    pub team_id: TeamId,
    pub date: NaiveDate,
    pub available_before: u32,
    pub available_after: u32,
    pub coverage_before: u32,
    pub coverage_after: u32,
    pub risk_before: RiskLevel,
    pub risk_after: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactReport {
    pub days: Vec<DayCapacity>,
    pub baseline_average_coverage: f64,
    pub simulated_average_coverage: f64,
    pub coverage_delta: f64,
    pub baseline_risk: RiskTally,
    pub simulated_risk: RiskTally,
    pub changed_days: Vec<DayDelta>,
    pub approvals: usize,
    pub rejections: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmatched_decisions: Vec<RequestId>,
}

/// Applies `decisions` to the baseline.
///
/// Each approval takes one more person off its request's team-day. Rejections leave capacity
/// untouched since pending requests are not part of the baseline. Decisions that name an
/// unknown or already decided request, and approvals whose team-day is not in the baseline,
/// are reported in `unmatched_decisions` and left out of the totals.
pub fn simulate(
    capacity_by_day: &[DayCapacity],
    pending_requests: &[VacationRequest],
    decisions: &BTreeMap<RequestId, Decision>,
) -> ImpactReport {
    let requests: BTreeMap<&RequestId, &VacationRequest> = pending_requests
        .iter()
        .filter(|request| request.is_pending())
        .map(|request| (&request.id, request))
        .collect();

    let baseline_days: BTreeSet<(TeamId, NaiveDate)> =
        capacity_by_day.iter().map(DayCapacity::key).collect();

    let mut extra_leave: BTreeMap<(TeamId, NaiveDate), u32> = BTreeMap::new();
    let mut unmatched_decisions = Vec::new();
    let (mut approvals, mut rejections) = (0, 0);

    for (request_id, decision) in decisions {
        let Some(request) = requests.get(request_id) else {
            unmatched_decisions.push(request_id.clone());
            continue;
        };
        match decision {
            Decision::Approve => {
                let key = (request.team_id.clone(), request.requested_date);
                if !baseline_days.contains(&key) {
                    unmatched_decisions.push(request_id.clone());
                    continue;
                }
                approvals += 1;
                *extra_leave.entry(key).or_default() += 1;
            }
            Decision::Reject => rejections += 1,
        }
    }

    let mut days = Vec::with_capacity(capacity_by_day.len());
    let mut changed_days = Vec::new();

    for baseline in capacity_by_day {
        let simulated = match extra_leave.get(&baseline.key()) {
            Some(count) => baseline.with_additional_leave(*count),
            None => baseline.clone(),
        };

        if simulated.available != baseline.available || simulated.risk_level != baseline.risk_level
        {
            changed_days.push(DayDelta {
                team_id: baseline.team_id.clone(),
                date: baseline.date,
                available_before: baseline.available,
                available_after: simulated.available,
                coverage_before: baseline.coverage_percentage,
                coverage_after: simulated.coverage_percentage,
                risk_before: baseline.risk_level,
                risk_after: simulated.risk_level,
            });
        }
        days.push(simulated);
    }

    let baseline_average_coverage = average_coverage(capacity_by_day);
    let simulated_average_coverage = average_coverage(&days);

    ImpactReport {
        baseline_risk: RiskTally::of(capacity_by_day),
        simulated_risk: RiskTally::of(&days),
        coverage_delta: round_tenth(simulated_average_coverage - baseline_average_coverage),
        baseline_average_coverage,
        simulated_average_coverage,
        days,
        changed_days,
        approvals,
        rejections,
        unmatched_decisions,
    }
}

/// Mean coverage percentage rounded to one decimal; zero for an empty baseline.
pub fn average_coverage(days: &[DayCapacity]) -> f64 {
    if days.is_empty() {
        return 0.0;
    }
    let total: u64 = days.iter().map(|day| day.coverage_percentage as u64).sum();
    round_tenth(total as f64 / days.len() as f64)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
