use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{DayCapacity, RequestId, RiskLevel, TeamId, VacationRequest};

/// More pending requests than this on one team-day is flagged regardless of capacity.
pub const PENDING_PILE_UP_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Critical,
    Warning,
    Info,
}

impl ConflictSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            ConflictSeverity::Critical => "critical",
            ConflictSeverity::Warning => "warning",
            ConflictSeverity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Pending requests on a day that is already under-staffed.
    CapacityShortfall,
    /// Many simultaneous pending requests for one team-day.
    PendingPileUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub severity: ConflictSeverity,
    pub kind: ConflictKind,
    pub team_id: TeamId,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<DayCapacity>,
    pub request_ids: Vec<RequestId>,
    pub message: String,
}

/// Flags capacity shortfalls and pile-ups among pending requests.
///
/// Output is ordered critical, warning, info, then by date and team.
pub fn detect(capacity_by_day: &[DayCapacity], pending_requests: &[VacationRequest]) -> Vec<Conflict> {
    let mut pending: BTreeMap<(TeamId, NaiveDate), Vec<&VacationRequest>> = BTreeMap::new();
    for request in pending_requests.iter().filter(|request| request.is_pending()) {
        pending
            .entry((request.team_id.clone(), request.requested_date))
            .or_default()
            .push(request);
    }

    let capacity: BTreeMap<(TeamId, NaiveDate), &DayCapacity> = capacity_by_day
        .iter()
        .map(|day| (day.key(), day))
        .collect();

    let mut conflicts = Vec::new();

    for (key, day) in &capacity {
        let severity = match day.risk_level {
            RiskLevel::Critical => ConflictSeverity::Critical,
            RiskLevel::Warning => ConflictSeverity::Warning,
            RiskLevel::Safe => continue,
        };
        let Some(requests) = pending.get(key) else {
            continue;
        };

        conflicts.push(Conflict {
            severity,
            kind: ConflictKind::CapacityShortfall,
            team_id: day.team_id.clone(),
            date: day.date,
            capacity: Some((*day).clone()),
            request_ids: request_ids(requests),
            message: format!(
                "{} pending request(s) on a {} day ({} of {} required staff available)",
                requests.len(),
                day.risk_level.label(),
                day.available,
                day.required_capacity
            ),
        });
    }

    for ((team_id, date), requests) in &pending {
        if requests.len() <= PENDING_PILE_UP_THRESHOLD {
            continue;
        }
        conflicts.push(Conflict {
            severity: ConflictSeverity::Info,
            kind: ConflictKind::PendingPileUp,
            team_id: team_id.clone(),
            date: *date,
            capacity: capacity
                .get(&(team_id.clone(), *date))
                .map(|day| (*day).clone()),
            request_ids: request_ids(requests),
            message: format!(
                "{} simultaneous pending requests for the same day",
                requests.len()
            ),
        });
    }

    conflicts.sort_by(|left, right| {
        left.severity
            .cmp(&right.severity)
            .then(left.date.cmp(&right.date))
            .then_with(|| left.team_id.cmp(&right.team_id))
    });
    conflicts
}

fn request_ids(requests: &[&VacationRequest]) -> Vec<RequestId> {
    let mut ids: Vec<RequestId> = requests.iter().map(|request| request.id.clone()).collect();
    ids.sort();
    ids
}
