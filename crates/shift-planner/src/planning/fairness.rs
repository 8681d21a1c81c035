use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{RequestStatus, UserId, VacationRequest};

/// Relative distance from the mean beyond which an employee is flagged.
pub const OUTLIER_TOLERANCE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeStat {
    pub user_id: UserId,
    pub approved_days: f64,
    pub pending_days: f64,
    pub total_days: f64,
    /// Share of the analysed period taken as leave, in percent.
    pub share_of_period: f64,
    pub deviation_from_mean: f64,
    pub is_outlier: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairnessReport {
    /// Working days in the analysed range.
    pub period_days: u32,
    pub employees: Vec<EmployeeStat>,
    pub mean_total_days: f64,
    pub fairness_score: f64,
}

impl FairnessReport {
    pub fn outliers(&self) -> impl Iterator<Item = &EmployeeStat> {
        self.employees.iter().filter(|stat| stat.is_outlier)
    }
}

/// Scores how evenly time-off is spread.
///
/// `roster` lists employees that count even without any request; employees found only in
/// `requests` are added. Rejected requests are ignored.
pub fn analyze(roster: &[UserId], requests: &[VacationRequest], period_days: u32) -> FairnessReport {
    let mut totals: BTreeMap<&UserId, (f64, f64)> =
        roster.iter().map(|user| (user, (0.0, 0.0))).collect();

    for request in requests {
        let entry = totals.entry(&request.user_id).or_default();
        match request.status {
            RequestStatus::Approved => entry.0 += request.day_weight(),
            RequestStatus::Pending => entry.1 += request.day_weight(),
            RequestStatus::Rejected => {}
        }
    }

    let count = totals.len();
    let sum: f64 = totals.values().map(|(approved, pending)| approved + pending).sum();
    let mean = if count == 0 { 0.0 } else { sum / count as f64 };

    let mut employees: Vec<EmployeeStat> = totals
        .into_iter()
        .map(|(user_id, (approved_days, pending_days))| {
            let total_days = approved_days + pending_days;
            let deviation = total_days - mean;
            EmployeeStat {
                user_id: user_id.clone(),
                approved_days,
                pending_days,
                total_days,
                share_of_period: if period_days == 0 {
                    0.0
                } else {
                    round_tenth(total_days / period_days as f64 * 100.0)
                },
                deviation_from_mean: round_tenth(deviation),
                is_outlier: deviation.abs() > OUTLIER_TOLERANCE * mean,
            }
        })
        .collect();

    employees.sort_by(|left, right| {
        right
            .total_days
            .total_cmp(&left.total_days)
            .then_with(|| left.user_id.cmp(&right.user_id))
    });

    FairnessReport {
        period_days,
        fairness_score: fairness_score(employees.iter().map(|stat| stat.total_days)),
        mean_total_days: round_tenth(mean),
        employees,
    }
}

/// `(1 - (max - min) / max) × 100`, or 100 when nobody took time off.
pub fn fairness_score(totals: impl IntoIterator<Item = f64>) -> f64 {
    let (mut min, mut max) = (f64::INFINITY, 0.0_f64);
    for total in totals {
        min = min.min(total);
        max = max.max(total);
    }
    if max <= 0.0 {
        return 100.0;
    }
    round_tenth((1.0 - (max - min) / max) * 100.0)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::domain::{RequestId, TeamId};
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn request(user: &str, day: u32, status: RequestStatus, full_day: bool) -> VacationRequest {
        VacationRequest {
            id: RequestId(format!("vr-{user}-{day}")),
            user_id: UserId(user.to_string()),
            team_id: TeamId("a".to_string()),
            requested_date: NaiveDate::from_ymd_opt(2025, 6, day).expect("valid date"),
            is_full_day: full_day,
            start_time: (!full_day).then(|| NaiveTime::from_hms_opt(8, 0, 0).expect("time")),
            end_time: (!full_day).then(|| NaiveTime::from_hms_opt(12, 0, 0).expect("time")),
            status,
            notes: None,
            rejection_reason: None,
            approver_id: None,
            request_group_id: None,
            selected_approver_id: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    fn days_for(user: &str, count: u32) -> Vec<VacationRequest> {
        (1..=count)
            .map(|day| request(user, day, RequestStatus::Approved, true))
            .collect()
    }

    fn users(names: &[&str]) -> Vec<UserId> {
        names.iter().map(|name| UserId(name.to_string())).collect()
    }

    #[test]
    fn equal_totals_are_perfectly_fair() {
        let mut requests = days_for("ana", 5);
        requests.extend(days_for("ben", 5));
        requests.extend(days_for("cai", 5));

        let report = analyze(&users(&["ana", "ben", "cai"]), &requests, 30);
        assert_eq!(report.fairness_score, 100.0);
        assert_eq!(report.outliers().count(), 0);
        assert_eq!(report.employees[0].share_of_period, 16.7);
    }

    #[test]
    fn an_empty_total_drives_the_score_to_zero() {
        let mut requests = days_for("ana", 5);
        requests.extend(days_for("ben", 5));

        let report = analyze(&users(&["ana", "ben", "cai"]), &requests, 30);
        assert_eq!(report.fairness_score, 0.0);
        let cai = report
            .employees
            .iter()
            .find(|stat| stat.user_id.0 == "cai")
            .expect("roster member listed");
        assert_eq!(cai.total_days, 0.0);
        assert!(cai.is_outlier);
    }

    #[test]
    fn nobody_off_scores_one_hundred() {
        let report = analyze(&users(&["ana", "ben"]), &[], 30);
        assert_eq!(report.fairness_score, 100.0);
        assert_eq!(report.mean_total_days, 0.0);
    }

    #[test]
    fn partial_days_weigh_half_and_rejections_are_ignored() {
        let requests = vec![
            request("ana", 2, RequestStatus::Approved, true),
            request("ana", 3, RequestStatus::Pending, false),
            request("ana", 4, RequestStatus::Rejected, true),
        ];
        let report = analyze(&[], &requests, 10);
        let ana = &report.employees[0];
        assert_eq!(ana.approved_days, 1.0);
        assert_eq!(ana.pending_days, 0.5);
        assert_eq!(ana.total_days, 1.5);
    }
}
