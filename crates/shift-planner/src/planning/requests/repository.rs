use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::domain::{NotificationEvent, VacationRequestGroup};
use crate::planning::domain::{
    GroupId, RequestId, RequestStatus, ShiftRecord, Team, TeamId, TeamMembership, UserId,
    VacationRequest,
};

/// Filter over stored requests; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery {
    pub team_ids: Option<BTreeSet<TeamId>>,
    pub user_id: Option<UserId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub statuses: Option<Vec<RequestStatus>>,
}

impl RequestQuery {
    pub fn for_user(user_id: &UserId) -> Self {
        Self {
            user_id: Some(user_id.clone()),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn in_teams(mut self, team_ids: BTreeSet<TeamId>) -> Self {
        self.team_ids = Some(team_ids);
        self
    }

    pub fn with_statuses(mut self, statuses: &[RequestStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn matches(&self, request: &VacationRequest) -> bool {
        self.team_ids
            .as_ref()
            .map_or(true, |teams| teams.contains(&request.team_id))
            && self
                .user_id
                .as_ref()
                .map_or(true, |user| *user == request.user_id)
            && self.from.map_or(true, |from| request.requested_date >= from)
            && self.to.map_or(true, |to| request.requested_date <= to)
            && self
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.contains(&request.status))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftQuery {
    pub user_id: Option<UserId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ShiftQuery {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            user_id: None,
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn matches(&self, record: &ShiftRecord) -> bool {
        self.user_id
            .as_ref()
            .map_or(true, |user| *user == record.user_id)
            && self.from.map_or(true, |from| record.date >= from)
            && self.to.map_or(true, |to| record.date <= to)
    }
}

/// Storage abstraction so the lifecycle service can be exercised in isolation.
///
/// `create_group`, `replace_group` and `delete_requests` are atomic: either every listed
/// request is written or removed, or nothing is.
pub trait PlanningStore: Send + Sync {
    fn teams(&self) -> Result<Vec<Team>, RepositoryError>;
    fn memberships(&self) -> Result<Vec<TeamMembership>, RepositoryError>;
    /// Bumped whenever memberships or teams change.
    fn membership_revision(&self) -> Result<u64, RepositoryError>;

    fn fetch_request(&self, id: &RequestId) -> Result<Option<VacationRequest>, RepositoryError>;
    fn query_requests(&self, query: &RequestQuery)
        -> Result<Vec<VacationRequest>, RepositoryError>;
    fn group_requests(&self, group_id: &GroupId) -> Result<Vec<VacationRequest>, RepositoryError>;
    fn create_group(&self, group: &VacationRequestGroup) -> Result<(), RepositoryError>;
    fn replace_group(
        &self,
        previous: &[RequestId],
        group: &VacationRequestGroup,
    ) -> Result<(), RepositoryError>;
    fn delete_requests(&self, ids: &[RequestId]) -> Result<(), RepositoryError>;
    /// Stores `request` only while the stored copy still has status `expected`.
    ///
    /// Returns [`RepositoryError::Conflict`] when the status has moved on and
    /// [`RepositoryError::NotFound`] when the request is gone.
    fn transition_request(
        &self,
        expected: RequestStatus,
        request: &VacationRequest,
    ) -> Result<(), RepositoryError>;

    fn query_shifts(&self, query: &ShiftQuery) -> Result<Vec<ShiftRecord>, RepositoryError>;
    /// Removes every shift of `user_id` on `date`, returning what was removed.
    fn delete_shifts(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<ShiftRecord>, RepositoryError>;
    fn insert_shift(&self, record: &ShiftRecord) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook (e-mail, chat, push adapters).
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request(user: &str, team: &str, day: u32, status: RequestStatus) -> VacationRequest {
        VacationRequest {
            id: RequestId(format!("vr-{user}-{day}")),
            user_id: UserId(user.to_string()),
            team_id: TeamId(team.to_string()),
            requested_date: NaiveDate::from_ymd_opt(2025, 6, day).expect("valid date"),
            is_full_day: true,
            start_time: None,
            end_time: None,
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

    #[test]
    fn request_query_combines_filters() {
        let from = NaiveDate::from_ymd_opt(2025, 6, 9).expect("valid date");
        let to = NaiveDate::from_ymd_opt(2025, 6, 13).expect("valid date");
        let query = RequestQuery::for_user(&UserId("ana".to_string()))
            .between(from, to)
            .in_teams(BTreeSet::from([TeamId("desk".to_string())]))
            .with_statuses(&[RequestStatus::Pending]);

        assert!(query.matches(&request("ana", "desk", 10, RequestStatus::Pending)));
        assert!(!query.matches(&request("ana", "desk", 16, RequestStatus::Pending)));
        assert!(!query.matches(&request("ana", "ops", 10, RequestStatus::Pending)));
        assert!(!query.matches(&request("ben", "desk", 10, RequestStatus::Pending)));
        assert!(!query.matches(&request("ana", "desk", 10, RequestStatus::Approved)));
        assert!(RequestQuery::default().matches(&request("ben", "ops", 1, RequestStatus::Rejected)));
    }
}
