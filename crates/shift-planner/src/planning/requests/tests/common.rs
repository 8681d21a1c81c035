use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use crate::planning::domain::{
    ActivityType, Actor, GroupId, RequestId, RequestStatus, Role, ShiftRecord, Team, TeamId,
    TeamMembership, UserId, VacationRequest,
};
use crate::planning::overview::PlanningSettings;
use crate::planning::requests::domain::{NotificationEvent, VacationRequestGroup, VacationSubmission};
use crate::planning::requests::repository::{
    NotificationError, Notifier, PlanningStore, RepositoryError, RequestQuery, ShiftQuery,
};
use crate::planning::requests::router::{ROLES_HEADER, USER_HEADER};
use crate::planning::requests::VacationRequestService;

pub(super) fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, day).expect("valid date")
}

pub(super) fn time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time")
}

fn team(id: &str, parent: Option<&str>) -> Team {
    Team {
        id: TeamId(id.to_string()),
        name: format!("Team {}", id.to_uppercase()),
        parent_team_id: parent.map(|parent| TeamId(parent.to_string())),
    }
}

pub(super) fn membership(team: &str, user: &str, is_manager: bool) -> TeamMembership {
    TeamMembership {
        team_id: TeamId(team.to_string()),
        user_id: UserId(user.to_string()),
        is_manager,
    }
}

pub(super) fn manager() -> Actor {
    Actor::new("boss", [Role::Manager])
}

pub(super) fn planner() -> Actor {
    Actor::new("pam", [Role::Planner])
}

pub(super) fn member(user: &str) -> Actor {
    Actor::new(user, [Role::TeamMember])
}

/// Full-day submission for team `b`.
pub(super) fn submission(start: u32, end: Option<u32>) -> VacationSubmission {
    VacationSubmission {
        team_id: TeamId("b".to_string()),
        start_date: date(start),
        end_date: end.map(date),
        is_full_day: true,
        start_time: None,
        end_time: None,
        notes: Some("Family trip".to_string()),
        selected_approver_id: Some(UserId("boss".to_string())),
    }
}

pub(super) fn partial_submission(day: u32, start: u32, end: u32) -> VacationSubmission {
    VacationSubmission {
        is_full_day: false,
        start_time: Some(time(start)),
        end_time: Some(time(end)),
        notes: None,
        ..submission(day, None)
    }
}

pub(super) fn stored_request(
    id: &str,
    user: &str,
    team: &str,
    day: u32,
    status: RequestStatus,
) -> VacationRequest {
    VacationRequest {
        id: RequestId(id.to_string()),
        user_id: UserId(user.to_string()),
        team_id: TeamId(team.to_string()),
        requested_date: date(day),
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

pub(super) fn work_shift(user: &str, team: &str, day: u32) -> ShiftRecord {
    ShiftRecord {
        user_id: UserId(user.to_string()),
        team_id: TeamId(team.to_string()),
        date: date(day),
        activity_type: ActivityType::Work,
        availability_status: ActivityType::Work.availability(),
        notes: Some("early shift".to_string()),
    }
}

/// Storage faults a test can switch on.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct Failures {
    pub(super) conflict_on_create: bool,
    pub(super) transition_request: bool,
    pub(super) vacation_shift_insert: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    teams: Vec<Team>,
    memberships: Vec<TeamMembership>,
    revision: u64,
    requests: BTreeMap<RequestId, VacationRequest>,
    shifts: Vec<ShiftRecord>,
    /// Copies served once by `fetch_request` in place of the stored request.
    stale_reads: BTreeMap<RequestId, VacationRequest>,
}

/// Organisation `a -> b -> c` plus a separate `d`; `boss` manages `b`.
#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    failures: Arc<Mutex<Failures>>,
}

impl MemoryStore {
    pub(super) fn seeded() -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().expect("store mutex poisoned");
            state.teams = vec![
                team("a", None),
                team("b", Some("a")),
                team("c", Some("b")),
                team("d", None),
            ];
            state.memberships = vec![
                membership("b", "boss", true),
                membership("b", "bea", false),
                membership("b", "bo", false),
                membership("c", "cid", false),
                membership("d", "dan", false),
                membership("d", "dora", false),
            ];
        }
        store
    }

    pub(super) fn fail(&self, configure: impl FnOnce(&mut Failures)) {
        configure(&mut self.failures.lock().expect("failure mutex poisoned"));
    }

    fn failures(&self) -> Failures {
        *self.failures.lock().expect("failure mutex poisoned")
    }

    pub(super) fn put_request(&self, request: VacationRequest) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.requests.insert(request.id.clone(), request);
    }

    /// The next `fetch_request` for this id returns `snapshot` instead of the stored copy.
    pub(super) fn serve_stale_read(&self, snapshot: VacationRequest) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.stale_reads.insert(snapshot.id.clone(), snapshot);
    }

    pub(super) fn put_shift(&self, record: ShiftRecord) {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .shifts
            .push(record);
    }

    pub(super) fn add_membership(&self, membership: TeamMembership) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.memberships.push(membership);
        state.revision += 1;
    }

    pub(super) fn all_requests(&self) -> Vec<VacationRequest> {
        let state = self.state.lock().expect("store mutex poisoned");
        state.requests.values().cloned().collect()
    }

    pub(super) fn request(&self, id: &RequestId) -> Option<VacationRequest> {
        let state = self.state.lock().expect("store mutex poisoned");
        state.requests.get(id).cloned()
    }

    pub(super) fn shifts_on(&self, user: &str, day: u32) -> Vec<ShiftRecord> {
        let state = self.state.lock().expect("store mutex poisoned");
        state
            .shifts
            .iter()
            .filter(|record| record.user_id.0 == user && record.date == date(day))
            .cloned()
            .collect()
    }
}

impl PlanningStore for MemoryStore {
    fn teams(&self) -> Result<Vec<Team>, RepositoryError> {
        Ok(self.state.lock().expect("store mutex poisoned").teams.clone())
    }

    fn memberships(&self) -> Result<Vec<TeamMembership>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .expect("store mutex poisoned")
            .memberships
            .clone())
    }

    fn membership_revision(&self) -> Result<u64, RepositoryError> {
        Ok(self.state.lock().expect("store mutex poisoned").revision)
    }

    fn fetch_request(&self, id: &RequestId) -> Result<Option<VacationRequest>, RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if let Some(snapshot) = state.stale_reads.remove(id) {
            return Ok(Some(snapshot));
        }
        Ok(state.requests.get(id).cloned())
    }

    fn query_requests(
        &self,
        query: &RequestQuery,
    ) -> Result<Vec<VacationRequest>, RepositoryError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .requests
            .values()
            .filter(|request| query.matches(request))
            .cloned()
            .collect())
    }

    fn group_requests(&self, group_id: &GroupId) -> Result<Vec<VacationRequest>, RepositoryError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .requests
            .values()
            .filter(|request| request.request_group_id.as_ref() == Some(group_id))
            .cloned()
            .collect())
    }

    fn create_group(&self, group: &VacationRequestGroup) -> Result<(), RepositoryError> {
        if self.failures().conflict_on_create {
            return Err(RepositoryError::Conflict);
        }
        let mut state = self.state.lock().expect("store mutex poisoned");
        if group
            .requests
            .iter()
            .any(|request| state.requests.contains_key(&request.id))
        {
            return Err(RepositoryError::Conflict);
        }
        for request in &group.requests {
            state.requests.insert(request.id.clone(), request.clone());
        }
        Ok(())
    }

    fn replace_group(
        &self,
        previous: &[RequestId],
        group: &VacationRequestGroup,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if previous.iter().any(|id| !state.requests.contains_key(id)) {
            return Err(RepositoryError::NotFound);
        }
        for id in previous {
            state.requests.remove(id);
        }
        for request in &group.requests {
            state.requests.insert(request.id.clone(), request.clone());
        }
        Ok(())
    }

    fn delete_requests(&self, ids: &[RequestId]) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        for id in ids {
            state.requests.remove(id);
        }
        Ok(())
    }

    fn transition_request(
        &self,
        expected: RequestStatus,
        request: &VacationRequest,
    ) -> Result<(), RepositoryError> {
        if self.failures().transition_request {
            return Err(RepositoryError::Unavailable("write timeout".to_string()));
        }
        let mut state = self.state.lock().expect("store mutex poisoned");
        match state.requests.get_mut(&request.id) {
            Some(existing) if existing.status == expected => {
                *existing = request.clone();
                Ok(())
            }
            Some(_) => Err(RepositoryError::Conflict),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn query_shifts(&self, query: &ShiftQuery) -> Result<Vec<ShiftRecord>, RepositoryError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .shifts
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }

    fn delete_shifts(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<ShiftRecord>, RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let (removed, kept): (Vec<ShiftRecord>, Vec<ShiftRecord>) = std::mem::take(&mut state.shifts)
            .into_iter()
            .partition(|record| record.user_id == *user_id && record.date == date);
        state.shifts = kept;
        Ok(removed)
    }

    fn insert_shift(&self, record: &ShiftRecord) -> Result<(), RepositoryError> {
        if self.failures().vacation_shift_insert && record.activity_type == ActivityType::Vacation
        {
            return Err(RepositoryError::Unavailable("shift table locked".to_string()));
        }
        self.put_shift(record.clone());
        Ok(())
    }
}

pub(super) struct UnavailableStore;

impl PlanningStore for UnavailableStore {
    fn teams(&self) -> Result<Vec<Team>, RepositoryError> {
        Err(offline())
    }

    fn memberships(&self) -> Result<Vec<TeamMembership>, RepositoryError> {
        Err(offline())
    }

    fn membership_revision(&self) -> Result<u64, RepositoryError> {
        Err(offline())
    }

    fn fetch_request(&self, _id: &RequestId) -> Result<Option<VacationRequest>, RepositoryError> {
        Err(offline())
    }

    fn query_requests(
        &self,
        _query: &RequestQuery,
    ) -> Result<Vec<VacationRequest>, RepositoryError> {
        Err(offline())
    }

    fn group_requests(&self, _group_id: &GroupId) -> Result<Vec<VacationRequest>, RepositoryError> {
        Err(offline())
    }

    fn create_group(&self, _group: &VacationRequestGroup) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn replace_group(
        &self,
        _previous: &[RequestId],
        _group: &VacationRequestGroup,
    ) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn delete_requests(&self, _ids: &[RequestId]) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn transition_request(
        &self,
        _expected: RequestStatus,
        _request: &VacationRequest,
    ) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn query_shifts(&self, _query: &ShiftQuery) -> Result<Vec<ShiftRecord>, RepositoryError> {
        Err(offline())
    }

    fn delete_shifts(
        &self,
        _user_id: &UserId,
        _date: NaiveDate,
    ) -> Result<Vec<ShiftRecord>, RepositoryError> {
        Err(offline())
    }

    fn insert_shift(&self, _record: &ShiftRecord) -> Result<(), RepositoryError> {
        Err(offline())
    }
}

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

#[derive(Default, Clone)]
pub(super) struct RecordingNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl RecordingNotifier {
    pub(super) fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event.clone());
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _event: &NotificationEvent) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay refused".to_string()))
    }
}

pub(super) fn build_service() -> (
    VacationRequestService<MemoryStore, RecordingNotifier>,
    Arc<MemoryStore>,
    Arc<RecordingNotifier>,
) {
    let store = Arc::new(MemoryStore::seeded());
    let notifier = Arc::new(RecordingNotifier::default());
    let service =
        VacationRequestService::new(store.clone(), notifier.clone(), PlanningSettings::default());
    (service, store, notifier)
}

pub(super) fn identity_headers(user: &str, roles: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_HEADER, HeaderValue::from_str(user).expect("header value"));
    headers.insert(ROLES_HEADER, HeaderValue::from_str(roles).expect("header value"));
    headers
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
