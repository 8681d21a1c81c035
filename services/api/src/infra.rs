use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use shift_planner::planning::requests::{
    NotificationError, NotificationEvent, Notifier, PlanningStore, RepositoryError, RequestQuery,
    ShiftQuery, VacationRequestGroup,
};
use shift_planner::planning::{
    GroupId, PlanningSnapshot, RequestId, RequestStatus, ShiftRecord, Team, TeamMembership,
    UserId, VacationRequest,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, Default)]
struct StoreState {
    teams: Vec<Team>,
    memberships: Vec<TeamMembership>,
    revision: u64,
    requests: BTreeMap<RequestId, VacationRequest>,
    shifts: Vec<ShiftRecord>,
}

impl StoreState {
    /// An active request of the same user already covers part of one of `candidates`' days.
    fn collides(&self, candidates: &[VacationRequest], replaced: &BTreeSet<RequestId>) -> bool {
        candidates.iter().any(|candidate| {
            self.requests.values().any(|existing| {
                !replaced.contains(&existing.id)
                    && existing.status != RequestStatus::Rejected
                    && existing.user_id == candidate.user_id
                    && existing.requested_date == candidate.requested_date
                    && existing.window().overlaps(&candidate.window())
            })
        })
    }
}

/// Process-local store used by the HTTP service and the CLI demo.
#[derive(Default, Clone)]
pub(crate) struct InMemoryPlanningStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryPlanningStore {
    pub(crate) fn from_snapshot(snapshot: PlanningSnapshot) -> Self {
        let state = StoreState {
            teams: snapshot.teams,
            memberships: snapshot.memberships,
            revision: 1,
            requests: snapshot
                .requests
                .into_iter()
                .map(|request| (request.id.clone(), request))
                .collect(),
            shifts: snapshot.shifts,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn add_membership(&self, membership: TeamMembership) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.memberships.push(membership);
        state.revision += 1;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("planning store mutex poisoned".to_string()))
    }
}

impl PlanningStore for InMemoryPlanningStore {
    fn teams(&self) -> Result<Vec<Team>, RepositoryError> {
        Ok(self.lock()?.teams.clone())
    }

    fn memberships(&self) -> Result<Vec<TeamMembership>, RepositoryError> {
        Ok(self.lock()?.memberships.clone())
    }

    fn membership_revision(&self) -> Result<u64, RepositoryError> {
        Ok(self.lock()?.revision)
    }

    fn fetch_request(&self, id: &RequestId) -> Result<Option<VacationRequest>, RepositoryError> {
        Ok(self.lock()?.requests.get(id).cloned())
    }

    fn query_requests(
        &self,
        query: &RequestQuery,
    ) -> Result<Vec<VacationRequest>, RepositoryError> {
        Ok(self
            .lock()?
            .requests
            .values()
            .filter(|request| query.matches(request))
            .cloned()
            .collect())
    }

    fn group_requests(&self, group_id: &GroupId) -> Result<Vec<VacationRequest>, RepositoryError> {
        Ok(self
            .lock()?
            .requests
            .values()
            .filter(|request| request.request_group_id.as_ref() == Some(group_id))
            .cloned()
            .collect())
    }

    fn create_group(&self, group: &VacationRequestGroup) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let duplicate_id = group
            .requests
            .iter()
            .any(|request| state.requests.contains_key(&request.id));
        if duplicate_id || state.collides(&group.requests, &BTreeSet::new()) {
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
        let mut state = self.lock()?;
        if previous.iter().any(|id| !state.requests.contains_key(id)) {
            return Err(RepositoryError::NotFound);
        }
        let replaced: BTreeSet<RequestId> = previous.iter().cloned().collect();
        if state.collides(&group.requests, &replaced) {
            return Err(RepositoryError::Conflict);
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
        let mut state = self.lock()?;
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
        let mut state = self.lock()?;
        match state.requests.get_mut(&request.id) {
            Some(stored) if stored.status == expected => {
                *stored = request.clone();
                Ok(())
            }
            Some(_) => Err(RepositoryError::Conflict),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn query_shifts(&self, query: &ShiftQuery) -> Result<Vec<ShiftRecord>, RepositoryError> {
        Ok(self
            .lock()?
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
        let mut state = self.lock()?;
        let (removed, kept): (Vec<ShiftRecord>, Vec<ShiftRecord>) =
            std::mem::take(&mut state.shifts)
                .into_iter()
                .partition(|record| record.user_id == *user_id && record.date == date);
        state.shifts = kept;
        Ok(removed)
    }

    fn insert_shift(&self, record: &ShiftRecord) -> Result<(), RepositoryError> {
        self.lock()?.shifts.push(record.clone());
        Ok(())
    }
}

/// Writes notifications to the log and keeps them for inspection.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl Notifier for LoggingNotifier {
    fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        info!(
            kind = event.kind.label(),
            request = %event.request_id,
            requester = %event.requester_id,
            "notification dispatched"
        );
        self.events
            .lock()
            .map_err(|_| NotificationError::Transport("notification log poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

impl LoggingNotifier {
    pub(crate) fn events(&self) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};
    use shift_planner::planning::TeamId;

    fn request(id: &str, user: &str, window: Option<(u32, u32)>) -> VacationRequest {
        let time = |hour| NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time");
        VacationRequest {
            id: RequestId(id.to_string()),
            user_id: UserId(user.to_string()),
            team_id: TeamId("desk".to_string()),
            requested_date: NaiveDate::from_ymd_opt(2025, 6, 10).expect("valid date"),
            is_full_day: window.is_none(),
            start_time: window.map(|(start, _)| time(start)),
            end_time: window.map(|(_, end)| time(end)),
            status: RequestStatus::Pending,
            notes: None,
            rejection_reason: None,
            approver_id: None,
            request_group_id: None,
            selected_approver_id: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    fn group(requests: Vec<VacationRequest>) -> VacationRequestGroup {
        VacationRequestGroup {
            group_id: None,
            requests,
        }
    }

    #[test]
    fn create_group_enforces_one_active_request_per_window() {
        let store = InMemoryPlanningStore::default();
        store
            .create_group(&group(vec![request("vr-1", "ana", Some((8, 12)))]))
            .expect("first request stored");

        assert_eq!(
            store.create_group(&group(vec![request("vr-2", "ana", Some((11, 15)))])),
            Err(RepositoryError::Conflict)
        );
        store
            .create_group(&group(vec![request("vr-3", "ana", Some((13, 17)))]))
            .expect("disjoint afternoon allowed");
        store
            .create_group(&group(vec![request("vr-4", "ben", None)]))
            .expect("other users unaffected");
    }

    #[test]
    fn replace_group_ignores_the_requests_it_replaces() {
        let store = InMemoryPlanningStore::default();
        store
            .create_group(&group(vec![request("vr-1", "ana", None)]))
            .expect("stored");

        store
            .replace_group(
                &[RequestId("vr-1".to_string())],
                &group(vec![request("vr-2", "ana", Some((8, 12)))]),
            )
            .expect("replacement stored");
        assert!(store
            .fetch_request(&RequestId("vr-1".to_string()))
            .expect("store available")
            .is_none());
        assert_eq!(
            store.replace_group(&[RequestId("vr-1".to_string())], &group(Vec::new())),
            Err(RepositoryError::NotFound)
        );
    }

    #[test]
    fn transitions_only_apply_to_the_expected_status() {
        let store = InMemoryPlanningStore::default();
        let pending = request("vr-1", "ana", None);
        store
            .create_group(&group(vec![pending.clone()]))
            .expect("stored");

        let approved = VacationRequest {
            status: RequestStatus::Approved,
            approver_id: Some(UserId("nora".to_string())),
            ..pending.clone()
        };
        store
            .transition_request(RequestStatus::Pending, &approved)
            .expect("pending request approved");

        let rejected = VacationRequest {
            status: RequestStatus::Rejected,
            rejection_reason: Some("read before the approval".to_string()),
            ..pending
        };
        assert_eq!(
            store.transition_request(RequestStatus::Pending, &rejected),
            Err(RepositoryError::Conflict)
        );
        let stored = store
            .fetch_request(&RequestId("vr-1".to_string()))
            .expect("store available")
            .expect("request kept");
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(
            store.transition_request(
                RequestStatus::Pending,
                &request("vr-9", "ana", None)
            ),
            Err(RepositoryError::NotFound)
        );
    }

    #[test]
    fn memberships_bump_the_revision() {
        let store = InMemoryPlanningStore::from_snapshot(PlanningSnapshot::default());
        let before = store.membership_revision().expect("revision");
        store
            .add_membership(TeamMembership {
                team_id: TeamId("desk".to_string()),
                user_id: UserId("ana".to_string()),
                is_manager: false,
            })
            .expect("membership stored");
        assert_eq!(store.membership_revision().expect("revision"), before + 1);
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert!(parse_date("2025-06-10").is_ok());
        let err = parse_date("10/06/2025").expect_err("format rejected");
        assert!(err.contains("YYYY-MM-DD"));
    }
}
