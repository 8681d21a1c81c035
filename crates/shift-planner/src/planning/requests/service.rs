use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};

use super::domain::{
    check_range, InvalidRequest, NotificationEvent, NotificationKind, VacationRequestGroup,
    VacationSubmission,
};
use super::repository::{Notifier, PlanningStore, RepositoryError, RequestQuery, ShiftQuery};
use crate::planning::access::{AccessError, AccessScope, AccessScopeGate, ScopeCache, TeamFilter};
use crate::planning::domain::{
    Actor, GroupId, RequestId, RequestStatus, ShiftRecord, TeamId, TimeWindow, UserId,
    VacationRequest,
};
use crate::planning::hierarchy::{HierarchyError, TeamHierarchy};
use crate::planning::overview::{build_overview, PlanningOverview, PlanningSettings};
use crate::planning::simulation::{Decision, ImpactReport};
use crate::planning::snapshot::PlanningSnapshot;

/// Service composing the access gate, the store, and best-effort notifications.
pub struct VacationRequestService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    settings: PlanningSettings,
    scopes: ScopeCache,
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static GROUP_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("vr-{id:06}"))
}

fn next_group_id() -> GroupId {
    let id = GROUP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    GroupId(format!("grp-{id:06}"))
}

impl<S, N> VacationRequestService<S, N>
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, settings: PlanningSettings) -> Self {
        Self {
            store,
            notifier,
            settings,
            scopes: ScopeCache::default(),
        }
    }

    pub fn settings(&self) -> &PlanningSettings {
        &self.settings
    }

    /// Evaluates (or reuses) the actor's scope against the current membership revision.
    pub fn scope(
        &self,
        actor: &Actor,
        filter: &TeamFilter,
    ) -> Result<Arc<AccessScope>, VacationServiceError> {
        let (snapshot, hierarchy, revision) = self.organisation()?;
        let gate = AccessScopeGate::new(&hierarchy, &snapshot.memberships);
        Ok(self
            .scopes
            .get_or_evaluate(&gate, actor, filter, revision)?)
    }

    /// File a new request for the actor, one pending request per working day.
    pub fn submit(
        &self,
        actor: &Actor,
        submission: VacationSubmission,
    ) -> Result<VacationRequestGroup, VacationServiceError> {
        let dates = submission.validate()?;
        self.ensure_member(actor, &submission.team_id)?;
        self.ensure_no_overlap(&actor.user_id, &dates, &submission.window(), &BTreeSet::new())?;

        let group = build_group(actor, &submission, &dates, None);
        self.store
            .create_group(&group)
            .map_err(|err| overlap_on_conflict(err, &dates))?;

        info!(
            user = %actor.user_id,
            team = %submission.team_id,
            days = group.len(),
            "vacation request submitted"
        );
        if let Some(first) = group.requests.first() {
            self.notify(NotificationEvent::for_request(first, NotificationKind::Request));
        }
        Ok(group)
    }

    /// Replace a still-pending request (and its whole group) with a new submission.
    pub fn edit(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        submission: VacationSubmission,
    ) -> Result<VacationRequestGroup, VacationServiceError> {
        let existing = self.owned_pending_group(actor, request_id, "edit")?;
        let dates = submission.validate()?;
        self.ensure_member(actor, &submission.team_id)?;

        let replaced: BTreeSet<RequestId> =
            existing.iter().map(|request| request.id.clone()).collect();
        self.ensure_no_overlap(&actor.user_id, &dates, &submission.window(), &replaced)?;

        let previous_group = existing
            .first()
            .and_then(|request| request.request_group_id.clone());
        let group = build_group(actor, &submission, &dates, previous_group);
        let previous_ids: Vec<RequestId> = replaced.into_iter().collect();
        self.store
            .replace_group(&previous_ids, &group)
            .map_err(|err| overlap_on_conflict(err, &dates))?;

        info!(
            user = %actor.user_id,
            replaced = previous_ids.len(),
            days = group.len(),
            "vacation request edited"
        );
        if let Some(first) = group.requests.first() {
            self.notify(NotificationEvent::for_request(first, NotificationKind::Request));
        }
        Ok(group)
    }

    /// Delete a still-pending request together with the rest of its group.
    pub fn withdraw(
        &self,
        actor: &Actor,
        request_id: &RequestId,
    ) -> Result<Vec<RequestId>, VacationServiceError> {
        let existing = self.owned_pending_group(actor, request_id, "withdraw")?;
        let ids: Vec<RequestId> = existing.iter().map(|request| request.id.clone()).collect();
        self.store.delete_requests(&ids)?;
        info!(user = %actor.user_id, days = ids.len(), "vacation request withdrawn");
        Ok(ids)
    }

    /// Approve a pending request and reconcile the requester's shift record for that day.
    pub fn approve(
        &self,
        actor: &Actor,
        request_id: &RequestId,
    ) -> Result<VacationRequest, VacationServiceError> {
        let pending = self.adjudicable(actor, request_id, "approve")?;

        let mut approved = pending.clone();
        approved.status = RequestStatus::Approved;
        approved.approver_id = Some(actor.user_id.clone());
        approved.decided_at = Some(Utc::now());
        let shift = ShiftRecord::vacation_for(&approved);

        self.commit_approval(&pending, &approved, &shift)?;

        info!(
            request = %approved.id,
            approver = %actor.user_id,
            date = %approved.requested_date,
            "vacation request approved"
        );
        self.notify(NotificationEvent::for_request(&approved, NotificationKind::Approval));
        Ok(approved)
    }

    pub fn reject(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        reason: &str,
    ) -> Result<VacationRequest, VacationServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(InvalidRequest::MissingRejectionReason.into());
        }
        let mut request = self.adjudicable(actor, request_id, "reject")?;

        request.status = RequestStatus::Rejected;
        request.approver_id = Some(actor.user_id.clone());
        request.rejection_reason = Some(reason.to_string());
        request.decided_at = Some(Utc::now());
        self.transition(RequestStatus::Pending, &request)?;

        info!(request = %request.id, approver = %actor.user_id, "vacation request rejected");
        self.notify(NotificationEvent::for_request(&request, NotificationKind::Rejection));
        Ok(request)
    }

    /// Fetch a request the actor owns or whose team is in scope with full detail.
    pub fn get(
        &self,
        actor: &Actor,
        request_id: &RequestId,
    ) -> Result<VacationRequest, VacationServiceError> {
        let request = self.fetch(request_id)?;
        if request.user_id == actor.user_id {
            return Ok(request);
        }
        let scope = self.scope(actor, &TeamFilter::All)?;
        if scope.can_adjudicate(&request.team_id) {
            return Ok(request);
        }
        Err(VacationServiceError::Forbidden {
            actor: actor.user_id.clone(),
            action: "view",
            team_id: request.team_id,
        })
    }

    /// Capacity, conflicts, fairness and roster for the actor's scope over `[from, to]`.
    pub fn overview(
        &self,
        actor: &Actor,
        filter: &TeamFilter,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PlanningOverview, VacationServiceError> {
        check_range(from, to)?;
        let (mut snapshot, hierarchy, revision) = self.organisation()?;
        let scope = {
            let gate = AccessScopeGate::new(&hierarchy, &snapshot.memberships);
            self.scopes.get_or_evaluate(&gate, actor, filter, revision)?
        };

        snapshot.requests = self
            .store
            .query_requests(&RequestQuery::default().between(from, to))?;
        snapshot.shifts = self.store.query_shifts(&ShiftQuery::between(from, to))?;

        Ok(build_overview(
            &snapshot,
            &hierarchy,
            &scope,
            from,
            to,
            &self.settings,
        ))
    }

    /// Hypothetical decisions replayed over the scoped overview; nothing is stored.
    pub fn what_if(
        &self,
        actor: &Actor,
        filter: &TeamFilter,
        from: NaiveDate,
        to: NaiveDate,
        decisions: &BTreeMap<RequestId, Decision>,
    ) -> Result<ImpactReport, VacationServiceError> {
        let overview = self.overview(actor, filter, from, to)?;
        Ok(overview.simulate(decisions))
    }

    fn organisation(&self) -> Result<(PlanningSnapshot, TeamHierarchy, u64), VacationServiceError> {
        let revision = self.store.membership_revision()?;
        let snapshot = PlanningSnapshot {
            teams: self.store.teams()?,
            memberships: self.store.memberships()?,
            requests: Vec::new(),
            shifts: Vec::new(),
        };
        let hierarchy = snapshot.hierarchy()?;
        Ok((snapshot, hierarchy, revision))
    }

    fn fetch(&self, request_id: &RequestId) -> Result<VacationRequest, VacationServiceError> {
        self.store
            .fetch_request(request_id)?
            .ok_or_else(|| VacationServiceError::NotFound(request_id.clone()))
    }

    fn ensure_member(&self, actor: &Actor, team_id: &TeamId) -> Result<(), VacationServiceError> {
        let is_member = self
            .store
            .memberships()?
            .iter()
            .any(|membership| membership.user_id == actor.user_id && membership.team_id == *team_id);
        if is_member {
            Ok(())
        } else {
            Err(VacationServiceError::Forbidden {
                actor: actor.user_id.clone(),
                action: "file time-off for",
                team_id: team_id.clone(),
            })
        }
    }

    /// Every date is checked before anything is written.
    fn ensure_no_overlap(
        &self,
        user_id: &UserId,
        dates: &[NaiveDate],
        window: &TimeWindow,
        ignore: &BTreeSet<RequestId>,
    ) -> Result<(), VacationServiceError> {
        let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
            return Ok(());
        };
        let existing = self.store.query_requests(
            &RequestQuery::for_user(user_id)
                .between(*first, *last)
                .with_statuses(&[RequestStatus::Pending, RequestStatus::Approved]),
        )?;

        for date in dates {
            let clash = existing.iter().find(|request| {
                request.requested_date == *date
                    && request.is_active()
                    && !ignore.contains(&request.id)
                    && request.window().overlaps(window)
            });
            if let Some(request) = clash {
                return Err(VacationServiceError::Overlap {
                    date: *date,
                    existing: Some(request.id.clone()),
                });
            }
        }
        Ok(())
    }

    fn owned_pending_group(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        action: &'static str,
    ) -> Result<Vec<VacationRequest>, VacationServiceError> {
        let request = self.fetch(request_id)?;
        if request.user_id != actor.user_id {
            return Err(VacationServiceError::Forbidden {
                actor: actor.user_id.clone(),
                action,
                team_id: request.team_id,
            });
        }

        let members = match &request.request_group_id {
            Some(group_id) => self.store.group_requests(group_id)?,
            None => vec![request],
        };
        if let Some(decided) = members.iter().find(|member| !member.is_pending()) {
            return Err(VacationServiceError::InvalidTransition {
                request_id: decided.id.clone(),
                status: decided.status,
            });
        }
        Ok(members)
    }

    fn adjudicable(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        action: &'static str,
    ) -> Result<VacationRequest, VacationServiceError> {
        let request = self.fetch(request_id)?;
        let scope = self.scope(actor, &TeamFilter::All)?;
        if !scope.can_adjudicate(&request.team_id) {
            return Err(VacationServiceError::Forbidden {
                actor: actor.user_id.clone(),
                action,
                team_id: request.team_id,
            });
        }
        if !request.is_pending() {
            return Err(VacationServiceError::InvalidTransition {
                request_id: request.id,
                status: request.status,
            });
        }
        Ok(request)
    }

    /// Conditional status write; a decision that lost the race reports the stored status.
    fn transition(
        &self,
        expected: RequestStatus,
        request: &VacationRequest,
    ) -> Result<(), VacationServiceError> {
        match self.store.transition_request(expected, request) {
            Ok(()) => Ok(()),
            Err(RepositoryError::Conflict) => {
                let current = self.fetch(&request.id)?;
                Err(VacationServiceError::InvalidTransition {
                    request_id: current.id,
                    status: current.status,
                })
            }
            Err(RepositoryError::NotFound) => {
                Err(VacationServiceError::NotFound(request.id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Claim the request as approved, then swap the day's shifts for the vacation shift.
    /// No shift is touched unless the request was still pending at write time.
    fn commit_approval(
        &self,
        pending: &VacationRequest,
        approved: &VacationRequest,
        shift: &ShiftRecord,
    ) -> Result<(), VacationServiceError> {
        let user_id = &pending.user_id;
        let date = pending.requested_date;

        self.transition(RequestStatus::Pending, approved)?;

        let removed = match self.store.delete_shifts(user_id, date) {
            Ok(removed) => removed,
            Err(err) => {
                self.revert_approval(pending);
                return Err(err.into());
            }
        };

        if let Err(err) = self.store.insert_shift(shift) {
            self.revert_approval(pending);
            self.restore_shifts(user_id, date, &removed);
            return Err(err.into());
        }

        Ok(())
    }

    fn revert_approval(&self, pending: &VacationRequest) {
        if let Err(err) = self.store.transition_request(RequestStatus::Approved, pending) {
            error!(
                request = %pending.id,
                error = %err,
                "failed to revert request status after shift write failure"
            );
        }
    }

    fn restore_shifts(&self, user_id: &UserId, date: NaiveDate, removed: &[ShiftRecord]) {
        if let Err(err) = self.store.delete_shifts(user_id, date) {
            error!(user = %user_id, %date, error = %err, "failed to clear shifts during rollback");
        }
        for record in removed {
            if let Err(err) = self.store.insert_shift(record) {
                error!(
                    user = %user_id,
                    %date,
                    error = %err,
                    "failed to restore shift record during rollback"
                );
            }
        }
    }

    fn notify(&self, event: NotificationEvent) {
        if let Err(err) = self.notifier.notify(&event) {
            warn!(
                request = %event.request_id,
                kind = event.kind.label(),
                error = %err,
                "notification delivery failed"
            );
        }
    }
}

fn build_group(
    actor: &Actor,
    submission: &VacationSubmission,
    dates: &[NaiveDate],
    previous_group: Option<GroupId>,
) -> VacationRequestGroup {
    let group_id = if dates.len() > 1 {
        Some(previous_group.unwrap_or_else(next_group_id))
    } else {
        None
    };
    let ids = dates.iter().map(|_| next_request_id()).collect();
    VacationRequestGroup::pending(
        actor.user_id.clone(),
        submission,
        dates,
        ids,
        group_id,
        Utc::now(),
    )
}

/// A uniqueness violation from the store means a concurrent submission won the race.
fn overlap_on_conflict(err: RepositoryError, dates: &[NaiveDate]) -> VacationServiceError {
    match (err, dates.first()) {
        (RepositoryError::Conflict, Some(date)) => VacationServiceError::Overlap {
            date: *date,
            existing: None,
        },
        (other, _) => VacationServiceError::Persistence(other),
    }
}

/// Error raised by the vacation request service.
#[derive(Debug, thiserror::Error)]
pub enum VacationServiceError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("actor {actor} may not {action} team {team_id}")]
    Forbidden {
        actor: UserId,
        action: &'static str,
        team_id: TeamId,
    },
    #[error("an active request already covers {date}")]
    Overlap {
        date: NaiveDate,
        existing: Option<RequestId>,
    },
    #[error(transparent)]
    Invalid(#[from] InvalidRequest),
    #[error("request {request_id} is already {}", .status.label())]
    InvalidTransition {
        request_id: RequestId,
        status: RequestStatus,
    },
    #[error("request {0} not found")]
    NotFound(RequestId),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error(transparent)]
    Persistence(#[from] RepositoryError),
}
