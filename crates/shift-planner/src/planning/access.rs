//! Role policy: which teams an actor may see and how much detail each record discloses.
//!
//! The gate is evaluated once per operation into an [`AccessScope`]; downstream code only asks
//! the scope questions and never inspects roles itself.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    ActivityType, Actor, AvailabilityStatus, Role, ShiftRecord, TeamId, TeamMembership, UserId,
};
use super::hierarchy::{HierarchyError, TeamHierarchy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetailLevel {
    Full,
    AvailabilityOnly,
}

/// Which part of the forest the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "team_id", rename_all = "snake_case")]
pub enum TeamFilter {
    #[default]
    All,
    Team(TeamId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Privileged,
    Manager,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("actor {actor} may not access team {team_id}")]
    TeamNotVisible { actor: UserId, team_id: TeamId },
    #[error("actor {0} has no planning role")]
    NoRole(UserId),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

/// Declarative outcome of the role policy for one actor and filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessScope {
    pub actor: UserId,
    pub audience: Audience,
    pub filter: TeamFilter,
    pub visible_team_ids: BTreeSet<TeamId>,
    pub detail_level: DetailLevel,
    /// Teams the actor sees in full detail (managed subtree for managers).
    pub full_detail_team_ids: BTreeSet<TeamId>,
    #[serde(skip)]
    full_detail_users: BTreeSet<UserId>,
}

impl AccessScope {
    pub fn can_see_team(&self, team_id: &TeamId) -> bool {
        self.visible_team_ids.contains(team_id)
    }

    /// Detail disclosed for records about `user_id`; applied per record.
    pub fn detail_for(&self, user_id: &UserId) -> DetailLevel {
        match self.audience {
            Audience::Privileged => DetailLevel::Full,
            Audience::Manager if self.full_detail_users.contains(user_id) => DetailLevel::Full,
            Audience::Manager | Audience::Member => DetailLevel::AvailabilityOnly,
        }
    }

    /// Whether the actor may approve or reject requests filed against `team_id`.
    pub fn can_adjudicate(&self, team_id: &TeamId) -> bool {
        match self.audience {
            Audience::Privileged => true,
            Audience::Manager => self.full_detail_team_ids.contains(team_id),
            Audience::Member => false,
        }
    }

    pub fn view_shift(&self, record: &ShiftRecord) -> ShiftView {
        match self.detail_for(&record.user_id) {
            DetailLevel::Full => ShiftView {
                user_id: record.user_id.clone(),
                team_id: record.team_id.clone(),
                date: record.date,
                detail_level: DetailLevel::Full,
                availability: record.availability_status,
                activity_type: Some(record.activity_type),
                notes: record.notes.clone(),
            },
            DetailLevel::AvailabilityOnly => ShiftView {
                user_id: record.user_id.clone(),
                team_id: record.team_id.clone(),
                date: record.date,
                detail_level: DetailLevel::AvailabilityOnly,
                availability: record.activity_type.availability(),
                activity_type: None,
                notes: None,
            },
        }
    }

    pub fn view_shifts<'a>(
        &self,
        records: impl IntoIterator<Item = &'a ShiftRecord>,
    ) -> Vec<ShiftView> {
        records
            .into_iter()
            .map(|record| self.view_shift(record))
            .collect()
    }
}

/// Shift record as disclosed to one observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShiftView {
    pub user_id: UserId,
    pub team_id: TeamId,
    pub date: NaiveDate,
    pub detail_level: DetailLevel,
    pub availability: AvailabilityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<ActivityType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

pub struct AccessScopeGate<'a> {
    hierarchy: &'a TeamHierarchy,
    memberships: &'a [TeamMembership],
}

impl<'a> AccessScopeGate<'a> {
    pub fn new(hierarchy: &'a TeamHierarchy, memberships: &'a [TeamMembership]) -> Self {
        Self {
            hierarchy,
            memberships,
        }
    }

    pub fn evaluate(&self, actor: &Actor, filter: &TeamFilter) -> Result<AccessScope, AccessError> {
        if actor.is_privileged() {
            let visible = match filter {
                TeamFilter::All => self.hierarchy.team_ids(),
                TeamFilter::Team(team_id) => BTreeSet::from([team_id.clone()]),
            };
            return Ok(AccessScope {
                actor: actor.user_id.clone(),
                audience: Audience::Privileged,
                filter: filter.clone(),
                full_detail_team_ids: visible.clone(),
                full_detail_users: self.users_in(&visible),
                visible_team_ids: visible,
                detail_level: DetailLevel::Full,
            });
        }

        if actor.has_role(Role::Manager) {
            let mut managed = BTreeSet::new();
            for membership in self.own_memberships(actor) {
                if membership.is_manager {
                    managed.extend(self.hierarchy.subtree(&membership.team_id)?);
                }
            }

            let visible = match filter {
                TeamFilter::All => managed.clone(),
                TeamFilter::Team(team_id) => BTreeSet::from([team_id.clone()]),
            };

            return Ok(AccessScope {
                actor: actor.user_id.clone(),
                audience: Audience::Manager,
                filter: filter.clone(),
                visible_team_ids: visible,
                detail_level: DetailLevel::Full,
                full_detail_users: self.users_in(&managed),
                full_detail_team_ids: managed,
            });
        }

        if actor.has_role(Role::TeamMember) {
            let own: BTreeSet<TeamId> = self
                .own_memberships(actor)
                .map(|membership| membership.team_id.clone())
                .collect();

            let visible = match filter {
                TeamFilter::All => own,
                TeamFilter::Team(team_id) if own.contains(team_id) => {
                    BTreeSet::from([team_id.clone()])
                }
                TeamFilter::Team(team_id) => {
                    return Err(AccessError::TeamNotVisible {
                        actor: actor.user_id.clone(),
                        team_id: team_id.clone(),
                    })
                }
            };

            return Ok(AccessScope {
                actor: actor.user_id.clone(),
                audience: Audience::Member,
                filter: filter.clone(),
                visible_team_ids: visible,
                detail_level: DetailLevel::AvailabilityOnly,
                full_detail_team_ids: BTreeSet::new(),
                full_detail_users: BTreeSet::new(),
            });
        }

        Err(AccessError::NoRole(actor.user_id.clone()))
    }

    fn own_memberships<'m>(
        &'m self,
        actor: &'m Actor,
    ) -> impl Iterator<Item = &'m TeamMembership> + 'm {
        self.memberships
            .iter()
            .filter(move |membership| membership.user_id == actor.user_id)
    }

    fn users_in(&self, teams: &BTreeSet<TeamId>) -> BTreeSet<UserId> {
        self.memberships
            .iter()
            .filter(|membership| teams.contains(&membership.team_id))
            .map(|membership| membership.user_id.clone())
            .collect()
    }
}

/// Members of the teams the scope can see. An explicit team filter yields that team only.
pub fn visible_members(
    scope: &AccessScope,
    memberships: &[TeamMembership],
) -> Vec<TeamMembership> {
    memberships
        .iter()
        .filter(|membership| scope.can_see_team(&membership.team_id))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ScopeKey {
    actor: UserId,
    roles: Vec<Role>,
    filter: TeamFilter,
    revision: u64,
}

/// Entry limit of [`ScopeCache::default`].
pub const DEFAULT_SCOPE_CACHE_ENTRIES: usize = 1024;

/// Memoized scopes keyed by actor, role snapshot, filter and membership revision.
///
/// Callers pass the store's membership revision; once it moves, earlier entries are dropped.
/// The cache never holds more than `max_entries`; a full cache is cleared before inserting.
#[derive(Debug, Clone)]
pub struct ScopeCache {
    entries: Arc<Mutex<HashMap<ScopeKey, Arc<AccessScope>>>>,
    max_entries: usize,
}

impl Default for ScopeCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_SCOPE_CACHE_ENTRIES)
    }
}

impl ScopeCache {
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Arc::default(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn get_or_evaluate(
        &self,
        gate: &AccessScopeGate<'_>,
        actor: &Actor,
        filter: &TeamFilter,
        revision: u64,
    ) -> Result<Arc<AccessScope>, AccessError> {
        let key = ScopeKey {
            actor: actor.user_id.clone(),
            roles: actor.roles.iter().copied().collect(),
            filter: filter.clone(),
            revision,
        };

        if let Some(hit) = self.lock().get(&key) {
            return Ok(hit.clone());
        }

        let scope = Arc::new(gate.evaluate(actor, filter)?);
        let mut entries = self.lock();
        entries.retain(|existing, _| existing.revision == revision);
        if entries.len() >= self.max_entries {
            debug!(entries = entries.len(), "scope cache full, clearing");
            entries.clear();
        }
        entries.insert(key, scope.clone());
        Ok(scope)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ScopeKey, Arc<AccessScope>>> {
        // A poisoned cache only holds derived data; keep serving it.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
