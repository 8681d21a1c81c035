//! Ancestor and descendant lookups over the team forest.
//!
//! A resolver is built from one snapshot of the team list and is meant to live for a single
//! operation: descendant closures are memoized because the access gate and the capacity views
//! ask for the same teams repeatedly.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::Serialize;

use super::domain::{Team, TeamId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("team hierarchy contains a cycle through team {team_id}")]
    Cycle { team_id: TeamId },
    #[error("unknown team {0}")]
    UnknownTeam(TeamId),
}

/// Position of a team inside the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamTier {
    TopLevel,
    MidLevel,
    Leaf,
}

#[derive(Debug)]
pub struct TeamHierarchy {
    teams: BTreeMap<TeamId, Team>,
    children: BTreeMap<TeamId, Vec<TeamId>>,
    memo: RefCell<HashMap<TeamId, BTreeSet<TeamId>>>,
}

impl TeamHierarchy {
    pub fn new(teams: &[Team]) -> Self {
        let mut by_id = BTreeMap::new();
        let mut children: BTreeMap<TeamId, Vec<TeamId>> = BTreeMap::new();

        for team in teams {
            by_id.insert(team.id.clone(), team.clone());
            if let Some(parent) = &team.parent_team_id {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(team.id.clone());
            }
        }

        for siblings in children.values_mut() {
            siblings.sort();
            siblings.dedup();
        }

        Self {
            teams: by_id,
            children,
            memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn contains(&self, team_id: &TeamId) -> bool {
        self.teams.contains_key(team_id)
    }

    pub fn team(&self, team_id: &TeamId) -> Option<&Team> {
        self.teams.get(team_id)
    }

    pub fn team_ids(&self) -> BTreeSet<TeamId> {
        self.teams.keys().cloned().collect()
    }

    pub fn children(&self, team_id: &TeamId) -> &[TeamId] {
        self.children
            .get(team_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every team below `team_id`, excluding the team itself.
    ///
    /// Unknown teams have no descendants. A walk that revisits a team, or that grows past the
    /// number of known teams, is reported as a cycle instead of looping.
    pub fn descendants(&self, team_id: &TeamId) -> Result<BTreeSet<TeamId>, HierarchyError> {
        if let Some(cached) = self.memo.borrow().get(team_id) {
            return Ok(cached.clone());
        }

        let mut found = BTreeSet::new();
        let mut queue: VecDeque<&TeamId> = self.children(team_id).iter().collect();

        while let Some(next) = queue.pop_front() {
            if next == team_id || !found.insert(next.clone()) || found.len() > self.teams.len() {
                return Err(HierarchyError::Cycle {
                    team_id: next.clone(),
                });
            }
            queue.extend(self.children(next));
        }

        self.memo
            .borrow_mut()
            .insert(team_id.clone(), found.clone());
        Ok(found)
    }

    /// `{team} ∪ descendants(team)`.
    pub fn subtree(&self, team_id: &TeamId) -> Result<BTreeSet<TeamId>, HierarchyError> {
        let mut subtree = self.descendants(team_id)?;
        subtree.insert(team_id.clone());
        Ok(subtree)
    }

    /// Root-first chain ending with the team itself.
    pub fn ancestor_chain(&self, team_id: &TeamId) -> Result<Vec<Team>, HierarchyError> {
        let mut current = self
            .teams
            .get(team_id)
            .ok_or_else(|| HierarchyError::UnknownTeam(team_id.clone()))?;
        let mut chain = vec![current.clone()];

        while let Some(parent_id) = &current.parent_team_id {
            if chain.len() > self.teams.len() {
                return Err(HierarchyError::Cycle {
                    team_id: team_id.clone(),
                });
            }
            // A dangling parent reference ends the chain.
            let Some(parent) = self.teams.get(parent_id) else {
                break;
            };
            chain.push(parent.clone());
            current = parent;
        }

        chain.reverse();
        Ok(chain)
    }

    pub fn tier(&self, team_id: &TeamId) -> Result<TeamTier, HierarchyError> {
        let team = self
            .teams
            .get(team_id)
            .ok_or_else(|| HierarchyError::UnknownTeam(team_id.clone()))?;

        let has_parent = team
            .parent_team_id
            .as_ref()
            .is_some_and(|parent| self.teams.contains_key(parent));

        Ok(match (has_parent, self.children(team_id).is_empty()) {
            (false, _) => TeamTier::TopLevel,
            (true, false) => TeamTier::MidLevel,
            (true, true) => TeamTier::Leaf,
        })
    }

    /// Checks that every parent chain terminates.
    pub fn validate(&self) -> Result<(), HierarchyError> {
        for team_id in self.teams.keys() {
            self.ancestor_chain(team_id)?;
        }
        Ok(())
    }
}
