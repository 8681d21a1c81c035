use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::domain::{ShiftRecord, Team, TeamMembership, VacationRequest};
use super::hierarchy::{HierarchyError, TeamHierarchy};

/// Point-in-time copy of everything the analytics read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningSnapshot {
    pub teams: Vec<Team>,
    pub memberships: Vec<TeamMembership>,
    #[serde(default)]
    pub requests: Vec<VacationRequest>,
    #[serde(default)]
    pub shifts: Vec<ShiftRecord>,
}

#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Hierarchy(HierarchyError),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(err) => write!(f, "failed to read planning snapshot: {}", err),
            SnapshotError::Json(err) => write!(f, "invalid planning snapshot JSON: {}", err),
            SnapshotError::Hierarchy(err) => {
                write!(f, "planning snapshot has a malformed team hierarchy: {}", err)
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Io(err) => Some(err),
            SnapshotError::Json(err) => Some(err),
            SnapshotError::Hierarchy(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<HierarchyError> for SnapshotError {
    fn from(err: HierarchyError) -> Self {
        Self::Hierarchy(err)
    }
}

impl PlanningSnapshot {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parses a snapshot and rejects team forests containing cycles.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SnapshotError> {
        let snapshot: PlanningSnapshot = serde_json::from_reader(reader)?;
        snapshot.hierarchy()?;
        Ok(snapshot)
    }

    pub fn hierarchy(&self) -> Result<TeamHierarchy, HierarchyError> {
        let hierarchy = TeamHierarchy::new(&self.teams);
        hierarchy.validate()?;
        Ok(hierarchy)
    }
}
