//! Planning engine: hierarchy, access scope, capacity, conflicts, what-if, fairness and the
//! request lifecycle.

pub mod access;
pub mod calendar;
pub mod capacity;
pub mod conflicts;
pub mod domain;
pub mod export;
pub mod fairness;
pub mod hierarchy;
pub mod overview;
pub mod requests;
pub mod simulation;
pub mod snapshot;

pub use access::{
    AccessError, AccessScope, AccessScopeGate, Audience, DetailLevel, ScopeCache, ShiftView,
    TeamFilter,
};
pub use capacity::{CapacityCalculator, CombinedCapacity, LeaveCounting, StaffingPolicy};
pub use conflicts::{Conflict, ConflictKind, ConflictSeverity};
pub use domain::{
    ActivityType, Actor, AvailabilityStatus, DayCapacity, GroupId, RequestId, RequestStatus,
    RiskLevel, Role, ShiftRecord, Team, TeamId, TeamMembership, TimeWindow, UserId,
    VacationRequest,
};
pub use fairness::{EmployeeStat, FairnessReport};
pub use hierarchy::{HierarchyError, TeamHierarchy, TeamTier};
pub use overview::{build_overview, PlanningOverview, PlanningSettings};
pub use simulation::{Decision, ImpactReport};
pub use snapshot::{PlanningSnapshot, SnapshotError};
