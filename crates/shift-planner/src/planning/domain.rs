use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for teams.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub String);

/// Identifier wrapper for employees and other actors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Identifier wrapper for stored vacation requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

/// Links the requests created together from one date range.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_id!(TeamId, UserId, RequestId, GroupId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    #[serde(default)]
    pub parent_team_id: Option<TeamId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    pub team_id: TeamId,
    pub user_id: UserId,
    #[serde(default)]
    pub is_manager: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Planner,
    Manager,
    TeamMember,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Planner => "planner",
            Role::Manager => "manager",
            Role::TeamMember => "team_member",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "planner" => Some(Role::Planner),
            "manager" => Some(Role::Manager),
            "team_member" | "member" => Some(Role::TeamMember),
            _ => None,
        }
    }
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub roles: BTreeSet<Role>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_privileged(&self) -> bool {
        self.has_role(Role::Admin) || self.has_role(Role::Planner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// A single day of requested time-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacationRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub team_id: TeamId,
    pub requested_date: NaiveDate,
    pub is_full_day: bool,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    pub status: RequestStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub approver_id: Option<UserId>,
    #[serde(default)]
    pub request_group_id: Option<GroupId>,
    #[serde(default)]
    pub selected_approver_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
}

impl VacationRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Pending and approved requests both hold their slot.
    pub fn is_active(&self) -> bool {
        self.status != RequestStatus::Rejected
    }

    /// Days of leave this request represents.
    pub fn day_weight(&self) -> f64 {
        if self.is_full_day {
            1.0
        } else {
            0.5
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.is_full_day, self.start_time, self.end_time)
    }
}

/// The slice of a day a request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    FullDay,
    Partial { start: NaiveTime, end: NaiveTime },
}

impl TimeWindow {
    pub fn new(is_full_day: bool, start: Option<NaiveTime>, end: Option<NaiveTime>) -> Self {
        match (is_full_day, start, end) {
            (false, Some(start), Some(end)) => TimeWindow::Partial { start, end },
            _ => TimeWindow::FullDay,
        }
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        match (self, other) {
            (
                TimeWindow::Partial { start, end },
                TimeWindow::Partial {
                    start: other_start,
                    end: other_end,
                },
            ) => start < other_end && other_start < end,
            _ => true,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TimeWindow::FullDay => "full day".to_string(),
            TimeWindow::Partial { start, end } => {
                format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Work,
    HotlineSupport,
    Vacation,
    SickLeave,
    Training,
    BusinessTrip,
    Other,
}

impl ActivityType {
    pub const fn label(self) -> &'static str {
        match self {
            ActivityType::Work => "work",
            ActivityType::HotlineSupport => "hotline_support",
            ActivityType::Vacation => "vacation",
            ActivityType::SickLeave => "sick_leave",
            ActivityType::Training => "training",
            ActivityType::BusinessTrip => "business_trip",
            ActivityType::Other => "other",
        }
    }

    /// Collapse used whenever only availability may be disclosed.
    pub const fn availability(self) -> AvailabilityStatus {
        match self {
            ActivityType::Work | ActivityType::HotlineSupport => AvailabilityStatus::Available,
            _ => AvailabilityStatus::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    Unavailable,
}

impl AvailabilityStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AvailabilityStatus::Available => "available",
            AvailabilityStatus::Unavailable => "unavailable",
        }
    }
}

/// Committed schedule entry for one user and day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub user_id: UserId,
    pub team_id: TeamId,
    pub date: NaiveDate,
    pub activity_type: ActivityType,
    pub availability_status: AvailabilityStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ShiftRecord {
    pub fn vacation_for(request: &VacationRequest) -> Self {
        let mut note = format!("Approved vacation ({})", request.window().describe());
        if let Some(requester_note) = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            note.push_str(": ");
            note.push_str(requester_note);
        }

        Self {
            user_id: request.user_id.clone(),
            team_id: request.team_id.clone(),
            date: request.requested_date,
            activity_type: ActivityType::Vacation,
            availability_status: AvailabilityStatus::Unavailable,
            notes: Some(note),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Warning,
    Critical,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Warning => "warning",
            RiskLevel::Critical => "critical",
        }
    }

    /// `critical` below requirement, `warning` below one and a half times it.
    pub const fn classify(available: u32, required_capacity: u32) -> Self {
        if required_capacity == 0 {
            return RiskLevel::Safe;
        }
        if available < required_capacity {
            RiskLevel::Critical
        } else if (available as u64) * 2 < (required_capacity as u64) * 3 {
            RiskLevel::Warning
        } else {
            RiskLevel::Safe
        }
    }
}

/// Derived staffing snapshot for one team on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCapacity {
    pub date: NaiveDate,
    pub team_id: TeamId,
    pub total_members: u32,
    pub on_leave: u32,
    pub available: u32,
    pub required_capacity: u32,
    pub coverage_percentage: u32,
    pub risk_level: RiskLevel,
}

impl DayCapacity {
    pub fn new(
        team_id: TeamId,
        date: NaiveDate,
        total_members: u32,
        on_leave: u32,
        required_capacity: u32,
    ) -> Self {
        let on_leave = on_leave.min(total_members);
        let available = total_members - on_leave;
        Self {
            date,
            team_id,
            total_members,
            on_leave,
            available,
            required_capacity,
            coverage_percentage: coverage_percentage(available, required_capacity),
            risk_level: RiskLevel::classify(available, required_capacity),
        }
    }

    /// Same team-day with `available` reduced by `count` people.
    pub fn with_additional_leave(&self, count: u32) -> Self {
        Self::new(
            self.team_id.clone(),
            self.date,
            self.total_members,
            self.on_leave.saturating_add(count),
            self.required_capacity,
        )
    }

    pub fn key(&self) -> (TeamId, NaiveDate) {
        (self.team_id.clone(), self.date)
    }
}

pub fn coverage_percentage(available: u32, required_capacity: u32) -> u32 {
    if required_capacity == 0 {
        return 100;
    }
    ((available as f64 / required_capacity as f64) * 100.0).round() as u32
}
