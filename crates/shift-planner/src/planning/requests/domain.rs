use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::planning::calendar::{range_length, requested_days, MAX_RANGE_DAYS};
use crate::planning::domain::{
    GroupId, RequestId, RequestStatus, TeamId, TimeWindow, UserId, VacationRequest,
};

/// Payload for filing or editing time-off; one payload may span several days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacationSubmission {
    pub team_id: TeamId,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_full_day")]
    pub is_full_day: bool,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub selected_approver_id: Option<UserId>,
}

fn default_full_day() -> bool {
    true
}

/// Reasons a submission is refused before touching storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRequest {
    #[error("end date {end} precedes start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
    #[error("partial-day requests need both a start and an end time")]
    MissingTimes,
    #[error("start time {start} must precede end time {end}")]
    EmptyWindow { start: NaiveTime, end: NaiveTime },
    #[error("range {start}..{end} contains no working days")]
    NoWorkingDays { start: NaiveDate, end: NaiveDate },
    #[error("a rejection needs a non-empty reason")]
    MissingRejectionReason,
    #[error("range {start}..{end} exceeds {max_days} days")]
    RangeTooLong {
        start: NaiveDate,
        end: NaiveDate,
        max_days: u32,
    },
}

/// Accepts an inclusive `[start, end]` that is ordered and at most [`MAX_RANGE_DAYS`] long.
pub fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), InvalidRequest> {
    if end < start {
        return Err(InvalidRequest::EndBeforeStart { start, end });
    }
    if range_length(start, end) > MAX_RANGE_DAYS {
        return Err(InvalidRequest::RangeTooLong {
            start,
            end,
            max_days: MAX_RANGE_DAYS,
        });
    }
    Ok(())
}

impl VacationSubmission {
    /// Checks the payload and returns the dates it expands to.
    pub fn validate(&self) -> Result<Vec<NaiveDate>, InvalidRequest> {
        let end = self.end_date.unwrap_or(self.start_date);
        check_range(self.start_date, end)?;

        if !self.is_full_day {
            match (self.start_time, self.end_time) {
                (Some(start), Some(end)) if start >= end => {
                    return Err(InvalidRequest::EmptyWindow { start, end })
                }
                (Some(_), Some(_)) => {}
                _ => return Err(InvalidRequest::MissingTimes),
            }
        }

        let dates = requested_days(self.start_date, end);
        if dates.is_empty() {
            return Err(InvalidRequest::NoWorkingDays {
                start: self.start_date,
                end,
            });
        }
        Ok(dates)
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.is_full_day, self.start_time, self.end_time)
    }

    fn clean_notes(&self) -> Option<String> {
        self.notes
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// Requests created together from one submission.
///
/// Single-day submissions carry no group id; every multi-day group shares one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacationRequestGroup {
    pub group_id: Option<GroupId>,
    pub requests: Vec<VacationRequest>,
}

impl VacationRequestGroup {
    /// Materializes one pending request per date, pairing `request_ids` with `dates` in order.
    pub fn pending(
        user_id: UserId,
        submission: &VacationSubmission,
        dates: &[NaiveDate],
        request_ids: Vec<RequestId>,
        group_id: Option<GroupId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (start_time, end_time) = if submission.is_full_day {
            (None, None)
        } else {
            (submission.start_time, submission.end_time)
        };
        let notes = submission.clean_notes();

        let requests = dates
            .iter()
            .zip(request_ids)
            .map(|(date, id)| VacationRequest {
                id,
                user_id: user_id.clone(),
                team_id: submission.team_id.clone(),
                requested_date: *date,
                is_full_day: submission.is_full_day,
                start_time,
                end_time,
                status: RequestStatus::Pending,
                notes: notes.clone(),
                rejection_reason: None,
                approver_id: None,
                request_group_id: group_id.clone(),
                selected_approver_id: submission.selected_approver_id.clone(),
                created_at,
                decided_at: None,
            })
            .collect();

        Self { group_id, requests }
    }

    pub fn request_ids(&self) -> Vec<RequestId> {
        self.requests.iter().map(|request| request.id.clone()).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.requests
            .iter()
            .map(|request| request.requested_date)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Request,
    Approval,
    Rejection,
}

impl NotificationKind {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationKind::Request => "request",
            NotificationKind::Approval => "approval",
            NotificationKind::Rejection => "rejection",
        }
    }
}

/// Outbound message describing a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub request_id: RequestId,
    pub kind: NotificationKind,
    /// Employee who filed the request.
    pub requester_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
}

impl NotificationEvent {
    pub fn for_request(request: &VacationRequest, kind: NotificationKind) -> Self {
        Self {
            request_id: request.id.clone(),
            kind,
            requester_id: request.user_id.clone(),
            group_id: request.request_group_id.clone(),
        }
    }
}

/// Sanitized lifecycle state returned to callers after a decision.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStatusView {
    pub request_id: RequestId,
    pub status: &'static str,
    pub requested_date: NaiveDate,
    pub window: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl From<&VacationRequest> for RequestStatusView {
    fn from(request: &VacationRequest) -> Self {
        Self {
            request_id: request.id.clone(),
            status: request.status.label(),
            requested_date: request.requested_date,
            window: request.window().describe(),
            approver_id: request.approver_id.clone(),
            rejection_reason: request.rejection_reason.clone(),
        }
    }
}
