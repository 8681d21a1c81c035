//! Vacation request lifecycle: submit, edit, withdraw, approve and reject.
//!
//! Requests move `pending → approved | rejected`. Approval reconciles the requester's shift
//! record for the day inside one compensated write; notifications are sent after commit and
//! their failures are only logged.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    check_range, InvalidRequest, NotificationEvent, NotificationKind, RequestStatusView, VacationRequestGroup,
    VacationSubmission,
};
pub use repository::{
    NotificationError, Notifier, PlanningStore, RepositoryError, RequestQuery, ShiftQuery,
};
pub use router::{actor_from_headers, vacation_router, ROLES_HEADER, USER_HEADER};
pub use service::{VacationRequestService, VacationServiceError};
