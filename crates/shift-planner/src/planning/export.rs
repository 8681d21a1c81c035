use std::io::Write;

use serde::Serialize;

use super::domain::{DayCapacity, VacationRequest};

#[derive(Debug, Serialize)]
struct CapacityRow<'a> {
    date: String,
    team_id: &'a str,
    total_members: u32,
    on_leave: u32,
    available: u32,
    required_capacity: u32,
    coverage_percentage: u32,
    risk_level: &'static str,
}

#[derive(Debug, Serialize)]
struct RequestRow<'a> {
    request_id: &'a str,
    user_id: &'a str,
    team_id: &'a str,
    date: String,
    window: String,
    status: &'static str,
    group_id: Option<&'a str>,
    approver_id: Option<&'a str>,
    rejection_reason: Option<&'a str>,
}

/// Writes one CSV row per team-day with a header line.
pub fn write_capacity_csv<W: Write>(writer: W, days: &[DayCapacity]) -> Result<(), csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);
    for day in days {
        csv.serialize(CapacityRow {
            date: day.date.format("%Y-%m-%d").to_string(),
            team_id: &day.team_id.0,
            total_members: day.total_members,
            on_leave: day.on_leave,
            available: day.available,
            required_capacity: day.required_capacity,
            coverage_percentage: day.coverage_percentage,
            risk_level: day.risk_level.label(),
        })?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_requests_csv<W: Write>(
    writer: W,
    requests: &[VacationRequest],
) -> Result<(), csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);
    for request in requests {
        csv.serialize(RequestRow {
            request_id: &request.id.0,
            user_id: &request.user_id.0,
            team_id: &request.team_id.0,
            date: request.requested_date.format("%Y-%m-%d").to_string(),
            window: request.window().describe(),
            status: request.status.label(),
            group_id: request.request_group_id.as_ref().map(|id| id.0.as_str()),
            approver_id: request.approver_id.as_ref().map(|id| id.0.as_str()),
            rejection_reason: request.rejection_reason.as_deref(),
        })?;
    }
    csv.flush()?;
    Ok(())
}

/// Capacity CSV rendered into a string, for HTTP responses.
pub fn capacity_csv(days: &[DayCapacity]) -> Result<String, csv::Error> {
    let mut buffer = Vec::new();
    write_capacity_csv(&mut buffer, days)?;
    String::from_utf8(buffer).map_err(|err| csv::Error::from(std::io::Error::other(err)))
}
