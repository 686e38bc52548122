use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::Database;
use crate::error::DomainError;
use crate::models::{CreateTimeLogInput, TimeLog, UpdateTimeLogInput};

use super::Clock;

/// Normalizes time log entries before they are persisted.
///
/// Two rules run on every create and update:
/// - hours left unset (or zero) with both start and end times present are
///   derived from the span, in minutes over 60;
/// - an unset hourly rate falls back to the user's project-membership rate,
///   or 0 when no membership exists.
///
/// The billable amount is never persisted; see [`TimeLog::total_amount`].
#[derive(Clone)]
pub struct TimeLogReconciler {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl TimeLogReconciler {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn log_time(&self, input: CreateTimeLogInput) -> Result<TimeLog> {
        self.db
            .get_project(input.project_id)?
            .ok_or(DomainError::NotFound("Project"))?;
        if let Some(milestone_id) = input.milestone_id {
            self.db
                .get_milestone(milestone_id)?
                .ok_or(DomainError::NotFound("Milestone"))?;
        }

        let hours = resolve_hours(input.hours, input.start_time, input.end_time);
        let hourly_rate = match input.hourly_rate {
            Some(rate) => rate,
            None => self.membership_rate(input.project_id, input.user_id)?,
        };

        let now = self.clock.now();
        let log = TimeLog {
            id: Uuid::new_v4(),
            project_id: input.project_id,
            user_id: input.user_id,
            milestone_id: input.milestone_id,
            description: input.description,
            hours,
            hourly_rate,
            is_billable: input.is_billable,
            start_time: input.start_time,
            end_time: input.end_time,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_time_log(&log)?;
        Ok(log)
    }

    pub fn update(&self, id: Uuid, input: UpdateTimeLogInput) -> Result<Option<TimeLog>> {
        let Some(existing) = self.db.get_time_log(id)? else {
            return Ok(None);
        };

        let start_time = input.start_time.or(existing.start_time);
        let end_time = input.end_time.or(existing.end_time);
        // Run the same resolution as on create: an explicit value wins,
        // otherwise the span is re-derived.
        let hours = resolve_hours(input.hours, start_time, end_time);
        let hours = if hours.is_zero() { existing.hours } else { hours };
        let hourly_rate = match input.hourly_rate {
            Some(rate) => rate,
            None => existing.hourly_rate,
        };

        let log = TimeLog {
            milestone_id: input.milestone_id.or(existing.milestone_id),
            description: input.description.or(existing.description),
            hours,
            hourly_rate,
            is_billable: input.is_billable.unwrap_or(existing.is_billable),
            start_time,
            end_time,
            updated_at: self.clock.now(),
            ..existing
        };

        self.db.update_time_log(&log)?;
        Ok(Some(log))
    }

    /// Record approval exactly once. A second approval attempt is rejected;
    /// who may approve is decided upstream.
    pub fn approve(&self, id: Uuid, approver: Uuid) -> Result<TimeLog> {
        let log = self
            .db
            .get_time_log(id)?
            .ok_or(DomainError::NotFound("Time log"))?;
        if log.approved_at.is_some() {
            return Err(DomainError::AlreadyApproved.into());
        }

        let now = self.clock.now();
        self.db.set_time_log_approval(id, approver, now)?;

        Ok(TimeLog {
            approved_by: Some(approver),
            approved_at: Some(now),
            updated_at: now,
            ..log
        })
    }

    fn membership_rate(&self, project_id: Uuid, user_id: Uuid) -> Result<Decimal> {
        Ok(self
            .db
            .get_member(project_id, user_id)?
            .map(|m| m.hourly_rate)
            .unwrap_or(Decimal::ZERO))
    }
}

/// Derive hours from the start/end span when no explicit, nonzero value is
/// supplied. The span is taken in whole minutes over 60; an end before the
/// start yields negative hours, accepted as-is.
fn resolve_hours(
    explicit: Option<Decimal>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
) -> Decimal {
    match explicit {
        Some(hours) if !hours.is_zero() => hours,
        _ => match (start_time, end_time) {
            (Some(start), Some(end)) => {
                let minutes = (end - start).num_minutes();
                Decimal::from(minutes) / Decimal::from(60)
            }
            _ => explicit.unwrap_or(Decimal::ZERO),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    #[test]
    fn derives_hours_from_span() {
        let hours = resolve_hours(None, Some(at(9, 0)), Some(at(11, 30)));
        assert_eq!(hours, Decimal::new(25, 1)); // 2.5
    }

    #[test]
    fn explicit_hours_win_over_span() {
        let hours = resolve_hours(Some(Decimal::from(4)), Some(at(9, 0)), Some(at(11, 30)));
        assert_eq!(hours, Decimal::from(4));
    }

    #[test]
    fn zero_hours_are_treated_as_unset() {
        let hours = resolve_hours(Some(Decimal::ZERO), Some(at(9, 0)), Some(at(10, 0)));
        assert_eq!(hours, Decimal::from(1));
    }

    #[test]
    fn negative_span_produces_negative_hours() {
        let hours = resolve_hours(None, Some(at(11, 0)), Some(at(10, 0)));
        assert_eq!(hours, Decimal::from(-1));
    }

    #[test]
    fn missing_span_leaves_hours_at_zero() {
        let hours = resolve_hours(None, Some(at(9, 0)), None);
        assert_eq!(hours, Decimal::ZERO);
    }
}
