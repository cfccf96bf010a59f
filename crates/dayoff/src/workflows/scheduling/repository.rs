use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    EmployeeId, EmployeeRef, Period, Position, Schedule, ScheduleConfig, ScheduleSession,
    SessionId, SessionStatus, StoreId,
};

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Employee lookup owned by the HR system; the scheduler only reads it.
pub trait EmployeeDirectory: Send + Sync {
    fn get(&self, id: &EmployeeId) -> Result<Option<EmployeeRef>, RepositoryError>;
    fn list_active(&self) -> Result<Vec<EmployeeRef>, RepositoryError>;
}

/// Persisted day-off schedules plus the aggregate helpers the rules rely on.
pub trait ScheduleRepository: Send + Sync {
    fn find(
        &self,
        employee_id: &EmployeeId,
        period: Period,
    ) -> Result<Option<Schedule>, RepositoryError>;

    fn upsert(&self, schedule: Schedule) -> Result<Schedule, RepositoryError>;

    fn list_for_period(&self, period: Period) -> Result<Vec<Schedule>, RepositoryError>;

    fn count_off_by_day(
        &self,
        period: Period,
        date: NaiveDate,
        exclude: &EmployeeId,
    ) -> Result<u32, RepositoryError> {
        Ok(self
            .list_for_period(period)?
            .iter()
            .filter(|schedule| &schedule.employee_id != exclude)
            .filter(|schedule| schedule.off_dates.contains(&date))
            .count() as u32)
    }

    fn count_off_by_store(
        &self,
        store: &StoreId,
        period: Period,
        date: NaiveDate,
        exclude: &EmployeeId,
    ) -> Result<u32, RepositoryError> {
        Ok(self
            .list_for_period(period)?
            .iter()
            .filter(|schedule| &schedule.employee_id != exclude && &schedule.store == store)
            .filter(|schedule| schedule.off_dates.contains(&date))
            .count() as u32)
    }

    fn count_off_by_position(
        &self,
        position: Position,
        period: Period,
        date: NaiveDate,
        exclude: &EmployeeId,
    ) -> Result<u32, RepositoryError> {
        Ok(self
            .list_for_period(period)?
            .iter()
            .filter(|schedule| &schedule.employee_id != exclude && schedule.position == position)
            .filter(|schedule| schedule.off_dates.contains(&date))
            .count() as u32)
    }
}

/// Versioned config storage. Saving an active record supersedes the previous one.
pub trait ConfigRepository: Send + Sync {
    fn fetch_active(&self, period: Period) -> Result<Option<ScheduleConfig>, RepositoryError>;
    fn save(&self, config: ScheduleConfig) -> Result<ScheduleConfig, RepositoryError>;
}

/// Result of an atomic insert-if-none-active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired(ScheduleSession),
    Held(ScheduleSession),
}

/// Session rows. At most one row may be `Active` at any time; implementations
/// must make `try_acquire` and `compare_and_set` atomic.
pub trait SessionRepository: Send + Sync {
    fn try_acquire(&self, session: ScheduleSession) -> Result<AcquireOutcome, RepositoryError>;

    fn fetch(&self, id: &SessionId) -> Result<Option<ScheduleSession>, RepositoryError>;

    fn active(&self) -> Result<Option<ScheduleSession>, RepositoryError>;

    /// Replace the stored row only if its status still equals `expected`.
    fn compare_and_set(
        &self,
        session: ScheduleSession,
        expected: SessionStatus,
    ) -> Result<bool, RepositoryError>;

    fn recent(&self, limit: usize) -> Result<Vec<ScheduleSession>, RepositoryError>;
}

/// Summary sent when a schedule is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub period: Period,
    pub off_dates: Vec<NaiveDate>,
    pub total_off_days: u32,
    pub weekend_off_days: u32,
    pub completed_at: DateTime<Utc>,
}

/// Raised when a submission is turned away because someone else holds the lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictNotice {
    pub requester_id: EmployeeId,
    pub requester_name: String,
    pub holder_id: EmployeeId,
    pub holder_name: String,
    pub period: Period,
    pub remaining_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineReminder {
    pub period: Period,
    pub closes_at: DateTime<Utc>,
    pub pending: Vec<EmployeeRef>,
}

/// Outbound notification hooks (console, chat, e-mail adapters).
pub trait NotificationSink: Send + Sync {
    fn notify_completed(&self, summary: CompletionSummary) -> Result<(), NotifyError>;
    fn notify_conflict(&self, notice: ConflictNotice) -> Result<(), NotifyError>;
    fn notify_deadline_approaching(&self, reminder: DeadlineReminder) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
