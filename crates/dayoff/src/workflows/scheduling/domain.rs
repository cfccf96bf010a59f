use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::validation::ValidationReport;

/// A (year, month) scheduling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "PeriodParts")]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

#[derive(Deserialize)]
struct PeriodParts {
    year: i32,
    month: u32,
}

impl TryFrom<PeriodParts> for Period {
    type Error = PeriodError;

    fn try_from(parts: PeriodParts) -> Result<Self, Self::Error> {
        Period::new(parts.year, parts.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    #[error("month {0} is outside 1..=12")]
    InvalidMonth(u32),
    #[error("year {0} is outside the supported calendar range")]
    InvalidYear(i32),
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(PeriodError::InvalidYear(year));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or_else(|| self.first_day())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Friday, Saturday, and Sunday count toward the weekend quota.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Fri | Weekday::Sat | Weekday::Sun)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub String);

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(pub String);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Employment position. Only part-time and standby carry a per-day position cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Regular,
    PartTime,
    Standby,
    Manager,
    #[serde(other)]
    Other,
}

impl Position {
    pub fn label(&self) -> &'static str {
        match self {
            Position::Regular => "regular",
            Position::PartTime => "part-time",
            Position::Standby => "standby",
            Position::Manager => "manager",
            Position::Other => "other",
        }
    }
}

/// Read-only view of an employee as supplied by the employee directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRef {
    pub id: EmployeeId,
    pub name: String,
    pub position: Position,
    pub store: StoreId,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Tunable limits and calendar exceptions for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub period: Period,
    pub version: u32,
    pub active: bool,
    pub max_off_days_per_person: u32,
    pub max_off_days_per_day: u32,
    pub max_weekend_off_days: u32,
    pub max_store_off_days_per_day: u32,
    pub max_part_time_off_days: u32,
    pub max_standby_off_days: u32,
    pub system_open_at: Option<DateTime<Utc>>,
    pub system_close_at: Option<DateTime<Utc>>,
    pub session_time_limit_seconds: u32,
    #[serde(default)]
    pub holiday_dates: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub forbidden_dates: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub store_holiday_dates: BTreeMap<StoreId, BTreeSet<NaiveDate>>,
    #[serde(default)]
    pub store_forbidden_dates: BTreeMap<StoreId, BTreeSet<NaiveDate>>,
}

impl ScheduleConfig {
    pub fn session_time_limit(&self) -> Duration {
        Duration::seconds(i64::from(self.session_time_limit_seconds))
    }

    /// Per-day cap for constrained positions; `None` means the position is unconstrained.
    pub fn position_cap(&self, position: Position) -> Option<u32> {
        match position {
            Position::PartTime => Some(self.max_part_time_off_days),
            Position::Standby => Some(self.max_standby_off_days),
            Position::Regular | Position::Manager | Position::Other => None,
        }
    }

    pub fn is_forbidden(&self, date: NaiveDate, store: &StoreId) -> bool {
        self.forbidden_dates.contains(&date)
            || self
                .store_forbidden_dates
                .get(store)
                .is_some_and(|dates| dates.contains(&date))
    }

    pub fn is_holiday(&self, date: NaiveDate, store: &StoreId) -> bool {
        self.holiday_dates.contains(&date)
            || self
                .store_holiday_dates
                .get(store)
                .is_some_and(|dates| dates.contains(&date))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    InProgress,
    Completed,
}

impl ScheduleStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::InProgress => "in_progress",
            ScheduleStatus::Completed => "completed",
        }
    }
}

/// One employee's day-off selection for a period.
///
/// `off_dates` only ever holds a set that passed validation, so every row with
/// dates contributes to the period's committed aggregates. Store and position
/// are captured when the row is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub employee_id: EmployeeId,
    pub period: Period,
    pub store: StoreId,
    pub position: Position,
    pub off_dates: BTreeSet<NaiveDate>,
    pub total_off_days: u32,
    pub weekend_off_days: u32,
    pub status: ScheduleStatus,
    pub last_validation: Option<ValidationReport>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn pending(employee: &EmployeeRef, period: Period) -> Self {
        Self {
            employee_id: employee.id.clone(),
            period,
            store: employee.store.clone(),
            position: employee.position,
            off_dates: BTreeSet::new(),
            total_off_days: 0,
            weekend_off_days: 0,
            status: ScheduleStatus::Pending,
            last_validation: None,
            updated_at: None,
        }
    }

    /// Replace the committed dates and recompute the derived counters.
    pub fn accept(
        &mut self,
        employee: &EmployeeRef,
        off_dates: BTreeSet<NaiveDate>,
        report: ValidationReport,
        now: DateTime<Utc>,
    ) {
        self.store = employee.store.clone();
        self.position = employee.position;
        self.total_off_days = off_dates.len() as u32;
        self.weekend_off_days = off_dates.iter().filter(|date| is_weekend(**date)).count() as u32;
        self.off_dates = off_dates;
        self.status = ScheduleStatus::Completed;
        self.last_validation = Some(report);
        self.updated_at = Some(now);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `Active` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
}

impl SessionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
        }
    }
}

/// The exclusive-write lease held by one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSession {
    pub id: SessionId,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub period: Period,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub lease_seconds: u32,
    pub end_reason: Option<String>,
}

impl ScheduleSession {
    pub fn lease(&self) -> Duration {
        Duration::seconds(i64::from(self.lease_seconds))
    }

    /// `lease - (now - last_activity)`, which may be negative once lapsed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.lease() - (now - self.last_activity)
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.remaining(now).num_seconds().max(0)
    }

    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now) <= Duration::zero()
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub(crate) fn completed(mut self, now: DateTime<Utc>) -> Self {
        self.status = SessionStatus::Completed;
        self.end_time = Some(now);
        self.last_activity = now;
        self
    }

    pub(crate) fn expired(mut self, now: DateTime<Utc>, reason: impl Into<String>) -> Self {
        self.status = SessionStatus::Expired;
        self.end_time = Some(now);
        self.end_reason = Some(reason.into());
        self
    }
}
