//! Monthly day-off scheduling.
//!
//! Employees pick their off days for a coming month inside an administrator
//! controlled window. Writes are serialized through a single system-wide
//! session lease, and each selection is checked against the period's quota and
//! calendar rules before it is committed.

pub mod clock;
pub mod config_store;
pub mod domain;
pub mod memory;
pub mod notify;
pub mod repository;
pub mod router;
pub mod service;
pub mod session;
pub mod validation;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config_store::{ConfigStore, ConfigStoreError, ScheduleConfigUpdate};
pub use domain::{
    is_weekend, EmployeeId, EmployeeRef, Period, PeriodError, Position, Schedule, ScheduleConfig,
    ScheduleSession, ScheduleStatus, SessionId, SessionStatus, StoreId,
};
pub use memory::{
    InMemoryConfigRepository, InMemoryEmployeeDirectory, InMemoryScheduleRepository,
    InMemorySessionRepository, Notification, RecordingNotificationSink,
};
pub use notify::LogNotificationSink;
pub use repository::{
    AcquireOutcome, CompletionSummary, ConfigRepository, ConflictNotice, DeadlineReminder,
    EmployeeDirectory, NotificationSink, NotifyError, RepositoryError, ScheduleRepository,
    SessionRepository,
};
pub use router::schedule_router;
pub use service::{
    DayOffSchedulingService, ReminderOutcome, SchedulingStores, SubmissionError,
    SubmissionOutcome, SubmissionRequest,
};
pub use session::{
    BusyStatus, SessionController, SessionError, SessionHolder, SessionView, WindowStatus,
};
pub use validation::{
    parse_candidates, AggregateSnapshot, RuleDetails, RuleKind, RuleOutcome,
    ValidationEngine, ValidationError, ValidationReport,
};
