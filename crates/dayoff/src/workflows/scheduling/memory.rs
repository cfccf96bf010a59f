//! In-process adapters for every storage and notification seam.
//!
//! The development server and the test-suite run against these; production
//! deployments swap them for database-backed implementations.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    EmployeeId, EmployeeRef, Period, Schedule, ScheduleConfig, ScheduleSession, SessionId,
    SessionStatus,
};
use super::repository::{
    AcquireOutcome, CompletionSummary, ConfigRepository, ConflictNotice, DeadlineReminder,
    EmployeeDirectory, NotificationSink, NotifyError, RepositoryError, ScheduleRepository,
    SessionRepository,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store mutex poisoned".to_string()))
}

#[derive(Default, Clone)]
pub struct InMemoryEmployeeDirectory {
    employees: Arc<Mutex<BTreeMap<EmployeeId, EmployeeRef>>>,
}

impl InMemoryEmployeeDirectory {
    pub fn with_employees(employees: impl IntoIterator<Item = EmployeeRef>) -> Self {
        let roster = employees
            .into_iter()
            .map(|employee| (employee.id.clone(), employee))
            .collect();
        Self {
            employees: Arc::new(Mutex::new(roster)),
        }
    }

    pub fn put(&self, employee: EmployeeRef) -> Result<(), RepositoryError> {
        lock(&self.employees)?.insert(employee.id.clone(), employee);
        Ok(())
    }
}

impl EmployeeDirectory for InMemoryEmployeeDirectory {
    fn get(&self, id: &EmployeeId) -> Result<Option<EmployeeRef>, RepositoryError> {
        Ok(lock(&self.employees)?.get(id).cloned())
    }

    fn list_active(&self) -> Result<Vec<EmployeeRef>, RepositoryError> {
        Ok(lock(&self.employees)?
            .values()
            .filter(|employee| employee.active)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryScheduleRepository {
    schedules: Arc<Mutex<HashMap<(EmployeeId, Period), Schedule>>>,
}

impl ScheduleRepository for InMemoryScheduleRepository {
    fn find(
        &self,
        employee_id: &EmployeeId,
        period: Period,
    ) -> Result<Option<Schedule>, RepositoryError> {
        Ok(lock(&self.schedules)?
            .get(&(employee_id.clone(), period))
            .cloned())
    }

    fn upsert(&self, schedule: Schedule) -> Result<Schedule, RepositoryError> {
        let mut guard = lock(&self.schedules)?;
        guard.insert(
            (schedule.employee_id.clone(), schedule.period),
            schedule.clone(),
        );
        Ok(schedule)
    }

    fn list_for_period(&self, period: Period) -> Result<Vec<Schedule>, RepositoryError> {
        let guard = lock(&self.schedules)?;
        let mut rows: Vec<Schedule> = guard
            .values()
            .filter(|schedule| schedule.period == period)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        Ok(rows)
    }
}

/// Keeps every version so superseded configs remain inspectable.
#[derive(Default, Clone)]
pub struct InMemoryConfigRepository {
    versions: Arc<Mutex<BTreeMap<Period, Vec<ScheduleConfig>>>>,
}

impl InMemoryConfigRepository {
    pub fn history(&self, period: Period) -> Vec<ScheduleConfig> {
        lock(&self.versions)
            .map(|guard| guard.get(&period).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl ConfigRepository for InMemoryConfigRepository {
    fn fetch_active(&self, period: Period) -> Result<Option<ScheduleConfig>, RepositoryError> {
        Ok(lock(&self.versions)?
            .get(&period)
            .and_then(|versions| versions.iter().rev().find(|config| config.active))
            .cloned())
    }

    fn save(&self, config: ScheduleConfig) -> Result<ScheduleConfig, RepositoryError> {
        let mut guard = lock(&self.versions)?;
        let versions = guard.entry(config.period).or_default();
        if config.active {
            for previous in versions.iter_mut() {
                previous.active = false;
            }
        }
        versions.push(config.clone());
        Ok(config)
    }
}

/// Session rows behind one mutex, which makes acquire and status swaps atomic.
#[derive(Default, Clone)]
pub struct InMemorySessionRepository {
    sessions: Arc<Mutex<Vec<ScheduleSession>>>,
}

impl SessionRepository for InMemorySessionRepository {
    fn try_acquire(&self, session: ScheduleSession) -> Result<AcquireOutcome, RepositoryError> {
        let mut guard = lock(&self.sessions)?;
        if let Some(holder) = guard.iter().find(|existing| existing.is_active()) {
            return Ok(AcquireOutcome::Held(holder.clone()));
        }
        if guard.iter().any(|existing| existing.id == session.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(session.clone());
        Ok(AcquireOutcome::Acquired(session))
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<ScheduleSession>, RepositoryError> {
        Ok(lock(&self.sessions)?
            .iter()
            .find(|session| &session.id == id)
            .cloned())
    }

    fn active(&self) -> Result<Option<ScheduleSession>, RepositoryError> {
        Ok(lock(&self.sessions)?
            .iter()
            .find(|session| session.is_active())
            .cloned())
    }

    fn compare_and_set(
        &self,
        session: ScheduleSession,
        expected: SessionStatus,
    ) -> Result<bool, RepositoryError> {
        let mut guard = lock(&self.sessions)?;
        let stored = guard
            .iter_mut()
            .find(|existing| existing.id == session.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.status != expected {
            return Ok(false);
        }
        *stored = session;
        Ok(true)
    }

    fn recent(&self, limit: usize) -> Result<Vec<ScheduleSession>, RepositoryError> {
        Ok(lock(&self.sessions)?
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Captured notification, for assertions and the demo transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Completed(CompletionSummary),
    Conflict(ConflictNotice),
    DeadlineApproaching(DeadlineReminder),
}

#[derive(Default, Clone)]
pub struct RecordingNotificationSink {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotificationSink {
    pub fn events(&self) -> Vec<Notification> {
        lock(&self.events)
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn record(&self, notification: Notification) -> Result<(), NotifyError> {
        let mut guard = self
            .events
            .lock()
            .map_err(|_| NotifyError::Transport("recording sink poisoned".to_string()))?;
        guard.push(notification);
        Ok(())
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn notify_completed(&self, summary: CompletionSummary) -> Result<(), NotifyError> {
        self.record(Notification::Completed(summary))
    }

    fn notify_conflict(&self, notice: ConflictNotice) -> Result<(), NotifyError> {
        self.record(Notification::Conflict(notice))
    }

    fn notify_deadline_approaching(&self, reminder: DeadlineReminder) -> Result<(), NotifyError> {
        self.record(Notification::DeadlineApproaching(reminder))
    }
}
