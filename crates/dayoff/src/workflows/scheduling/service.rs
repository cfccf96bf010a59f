use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SchedulingDefaults;

use super::clock::Clock;
use super::config_store::{ConfigStore, ConfigStoreError};
use super::domain::{
    EmployeeId, EmployeeRef, Period, PeriodError, Schedule, ScheduleConfig, ScheduleSession,
    ScheduleStatus, SessionId,
};
use super::repository::{
    CompletionSummary, ConfigRepository, ConflictNotice, DeadlineReminder, EmployeeDirectory,
    NotificationSink, RepositoryError, ScheduleRepository, SessionRepository,
};
use super::session::{SessionController, SessionError};
use super::validation::{parse_candidates, ValidationEngine, ValidationError, ValidationReport};

pub const ABORTED_REASON: &str = "submission aborted";
pub const REJECTED_REASON: &str = "released after failed validation";

/// The collaborators the workflow is assembled from.
#[derive(Clone)]
pub struct SchedulingStores {
    pub employees: Arc<dyn EmployeeDirectory>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub configs: Arc<dyn ConfigRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub notifier: Arc<dyn NotificationSink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub employee_id: EmployeeId,
    pub period: Period,
    pub off_dates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Accepted {
        session_id: SessionId,
        schedule: Schedule,
        report: ValidationReport,
    },
    Rejected {
        session_id: SessionId,
        report: ValidationReport,
    },
}

impl SubmissionOutcome {
    pub fn report(&self) -> &ValidationReport {
        match self {
            SubmissionOutcome::Accepted { report, .. }
            | SubmissionOutcome::Rejected { report, .. } => report,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderOutcome {
    pub period: Period,
    pub closes_at: Option<DateTime<Utc>>,
    pub pending: Vec<EmployeeRef>,
    pub notified: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("employee {0} not found")]
    UnknownEmployee(EmployeeId),
    #[error("session {session_id} was opened for {expected}, not {requested}")]
    PeriodMismatch {
        session_id: SessionId,
        expected: Period,
        requested: Period,
    },
    #[error(transparent)]
    InvalidPeriod(#[from] PeriodError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Config(#[from] ConfigStoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

enum Verdict {
    Accepted(Schedule, ValidationReport),
    Rejected(ValidationReport),
}

/// Expires the held session on drop unless it was explicitly closed or kept.
struct SessionLease<'a> {
    controller: &'a SessionController,
    session: ScheduleSession,
    armed: bool,
}

impl<'a> SessionLease<'a> {
    fn new(controller: &'a SessionController, session: ScheduleSession) -> Self {
        Self {
            controller,
            session,
            armed: true,
        }
    }

    fn session(&self) -> &ScheduleSession {
        &self.session
    }

    fn complete(mut self) -> Result<ScheduleSession, SessionError> {
        self.armed = false;
        self.controller.complete_session(&self.session.id)
    }

    fn release(mut self, reason: &str) -> Result<ScheduleSession, SessionError> {
        self.armed = false;
        self.controller.release(&self.session.id, reason)
    }

    fn keep(mut self) -> ScheduleSession {
        self.armed = false;
        self.session.clone()
    }
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = self.controller.release(&self.session.id, ABORTED_REASON) {
            warn!(
                session = %self.session.id,
                error = %err,
                "failed to release session after aborted submission"
            );
        }
    }
}

/// Orchestrates lock acquisition, validation, persistence, and notifications.
pub struct DayOffSchedulingService {
    employees: Arc<dyn EmployeeDirectory>,
    schedules: Arc<dyn ScheduleRepository>,
    notifier: Arc<dyn NotificationSink>,
    configs: Arc<ConfigStore>,
    sessions: Arc<SessionController>,
    engine: Arc<ValidationEngine>,
}

impl DayOffSchedulingService {
    pub fn new(
        stores: SchedulingStores,
        defaults: SchedulingDefaults,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let configs = Arc::new(ConfigStore::new(stores.configs, defaults));
        let sessions = Arc::new(SessionController::new(
            stores.sessions,
            configs.clone(),
            clock,
        ));
        let engine = Arc::new(ValidationEngine::new(
            stores.employees.clone(),
            stores.schedules.clone(),
            configs.clone(),
        ));

        Self {
            employees: stores.employees,
            schedules: stores.schedules,
            notifier: stores.notifier,
            configs,
            sessions,
            engine,
        }
    }

    pub fn sessions(&self) -> &SessionController {
        &self.sessions
    }

    pub fn configs(&self) -> &ConfigStore {
        &self.configs
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    /// One-shot submission: acquire, validate, write or reject, release.
    pub fn submit(
        &self,
        request: SubmissionRequest,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let (employee, config, candidates) = self.prepare(&request)?;
        let session = self.acquire(&employee, request.period)?;
        let lease = SessionLease::new(&self.sessions, session);

        let verdict = self.validate_and_commit(
            &employee,
            &config,
            request.period,
            candidates,
            lease.session(),
        )?;
        match verdict {
            Verdict::Accepted(schedule, report) => {
                Ok(self.finish_accepted(lease, &employee, schedule, report))
            }
            Verdict::Rejected(report) => {
                let session = lease.release(REJECTED_REASON)?;
                Ok(SubmissionOutcome::Rejected {
                    session_id: session.id,
                    report,
                })
            }
        }
    }

    /// Submit while already holding a session from [`Self::start_session`].
    ///
    /// A rejected selection leaves the session open so the employee can correct
    /// it within the remaining lease.
    pub fn submit_in_session(
        &self,
        session_id: &SessionId,
        request: SubmissionRequest,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let (employee, config, candidates) = self.prepare(&request)?;
        let session = self.sessions.ensure_held(session_id, &employee.id)?;
        if session.period != request.period {
            return Err(SubmissionError::PeriodMismatch {
                session_id: session_id.clone(),
                expected: session.period,
                requested: request.period,
            });
        }
        let window = self.sessions.is_system_open(request.period)?;
        if let Some(reason) = window.reason() {
            return Err(SessionError::SystemClosed {
                period: request.period,
                reason,
            }
            .into());
        }
        let lease = SessionLease::new(&self.sessions, session);

        let verdict = self.validate_and_commit(
            &employee,
            &config,
            request.period,
            candidates,
            lease.session(),
        )?;
        match verdict {
            Verdict::Accepted(schedule, report) => {
                Ok(self.finish_accepted(lease, &employee, schedule, report))
            }
            Verdict::Rejected(report) => {
                let session = lease.keep();
                Ok(SubmissionOutcome::Rejected {
                    session_id: session.id,
                    report,
                })
            }
        }
    }

    /// Open an interactive session for the employee and mark their schedule in progress.
    pub fn start_session(
        &self,
        employee_id: &EmployeeId,
        period: Period,
    ) -> Result<ScheduleSession, SubmissionError> {
        let employee = self.employee(employee_id)?;
        self.configs.get_or_create(period)?;
        let session = self.acquire(&employee, period)?;

        let lease = SessionLease::new(&self.sessions, session);
        let mut schedule = self
            .schedules
            .find(&employee.id, period)?
            .unwrap_or_else(|| Schedule::pending(&employee, period));
        if schedule.status != ScheduleStatus::Completed {
            schedule.status = ScheduleStatus::InProgress;
            schedule.updated_at = Some(self.sessions.now());
            self.schedules.upsert(schedule)?;
        }
        Ok(lease.keep())
    }

    /// Dry run outside the lock; the result is advisory only.
    pub fn preview(
        &self,
        request: &SubmissionRequest,
    ) -> Result<ValidationReport, SubmissionError> {
        let (employee, config, candidates) = self.prepare(request)?;
        Ok(self
            .engine
            .validate_for(&employee, &config, request.period, &candidates)?)
    }

    pub fn schedule_for(
        &self,
        employee_id: &EmployeeId,
        period: Period,
    ) -> Result<Option<Schedule>, SubmissionError> {
        Ok(self.schedules.find(employee_id, period)?)
    }

    /// Notify about employees without a committed schedule once the close time is near.
    pub fn remind_pending(&self, period: Period) -> Result<ReminderOutcome, SubmissionError> {
        let config = self.configs.get_or_create(period)?;
        let committed: BTreeSet<EmployeeId> = self
            .schedules
            .list_for_period(period)?
            .into_iter()
            .filter(|schedule| schedule.status == ScheduleStatus::Completed)
            .map(|schedule| schedule.employee_id)
            .collect();
        let pending: Vec<EmployeeRef> = self
            .employees
            .list_active()?
            .into_iter()
            .filter(|employee| !committed.contains(&employee.id))
            .collect();

        let now = self.sessions.now();
        let window = self.configs.defaults().reminder_window();
        let due = config
            .system_close_at
            .filter(|closes_at| now <= *closes_at && *closes_at - now <= window);

        let mut notified = false;
        if let Some(closes_at) = due {
            if !pending.is_empty() {
                let reminder = DeadlineReminder {
                    period,
                    closes_at,
                    pending: pending.clone(),
                };
                match self.notifier.notify_deadline_approaching(reminder) {
                    Ok(()) => notified = true,
                    Err(err) => warn!(%period, error = %err, "deadline reminder failed"),
                }
            }
        }

        Ok(ReminderOutcome {
            period,
            closes_at: config.system_close_at,
            pending,
            notified,
        })
    }

    fn employee(&self, employee_id: &EmployeeId) -> Result<EmployeeRef, SubmissionError> {
        self.employees
            .get(employee_id)?
            .ok_or_else(|| SubmissionError::UnknownEmployee(employee_id.clone()))
    }

    /// Preconditions, all checked before the lock is touched.
    fn prepare(
        &self,
        request: &SubmissionRequest,
    ) -> Result<(EmployeeRef, ScheduleConfig, BTreeSet<NaiveDate>), SubmissionError> {
        let candidates = parse_candidates(request.period, &request.off_dates)?;
        let employee = self.employee(&request.employee_id)?;
        let config = self.configs.get_or_create(request.period)?;
        Ok((employee, config, candidates))
    }

    fn acquire(
        &self,
        employee: &EmployeeRef,
        period: Period,
    ) -> Result<ScheduleSession, SubmissionError> {
        match self.sessions.start_session(&employee.id, &employee.name, period) {
            Ok(session) => Ok(session),
            Err(SessionError::Busy { holder }) => {
                let notice = ConflictNotice {
                    requester_id: employee.id.clone(),
                    requester_name: employee.name.clone(),
                    holder_id: holder.employee_id.clone(),
                    holder_name: holder.employee_name.clone(),
                    period,
                    remaining_seconds: holder.remaining_seconds,
                };
                if let Err(err) = self.notifier.notify_conflict(notice) {
                    warn!(employee = %employee.id, error = %err, "conflict notification failed");
                }
                Err(SessionError::Busy { holder }.into())
            }
            Err(other) => Err(other.into()),
        }
    }

    fn validate_and_commit(
        &self,
        employee: &EmployeeRef,
        config: &ScheduleConfig,
        period: Period,
        candidates: BTreeSet<NaiveDate>,
        session: &ScheduleSession,
    ) -> Result<Verdict, SubmissionError> {
        let report = self
            .engine
            .validate_for(employee, config, period, &candidates)?;
        if !report.is_valid {
            info!(
                employee = %employee.id,
                %period,
                violations = report.violations.len(),
                "day-off submission rejected"
            );
            return Ok(Verdict::Rejected(report));
        }

        self.sessions.ensure_held(&session.id, &employee.id)?;
        let now = self.sessions.now();
        let mut schedule = self
            .schedules
            .find(&employee.id, period)?
            .unwrap_or_else(|| Schedule::pending(employee, period));
        schedule.accept(employee, candidates, report.clone(), now);
        let saved = self.schedules.upsert(schedule)?;
        info!(
            employee = %employee.id,
            %period,
            total = saved.total_off_days,
            weekend = saved.weekend_off_days,
            "day-off schedule committed"
        );
        Ok(Verdict::Accepted(saved, report))
    }

    /// The schedule is already written, so a lease that lapsed since the
    /// write only costs the session row its `Completed` status.
    fn finish_accepted(
        &self,
        lease: SessionLease<'_>,
        employee: &EmployeeRef,
        schedule: Schedule,
        report: ValidationReport,
    ) -> SubmissionOutcome {
        let session_id = lease.session().id.clone();
        if let Err(err) = lease.complete() {
            warn!(
                session = %session_id,
                employee = %employee.id,
                error = %err,
                "schedule committed but session could not be completed"
            );
        }
        self.announce(employee, &schedule);
        SubmissionOutcome::Accepted {
            session_id,
            schedule,
            report,
        }
    }

    fn announce(&self, employee: &EmployeeRef, schedule: &Schedule) {
        let summary = CompletionSummary {
            employee_id: employee.id.clone(),
            employee_name: employee.name.clone(),
            period: schedule.period,
            off_dates: schedule.off_dates.iter().copied().collect(),
            total_off_days: schedule.total_off_days,
            weekend_off_days: schedule.weekend_off_days,
            completed_at: schedule.updated_at.unwrap_or_else(|| self.sessions.now()),
        };
        if let Err(err) = self.notifier.notify_completed(summary) {
            warn!(employee = %employee.id, error = %err, "completion notification failed");
        }
    }
}
