//! Exclusive scheduling lease.
//!
//! One session may be `Active` across the whole system. Every submission,
//! for any period, must hold it while reading aggregates and writing its
//! schedule. Leases renew on heartbeat and lapse lazily: whichever call next
//! observes an overdue lease moves it to `Expired`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::clock::Clock;
use super::config_store::{ConfigStore, ConfigStoreError};
use super::domain::{EmployeeId, Period, ScheduleSession, SessionId, SessionStatus};
use super::repository::{AcquireOutcome, RepositoryError, SessionRepository};

pub const LEASE_EXPIRED_REASON: &str = "lease expired";

/// Where `now` falls relative to a period's submission window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WindowStatus {
    Open { closes_at: DateTime<Utc> },
    NotYetOpen { opens_at: DateTime<Utc> },
    Closed { closed_at: DateTime<Utc> },
    Misconfigured { detail: String },
}

impl WindowStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, WindowStatus::Open { .. })
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            WindowStatus::Open { .. } => None,
            WindowStatus::NotYetOpen { opens_at } => {
                Some(format!("submissions open at {opens_at}"))
            }
            WindowStatus::Closed { closed_at } => {
                Some(format!("submissions closed at {closed_at}"))
            }
            WindowStatus::Misconfigured { detail } => {
                Some(format!("submission window misconfigured: {detail}"))
            }
        }
    }
}

/// Who holds the lease and for how much longer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHolder {
    pub session_id: SessionId,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub period: Period,
    pub remaining_seconds: i64,
}

impl SessionHolder {
    fn of(session: &ScheduleSession, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session.id.clone(),
            employee_id: session.employee_id.clone(),
            employee_name: session.employee_name.clone(),
            period: session.period,
            remaining_seconds: session.remaining_seconds(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyStatus {
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<SessionHolder>,
}

/// Session row plus the derived lease countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: ScheduleSession,
    pub remaining_seconds: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("scheduling for {period} is unavailable: {reason}")]
    SystemClosed { period: Period, reason: String },
    #[error(
        "{} is currently scheduling; try again in {} seconds",
        .holder.employee_name,
        .holder.remaining_seconds
    )]
    Busy { holder: SessionHolder },
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("session {0} has expired")]
    Expired(SessionId),
    #[error("session {0} is already completed")]
    AlreadyCompleted(SessionId),
    #[error("session {session_id} is not held by {employee_id}")]
    NotOwner {
        session_id: SessionId,
        employee_id: EmployeeId,
    },
    #[error(transparent)]
    Config(#[from] ConfigStoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct SessionController {
    sessions: Arc<dyn SessionRepository>,
    configs: Arc<ConfigStore>,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
}

impl SessionController {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        configs: Arc<ConfigStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            configs,
            clock,
            sequence: AtomicU64::new(1),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn next_session_id(&self) -> SessionId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        SessionId(format!("session-{id:06}"))
    }

    pub fn is_system_open(&self, period: Period) -> Result<WindowStatus, SessionError> {
        let config = self.configs.get_or_create(period)?;
        let now = self.now();

        let status = match (config.system_open_at, config.system_close_at) {
            (Some(opens_at), Some(closes_at)) if opens_at >= closes_at => {
                WindowStatus::Misconfigured {
                    detail: format!("opens at {opens_at} but closes at {closes_at}"),
                }
            }
            (Some(opens_at), Some(_)) if now < opens_at => WindowStatus::NotYetOpen { opens_at },
            (Some(_), Some(closes_at)) if now > closes_at => WindowStatus::Closed {
                closed_at: closes_at,
            },
            (Some(_), Some(closes_at)) => WindowStatus::Open { closes_at },
            _ => WindowStatus::Misconfigured {
                detail: "open and close times must both be set".to_string(),
            },
        };
        Ok(status)
    }

    /// Expire a lapsed holder, then report whoever still holds the lease.
    pub fn is_system_busy(&self) -> Result<BusyStatus, SessionError> {
        let now = self.now();
        while let Some(active) = self.sessions.active()? {
            if active.is_lapsed(now) {
                self.expire(active, now, LEASE_EXPIRED_REASON)?;
                continue;
            }
            return Ok(BusyStatus {
                busy: true,
                holder: Some(SessionHolder::of(&active, now)),
            });
        }

        Ok(BusyStatus {
            busy: false,
            holder: None,
        })
    }

    pub fn start_session(
        &self,
        employee_id: &EmployeeId,
        employee_name: &str,
        period: Period,
    ) -> Result<ScheduleSession, SessionError> {
        let window = self.is_system_open(period)?;
        if let Some(reason) = window.reason() {
            return Err(SessionError::SystemClosed { period, reason });
        }

        if let Some(holder) = self.is_system_busy()?.holder {
            return Err(SessionError::Busy { holder });
        }

        let config = self.configs.get_or_create(period)?;
        let now = self.now();
        let session = ScheduleSession {
            id: self.next_session_id(),
            employee_id: employee_id.clone(),
            employee_name: employee_name.to_string(),
            period,
            status: SessionStatus::Active,
            start_time: now,
            last_activity: now,
            end_time: None,
            lease_seconds: config.session_time_limit_seconds,
            end_reason: None,
        };

        match self.sessions.try_acquire(session)? {
            AcquireOutcome::Acquired(session) => {
                info!(
                    session = %session.id,
                    employee = %session.employee_id,
                    %period,
                    lease_seconds = session.lease_seconds,
                    "scheduling session started"
                );
                Ok(session)
            }
            AcquireOutcome::Held(holder) => Err(SessionError::Busy {
                holder: SessionHolder::of(&holder, now),
            }),
        }
    }

    /// Heartbeat. Only touches the session row, so it never waits on the holder's work.
    pub fn update_activity(&self, id: &SessionId) -> Result<ScheduleSession, SessionError> {
        let now = self.now();
        let session = self.require_active(id, now)?;

        let mut renewed = session;
        renewed.last_activity = now;
        if !self
            .sessions
            .compare_and_set(renewed.clone(), SessionStatus::Active)?
        {
            return Err(self.terminal_error(id)?);
        }
        Ok(renewed)
    }

    /// Idempotent: persists `Expired` if the lease has lapsed and returns the current row.
    pub fn check_timeout(&self, id: &SessionId) -> Result<ScheduleSession, SessionError> {
        let now = self.now();
        let session = self.fetch(id)?;
        if session.is_active() && session.is_lapsed(now) {
            return self.expire(session, now, LEASE_EXPIRED_REASON);
        }
        Ok(session)
    }

    pub fn view(&self, id: &SessionId) -> Result<SessionView, SessionError> {
        let session = self.check_timeout(id)?;
        let remaining_seconds = if session.is_active() {
            session.remaining_seconds(self.now())
        } else {
            0
        };
        Ok(SessionView {
            session,
            remaining_seconds,
        })
    }

    pub fn complete_session(&self, id: &SessionId) -> Result<ScheduleSession, SessionError> {
        let now = self.now();
        let session = self.require_active(id, now)?;
        let completed = session.completed(now);
        if !self
            .sessions
            .compare_and_set(completed.clone(), SessionStatus::Active)?
        {
            return Err(self.terminal_error(id)?);
        }
        info!(
            session = %completed.id,
            employee = %completed.employee_id,
            "scheduling session completed",
        );
        Ok(completed)
    }

    /// Give the lease back without a committed write. Terminal sessions are returned unchanged.
    pub fn release(&self, id: &SessionId, reason: &str) -> Result<ScheduleSession, SessionError> {
        let session = self.fetch(id)?;
        if !session.is_active() {
            return Ok(session);
        }
        self.expire(session, self.now(), reason)
    }

    /// Administrative override: expire every active session regardless of lease time.
    pub fn force_end_all_sessions(
        &self,
        reason: &str,
    ) -> Result<Vec<ScheduleSession>, SessionError> {
        let now = self.now();
        let mut ended = Vec::new();
        while let Some(active) = self.sessions.active()? {
            let expired = active.clone().expired(now, reason);
            if self
                .sessions
                .compare_and_set(expired.clone(), SessionStatus::Active)?
            {
                warn!(
                    session = %expired.id,
                    employee = %expired.employee_id,
                    reason,
                    "scheduling session force-ended",
                );
                ended.push(expired);
            }
        }
        Ok(ended)
    }

    /// The session must be active, unexpired, and owned by `employee_id`.
    pub fn ensure_held(
        &self,
        id: &SessionId,
        employee_id: &EmployeeId,
    ) -> Result<ScheduleSession, SessionError> {
        let session = self.require_active(id, self.now())?;
        if &session.employee_id != employee_id {
            return Err(SessionError::NotOwner {
                session_id: id.clone(),
                employee_id: employee_id.clone(),
            });
        }
        Ok(session)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<ScheduleSession>, SessionError> {
        Ok(self.sessions.recent(limit)?)
    }

    fn fetch(&self, id: &SessionId) -> Result<ScheduleSession, SessionError> {
        self.sessions
            .fetch(id)?
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    fn require_active(
        &self,
        id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<ScheduleSession, SessionError> {
        let session = self.fetch(id)?;
        match session.status {
            SessionStatus::Completed => Err(SessionError::AlreadyCompleted(id.clone())),
            SessionStatus::Expired => Err(SessionError::Expired(id.clone())),
            SessionStatus::Active if session.is_lapsed(now) => {
                self.expire(session, now, LEASE_EXPIRED_REASON)?;
                Err(SessionError::Expired(id.clone()))
            }
            SessionStatus::Active => Ok(session),
        }
    }

    /// Error describing a session that left `Active` underneath us.
    fn terminal_error(&self, id: &SessionId) -> Result<SessionError, SessionError> {
        let session = self.fetch(id)?;
        Ok(match session.status {
            SessionStatus::Completed => SessionError::AlreadyCompleted(id.clone()),
            SessionStatus::Expired | SessionStatus::Active => SessionError::Expired(id.clone()),
        })
    }

    fn expire(
        &self,
        session: ScheduleSession,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<ScheduleSession, SessionError> {
        let id = session.id.clone();
        let expired = session.expired(now, reason);
        if self
            .sessions
            .compare_and_set(expired.clone(), SessionStatus::Active)?
        {
            info!(
                session = %expired.id,
                employee = %expired.employee_id,
                reason,
                "scheduling session expired",
            );
            return Ok(expired);
        }
        self.fetch(&id)
    }
}
