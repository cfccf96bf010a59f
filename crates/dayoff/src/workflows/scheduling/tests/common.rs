use std::collections::BTreeSet;
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::SchedulingDefaults;
use crate::workflows::scheduling::clock::{Clock, ManualClock};
use crate::workflows::scheduling::config_store::ScheduleConfigUpdate;
use crate::workflows::scheduling::domain::{
    EmployeeId, EmployeeRef, Period, Position, Schedule, ScheduleStatus, StoreId,
};
use crate::workflows::scheduling::memory::{
    InMemoryConfigRepository, InMemoryEmployeeDirectory, InMemoryScheduleRepository,
    InMemorySessionRepository, RecordingNotificationSink,
};
use crate::workflows::scheduling::repository::{
    RepositoryError, ScheduleRepository,
};
use crate::workflows::scheduling::service::{
    DayOffSchedulingService, SchedulingStores, SubmissionRequest,
};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn august() -> Period {
    Period::new(2025, 8).expect("valid period")
}

/// Inside the default August window, which runs through July.
pub(super) fn july_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 20, 9, 0, 0).unwrap()
}

pub(super) fn id(raw: &str) -> EmployeeId {
    EmployeeId(raw.to_string())
}

fn employee(raw_id: &str, name: &str, position: Position, store: &str) -> EmployeeRef {
    EmployeeRef {
        id: id(raw_id),
        name: name.to_string(),
        position,
        store: StoreId(store.to_string()),
        active: true,
    }
}

/// Aiko, Ben, and Chika are regular staff at three different stores. Dai and
/// Emi are standby at s-01 and s-02; Fumi is part-time at s-03.
pub(super) fn roster() -> Vec<EmployeeRef> {
    vec![
        employee("e-aiko", "Aiko Tanaka", Position::Regular, "s-01"),
        employee("e-ben", "Ben Okafor", Position::Regular, "s-02"),
        employee("e-chika", "Chika Mori", Position::Regular, "s-03"),
        employee("e-dai", "Dai Nguyen", Position::Standby, "s-01"),
        employee("e-emi", "Emi Sato", Position::Standby, "s-02"),
        employee("e-fumi", "Fumi Ito", Position::PartTime, "s-03"),
    ]
}

pub(super) fn request(employee_id: &str, dates: &[&str]) -> SubmissionRequest {
    SubmissionRequest {
        employee_id: id(employee_id),
        period: august(),
        off_dates: dates.iter().map(|value| value.to_string()).collect(),
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<DayOffSchedulingService>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) employees: InMemoryEmployeeDirectory,
    pub(super) schedules: InMemoryScheduleRepository,
    pub(super) configs: InMemoryConfigRepository,
    pub(super) sessions: InMemorySessionRepository,
    pub(super) notifications: RecordingNotificationSink,
}

impl Harness {
    /// Write a committed schedule directly, bypassing the workflow.
    pub(super) fn seed_committed(&self, employee_id: &str, dates: &[NaiveDate]) {
        let employee = roster()
            .into_iter()
            .find(|employee| employee.id.0 == employee_id)
            .expect("employee in roster");
        let mut schedule = Schedule::pending(&employee, august());
        schedule.off_dates = dates.iter().copied().collect::<BTreeSet<_>>();
        schedule.total_off_days = schedule.off_dates.len() as u32;
        schedule.status = ScheduleStatus::Completed;
        self.schedules.upsert(schedule).expect("seed schedule");
    }

    pub(super) fn configure(&self, update: ScheduleConfigUpdate) {
        self.service
            .configs()
            .update(august(), update)
            .expect("config update applies");
    }

    pub(super) fn stored(&self, employee_id: &str) -> Option<Schedule> {
        self.schedules
            .find(&id(employee_id), august())
            .expect("schedule lookup")
    }
}

pub(super) fn build_harness() -> Harness {
    build_harness_with(SchedulingDefaults::default())
}

pub(super) fn build_harness_with(defaults: SchedulingDefaults) -> Harness {
    let clock = Arc::new(ManualClock::new(july_morning()));
    let employees = InMemoryEmployeeDirectory::with_employees(roster());
    let schedules = InMemoryScheduleRepository::default();
    let configs = InMemoryConfigRepository::default();
    let sessions = InMemorySessionRepository::default();
    let notifications = RecordingNotificationSink::default();

    let stores = SchedulingStores {
        employees: Arc::new(employees.clone()),
        schedules: Arc::new(schedules.clone()),
        configs: Arc::new(configs.clone()),
        sessions: Arc::new(sessions.clone()),
        notifier: Arc::new(notifications.clone()),
    };
    let service = DayOffSchedulingService::new(stores, defaults, clock.clone() as Arc<dyn Clock>);

    Harness {
        service: Arc::new(service),
        clock,
        employees,
        schedules,
        configs,
        sessions,
        notifications,
    }
}

/// Reads succeed against an empty store; every write fails.
pub(super) struct ReadOnlyScheduleRepository;

impl ScheduleRepository for ReadOnlyScheduleRepository {
    fn find(
        &self,
        _employee_id: &EmployeeId,
        _period: Period,
    ) -> Result<Option<Schedule>, RepositoryError> {
        Ok(None)
    }

    fn upsert(&self, _schedule: Schedule) -> Result<Schedule, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn list_for_period(&self, _period: Period) -> Result<Vec<Schedule>, RepositoryError> {
        Ok(Vec::new())
    }
}

pub(super) fn build_read_only_harness() -> Harness {
    let harness = build_harness();
    let stores = SchedulingStores {
        employees: Arc::new(harness.employees.clone()),
        schedules: Arc::new(ReadOnlyScheduleRepository),
        configs: Arc::new(harness.configs.clone()),
        sessions: Arc::new(harness.sessions.clone()),
        notifier: Arc::new(harness.notifications.clone()),
    };
    let service = DayOffSchedulingService::new(
        stores,
        SchedulingDefaults::default(),
        harness.clock.clone() as Arc<dyn Clock>,
    );
    Harness {
        service: Arc::new(service),
        ..harness
    }
}

/// Commits land, but the clock jumps past the lease while the write runs.
pub(super) struct SlowScheduleRepository {
    inner: InMemoryScheduleRepository,
    clock: Arc<ManualClock>,
    delay: Duration,
}

impl ScheduleRepository for SlowScheduleRepository {
    fn find(
        &self,
        employee_id: &EmployeeId,
        period: Period,
    ) -> Result<Option<Schedule>, RepositoryError> {
        self.inner.find(employee_id, period)
    }

    fn upsert(&self, schedule: Schedule) -> Result<Schedule, RepositoryError> {
        let saved = self.inner.upsert(schedule)?;
        self.clock.advance(self.delay);
        Ok(saved)
    }

    fn list_for_period(&self, period: Period) -> Result<Vec<Schedule>, RepositoryError> {
        self.inner.list_for_period(period)
    }
}

pub(super) fn build_slow_write_harness(delay: Duration) -> Harness {
    let harness = build_harness();
    let stores = SchedulingStores {
        employees: Arc::new(harness.employees.clone()),
        schedules: Arc::new(SlowScheduleRepository {
            inner: harness.schedules.clone(),
            clock: harness.clock.clone(),
            delay,
        }),
        configs: Arc::new(harness.configs.clone()),
        sessions: Arc::new(harness.sessions.clone()),
        notifier: Arc::new(harness.notifications.clone()),
    };
    let service = DayOffSchedulingService::new(
        stores,
        SchedulingDefaults::default(),
        harness.clock.clone() as Arc<dyn Clock>,
    );
    Harness {
        service: Arc::new(service),
        ..harness
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
