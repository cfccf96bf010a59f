use dayoff::workflows::scheduling::{
    EmployeeId, EmployeeRef, InMemoryConfigRepository, InMemoryEmployeeDirectory,
    InMemoryScheduleRepository, InMemorySessionRepository, NotificationSink, Period, Position,
    SchedulingStores, StoreId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn staff(id: &str, name: &str, position: Position, store: &str) -> EmployeeRef {
    EmployeeRef {
        id: EmployeeId(id.to_string()),
        name: name.to_string(),
        position,
        store: StoreId(store.to_string()),
        active: true,
    }
}

/// Seed roster for the development server and the CLI demo.
pub(crate) fn demo_roster() -> Vec<EmployeeRef> {
    vec![
        staff("e-001", "Aiko Tanaka", Position::Manager, "shibuya"),
        staff("e-002", "Ben Okafor", Position::Regular, "ikebukuro"),
        staff("e-003", "Chika Mori", Position::Regular, "ginza"),
        staff("e-004", "Dai Nguyen", Position::PartTime, "ginza"),
        staff("e-005", "Emi Sato", Position::Standby, "shinjuku"),
        staff("e-006", "Fumi Ito", Position::Standby, "ikebukuro"),
        staff("e-007", "Goro Abe", Position::Regular, "shinjuku"),
    ]
}

/// In-process storage for every collaborator, sharing one notifier.
pub(crate) fn in_memory_stores(
    roster: Vec<EmployeeRef>,
    notifier: Arc<dyn NotificationSink>,
) -> SchedulingStores {
    SchedulingStores {
        employees: Arc::new(InMemoryEmployeeDirectory::with_employees(roster)),
        schedules: Arc::new(InMemoryScheduleRepository::default()),
        configs: Arc::new(InMemoryConfigRepository::default()),
        sessions: Arc::new(InMemorySessionRepository::default()),
        notifier,
    }
}

/// Parse `YYYY-MM` into a validated period.
pub(crate) fn parse_period(raw: &str) -> Result<Period, String> {
    let (year, month) = raw
        .trim()
        .split_once('-')
        .ok_or_else(|| format!("'{raw}' is not in YYYY-MM form"))?;
    let year = year
        .parse::<i32>()
        .map_err(|err| format!("invalid year in '{raw}' ({err})"))?;
    let month = month
        .parse::<u32>()
        .map_err(|err| format!("invalid month in '{raw}' ({err})"))?;
    Period::new(year, month).map_err(|err| err.to_string())
}
