use crate::cli::ServeArgs;
use crate::infra::{demo_roster, in_memory_stores, AppState};
use crate::routes::with_scheduling_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use dayoff::config::AppConfig;
use dayoff::error::AppError;
use dayoff::telemetry;
use dayoff::workflows::scheduling::{
    Clock, DayOffSchedulingService, LogNotificationSink, Period, SystemClock,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const REMINDER_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let stores = in_memory_stores(demo_roster(), Arc::new(LogNotificationSink));
    let service = Arc::new(DayOffSchedulingService::new(
        stores,
        config.scheduling.clone(),
        clock,
    ));

    if !args.no_reminders {
        tokio::spawn(reminder_sweep(service.clone()));
    }

    let app = with_scheduling_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "day-off scheduling service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Submissions during a month are for the following one.
async fn reminder_sweep(service: Arc<DayOffSchedulingService>) {
    let mut interval = tokio::time::interval(REMINDER_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let period = Period::of(Utc::now().date_naive()).next();
        match service.remind_pending(period) {
            Ok(outcome) if outcome.notified => {
                info!(%period, pending = outcome.pending.len(), "deadline reminder sent");
            }
            Ok(_) => {}
            Err(err) => warn!(%period, error = %err, "reminder sweep failed"),
        }
    }
}
