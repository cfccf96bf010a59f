use crate::infra::{demo_roster, in_memory_stores, parse_period};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use clap::Args;
use dayoff::config::SchedulingDefaults;
use dayoff::error::AppError;
use dayoff::workflows::scheduling::{
    Clock, DayOffSchedulingService, EmployeeId, ManualClock, Notification, Period,
    RecordingNotificationSink, ScheduleConfigUpdate, SubmissionError, SubmissionOutcome,
    SubmissionRequest,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Period to schedule (YYYY-MM). Defaults to next month.
    #[arg(long, value_parser = parse_period)]
    pub(crate) period: Option<Period>,
}

fn day(period: Period, day: i64) -> NaiveDate {
    period.first_day() + Duration::days(day - 1)
}

fn request(employee: &str, period: Period, days: &[i64]) -> SubmissionRequest {
    SubmissionRequest {
        employee_id: EmployeeId(employee.to_string()),
        period,
        off_dates: days
            .iter()
            .map(|offset| day(period, *offset).to_string())
            .collect(),
    }
}

fn print_outcome(label: &str, result: Result<SubmissionOutcome, SubmissionError>) {
    match result {
        Ok(SubmissionOutcome::Accepted { schedule, report, .. }) => {
            let dates: Vec<String> = schedule.off_dates.iter().map(|d| d.to_string()).collect();
            println!("- {label}: accepted [{}]", dates.join(", "));
            for notice in &report.notices {
                println!("    note: {notice}");
            }
        }
        Ok(SubmissionOutcome::Rejected { report, .. }) => {
            println!("- {label}: rejected");
            for violation in &report.violations {
                println!("    {violation}");
            }
        }
        Err(err) => println!("- {label}: refused ({err})"),
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let period = args
        .period
        .unwrap_or_else(|| Period::of(Utc::now().date_naive()).next());

    // Mid-window, so every scenario runs while submissions are open.
    let start = (period.previous().first_day() + Duration::days(14))
        .and_time(NaiveTime::MIN)
        .and_utc()
        + Duration::hours(9);
    let clock = Arc::new(ManualClock::new(start));
    let notifications = RecordingNotificationSink::default();
    let service = DayOffSchedulingService::new(
        in_memory_stores(demo_roster(), Arc::new(notifications.clone())),
        SchedulingDefaults::default(),
        clock.clone() as Arc<dyn Clock>,
    );

    println!("Day-off scheduling demo for {period}");
    let window = service
        .sessions()
        .is_system_open(period)
        .map_err(SubmissionError::from)?;
    match window.reason() {
        Some(reason) => println!("Submission window: {reason}"),
        None => println!("Submission window: open"),
    }

    println!("\nLock contention");
    let aiko = EmployeeId("e-001".to_string());
    let session = service.start_session(&aiko, period)?;
    println!(
        "- Aiko holds {} for {} seconds",
        session.id,
        session.remaining_seconds(clock.now())
    );
    clock.advance(Duration::seconds(95));
    print_outcome(
        "Ben while Aiko is scheduling",
        service.submit(request("e-002", period, &[4, 5])),
    );
    print_outcome(
        "Aiko inside her session",
        service.submit_in_session(&session.id, request("e-001", period, &[4, 10])),
    );
    print_outcome(
        "Ben retrying",
        service.submit(request("e-002", period, &[4, 5])),
    );

    println!("\nQuota rules");
    service
        .configs()
        .update(
            period,
            ScheduleConfigUpdate {
                max_off_days_per_day: Some(2),
                forbidden_dates: Some([day(period, 20)].into_iter().collect()),
                holiday_dates: Some([day(period, 11)].into_iter().collect()),
                ..ScheduleConfigUpdate::default()
            },
        )
        .map_err(SubmissionError::from)?;
    print_outcome(
        "Chika on an already busy day",
        service.submit(request("e-003", period, &[4])),
    );
    print_outcome(
        "Chika asking for nine days",
        service.submit(request("e-003", period, &[5, 6, 7, 12, 13, 14, 19, 21, 26])),
    );
    print_outcome(
        "Emi (standby)",
        service.submit(request("e-005", period, &[18])),
    );
    print_outcome(
        "Fumi (standby) on the same day",
        service.submit(request("e-006", period, &[18])),
    );
    print_outcome(
        "Goro on a blackout date",
        service.submit(request("e-007", period, &[20])),
    );
    print_outcome(
        "Goro on a holiday",
        service.submit(request("e-007", period, &[11])),
    );

    println!("\nLease expiry");
    let dai = EmployeeId("e-004".to_string());
    let abandoned = service.start_session(&dai, period)?;
    clock.advance(Duration::minutes(11));
    let status = service
        .sessions()
        .is_system_busy()
        .map_err(SubmissionError::from)?;
    let view = service
        .sessions()
        .view(&abandoned.id)
        .map_err(SubmissionError::from)?;
    println!(
        "- Dai walked away; after 11 minutes the system is {} and {} is {}",
        if status.busy { "busy" } else { "free" },
        view.session.id,
        view.session.status.label()
    );

    let reminder = service.remind_pending(period)?;
    println!(
        "\n{} of {} staff still have no committed schedule",
        reminder.pending.len(),
        demo_roster().len()
    );

    println!("\nNotifications");
    for event in notifications.events() {
        match event {
            Notification::Completed(summary) => println!(
                "- completed: {} ({} days, {} weekend)",
                summary.employee_name, summary.total_off_days, summary.weekend_off_days
            ),
            Notification::Conflict(notice) => println!(
                "- conflict: {} turned away while {} held the lock ({}s left)",
                notice.requester_name, notice.holder_name, notice.remaining_seconds
            ),
            Notification::DeadlineApproaching(reminder) => println!(
                "- reminder: {} pending before {}",
                reminder.pending.len(),
                reminder.closes_at
            ),
        }
    }

    Ok(())
}
