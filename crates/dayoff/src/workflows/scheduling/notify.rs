use tracing::info;

use super::repository::{
    CompletionSummary, ConflictNotice, DeadlineReminder, NotificationSink, NotifyError,
};

/// Console transport: every notification becomes a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify_completed(&self, summary: CompletionSummary) -> Result<(), NotifyError> {
        let dates: Vec<String> = summary.off_dates.iter().map(|date| date.to_string()).collect();
        info!(
            employee = %summary.employee_id,
            name = %summary.employee_name,
            period = %summary.period,
            total = summary.total_off_days,
            weekend = summary.weekend_off_days,
            dates = %dates.join(","),
            "day-off schedule submitted"
        );
        Ok(())
    }

    fn notify_conflict(&self, notice: ConflictNotice) -> Result<(), NotifyError> {
        info!(
            requester = %notice.requester_id,
            holder = %notice.holder_id,
            holder_name = %notice.holder_name,
            period = %notice.period,
            remaining_seconds = notice.remaining_seconds,
            "submission turned away while another employee holds the scheduling session"
        );
        Ok(())
    }

    fn notify_deadline_approaching(&self, reminder: DeadlineReminder) -> Result<(), NotifyError> {
        let names: Vec<&str> = reminder
            .pending
            .iter()
            .map(|employee| employee.name.as_str())
            .collect();
        info!(
            period = %reminder.period,
            closes_at = %reminder.closes_at,
            pending = reminder.pending.len(),
            names = %names.join(", "),
            "day-off submission deadline approaching"
        );
        Ok(())
    }
}
