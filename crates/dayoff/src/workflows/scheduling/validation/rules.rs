use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::super::domain::{is_weekend, EmployeeRef, Period, Position, ScheduleConfig, StoreId};
use super::snapshot::AggregateSnapshot;

/// Everything a rule may look at. Rules never touch storage.
pub struct RuleContext<'a> {
    pub employee: &'a EmployeeRef,
    pub period: Period,
    pub candidates: &'a BTreeSet<NaiveDate>,
    pub config: &'a ScheduleConfig,
    pub snapshot: &'a AggregateSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    MonthlyQuota,
    DailyQuota,
    WeekendQuota,
    StoreQuota,
    PositionQuota,
    CalendarExceptions,
}

impl RuleKind {
    pub fn code(&self) -> &'static str {
        match self {
            RuleKind::MonthlyQuota => "rule1",
            RuleKind::DailyQuota => "rule2",
            RuleKind::WeekendQuota => "rule3",
            RuleKind::StoreQuota => "rule4",
            RuleKind::PositionQuota => "rule5",
            RuleKind::CalendarExceptions => "rule6",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::MonthlyQuota => "monthly quota",
            RuleKind::DailyQuota => "daily quota",
            RuleKind::WeekendQuota => "weekend quota",
            RuleKind::StoreQuota => "store quota",
            RuleKind::PositionQuota => "position quota",
            RuleKind::CalendarExceptions => "calendar exceptions",
        }
    }
}

/// Headcount on one date, including the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCount {
    pub date: NaiveDate,
    pub current: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleDetails {
    Quota {
        current: u32,
        max: u32,
        dates: Vec<NaiveDate>,
    },
    PerDate {
        max: u32,
        exceeded: Vec<DateCount>,
    },
    Unconstrained {
        position: Position,
    },
    Calendar {
        forbidden: Vec<NaiveDate>,
        holidays: Vec<NaiveDate>,
    },
}

/// One rule's verdict with enough detail for the requester to fix the selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule: RuleKind,
    pub valid: bool,
    pub message: String,
    pub details: RuleDetails,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}

impl RuleKind {
    /// Every rule, in report order.
    pub fn standard() -> Vec<RuleKind> {
        vec![
            RuleKind::MonthlyQuota,
            RuleKind::DailyQuota,
            RuleKind::WeekendQuota,
            RuleKind::StoreQuota,
            RuleKind::PositionQuota,
            RuleKind::CalendarExceptions,
        ]
    }

    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        match self {
            RuleKind::MonthlyQuota => monthly_quota(ctx),
            RuleKind::DailyQuota => daily_quota(ctx),
            RuleKind::WeekendQuota => weekend_quota(ctx),
            RuleKind::StoreQuota => store_quota(ctx),
            RuleKind::PositionQuota => position_quota(ctx),
            RuleKind::CalendarExceptions => calendar_exceptions(ctx),
        }
    }
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|date| date.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_exceeded(exceeded: &[DateCount]) -> String {
    exceeded
        .iter()
        .map(|count| format!("{} ({}/{})", count.date, count.current, count.max))
        .collect::<Vec<_>>()
        .join(", ")
}

fn monthly_quota(ctx: &RuleContext<'_>) -> RuleOutcome {
    let current = ctx.candidates.len() as u32;
    let max = ctx.config.max_off_days_per_person;
    let valid = current <= max;
    let message = if valid {
        format!("{current}/{max} off days requested")
    } else {
        format!("monthly off days {current}/{max} exceed the per-person limit")
    };

    RuleOutcome {
        rule: RuleKind::MonthlyQuota,
        valid,
        message,
        details: RuleDetails::Quota {
            current,
            max,
            dates: Vec::new(),
        },
        notices: Vec::new(),
    }
}

/// Shared shape of rules 2, 4, and 5: `others_off(date) + 1 <= max` for every candidate.
fn per_date_quota(
    ctx: &RuleContext<'_>,
    rule: RuleKind,
    max: u32,
    scope: &str,
    others_off: impl Fn(NaiveDate) -> u32,
) -> RuleOutcome {
    let exceeded: Vec<DateCount> = ctx
        .candidates
        .iter()
        .map(|date| DateCount {
            date: *date,
            current: others_off(*date) + 1,
            max,
        })
        .filter(|count| count.current > max)
        .collect();

    let valid = exceeded.is_empty();
    let message = if valid {
        format!("{scope} limit of {max} respected on every requested date")
    } else {
        format!("{scope} limit exceeded on {}", describe_exceeded(&exceeded))
    };

    RuleOutcome {
        rule,
        valid,
        message,
        details: RuleDetails::PerDate { max, exceeded },
        notices: Vec::new(),
    }
}

fn daily_quota(ctx: &RuleContext<'_>) -> RuleOutcome {
    per_date_quota(
        ctx,
        RuleKind::DailyQuota,
        ctx.config.max_off_days_per_day,
        "daily",
        |date| ctx.snapshot.off_on(date),
    )
}

fn weekend_quota(ctx: &RuleContext<'_>) -> RuleOutcome {
    let dates: Vec<NaiveDate> = ctx
        .candidates
        .iter()
        .copied()
        .filter(|date| is_weekend(*date))
        .collect();
    let current = dates.len() as u32;
    let max = ctx.config.max_weekend_off_days;
    let valid = current <= max;
    let message = if valid {
        format!("{current}/{max} weekend off days requested")
    } else {
        format!(
            "weekend off days {current}/{max} exceed the limit ({})",
            join_dates(&dates)
        )
    };

    RuleOutcome {
        rule: RuleKind::WeekendQuota,
        valid,
        message,
        details: RuleDetails::Quota {
            current,
            max,
            dates,
        },
        notices: Vec::new(),
    }
}

fn store_quota(ctx: &RuleContext<'_>) -> RuleOutcome {
    let store: &StoreId = &ctx.employee.store;
    per_date_quota(
        ctx,
        RuleKind::StoreQuota,
        ctx.config.max_store_off_days_per_day,
        &format!("store {store}"),
        |date| ctx.snapshot.store_off_on(store, date),
    )
}

fn position_quota(ctx: &RuleContext<'_>) -> RuleOutcome {
    let position = ctx.employee.position;
    match ctx.config.position_cap(position) {
        Some(max) => per_date_quota(
            ctx,
            RuleKind::PositionQuota,
            max,
            position.label(),
            |date| ctx.snapshot.position_off_on(position, date),
        ),
        None => RuleOutcome {
            rule: RuleKind::PositionQuota,
            valid: true,
            message: format!("{} position has no per-day cap", position.label()),
            details: RuleDetails::Unconstrained { position },
            notices: Vec::new(),
        },
    }
}

fn calendar_exceptions(ctx: &RuleContext<'_>) -> RuleOutcome {
    let store = &ctx.employee.store;
    let forbidden: Vec<NaiveDate> = ctx
        .candidates
        .iter()
        .copied()
        .filter(|date| ctx.config.is_forbidden(*date, store))
        .collect();
    let holidays: Vec<NaiveDate> = ctx
        .candidates
        .iter()
        .copied()
        .filter(|date| ctx.config.is_holiday(*date, store))
        .collect();

    let valid = forbidden.is_empty();
    let message = if valid {
        "no forbidden dates requested".to_string()
    } else {
        format!("off days are not permitted on {}", join_dates(&forbidden))
    };
    let notices = holidays
        .iter()
        .map(|date| format!("{date} is a holiday"))
        .collect();

    RuleOutcome {
        rule: RuleKind::CalendarExceptions,
        valid,
        message,
        details: RuleDetails::Calendar {
            forbidden,
            holidays,
        },
        notices,
    }
}
