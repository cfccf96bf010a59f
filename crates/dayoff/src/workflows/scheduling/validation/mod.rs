mod rules;
mod snapshot;

pub use rules::{DateCount, RuleContext, RuleDetails, RuleKind, RuleOutcome};
pub use snapshot::AggregateSnapshot;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::config_store::{ConfigStore, ConfigStoreError};
use super::domain::{EmployeeId, EmployeeRef, Period, ScheduleConfig};
use super::repository::{EmployeeDirectory, RepositoryError, ScheduleRepository};

/// Complete verdict over every configured rule. Never fail-fast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub violations: Vec<String>,
    #[serde(default)]
    pub notices: Vec<String>,
    pub per_rule: BTreeMap<RuleKind, RuleOutcome>,
}

impl ValidationReport {
    pub fn outcome(&self, rule: RuleKind) -> Option<&RuleOutcome> {
        self.per_rule.get(&rule)
    }

    pub fn summary(&self) -> String {
        if self.is_valid {
            "all scheduling rules satisfied".to_string()
        } else {
            format!("rejected: {}", self.violations.join("; "))
        }
    }
}

/// Precondition failures; distinct from a failing rule.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("employee {0} not found")]
    UnknownEmployee(EmployeeId),
    #[error("'{0}' is not a YYYY-MM-DD date")]
    InvalidDate(String),
    #[error("{date} is outside the {period} scheduling period")]
    DateOutsidePeriod { date: NaiveDate, period: Period },
    #[error(transparent)]
    Config(#[from] ConfigStoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Parse requested dates, collapsing duplicates.
pub fn parse_candidates<S: AsRef<str>>(
    period: Period,
    raw: &[S],
) -> Result<BTreeSet<NaiveDate>, ValidationError> {
    let mut dates = BTreeSet::new();
    for value in raw {
        let value = value.as_ref().trim();
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidDate(value.to_string()))?;
        if !period.contains(date) {
            return Err(ValidationError::DateOutsidePeriod { date, period });
        }
        dates.insert(date);
    }
    Ok(dates)
}

/// Run the given rules against a prepared context.
pub fn evaluate_rules(rules: &[RuleKind], ctx: &RuleContext<'_>) -> ValidationReport {
    let mut per_rule = BTreeMap::new();
    let mut violations = Vec::new();
    let mut notices = Vec::new();

    for rule in rules {
        let outcome = rule.evaluate(ctx);
        if !outcome.valid {
            violations.push(format!("{}: {}", outcome.rule.label(), outcome.message));
        }
        notices.extend(outcome.notices.iter().cloned());
        per_rule.insert(outcome.rule, outcome);
    }

    ValidationReport {
        is_valid: violations.is_empty(),
        violations,
        notices,
        per_rule,
    }
}

/// Reads the employee, the active config, and one aggregate snapshot, then
/// evaluates every rule. Read-only.
pub struct ValidationEngine {
    employees: Arc<dyn EmployeeDirectory>,
    schedules: Arc<dyn ScheduleRepository>,
    configs: Arc<ConfigStore>,
    rules: Vec<RuleKind>,
}

impl ValidationEngine {
    pub fn new(
        employees: Arc<dyn EmployeeDirectory>,
        schedules: Arc<dyn ScheduleRepository>,
        configs: Arc<ConfigStore>,
    ) -> Self {
        Self::with_rules(employees, schedules, configs, RuleKind::standard())
    }

    pub fn with_rules(
        employees: Arc<dyn EmployeeDirectory>,
        schedules: Arc<dyn ScheduleRepository>,
        configs: Arc<ConfigStore>,
        rules: Vec<RuleKind>,
    ) -> Self {
        Self {
            employees,
            schedules,
            configs,
            rules,
        }
    }

    pub fn rules(&self) -> &[RuleKind] {
        &self.rules
    }

    pub fn validate_all_rules(
        &self,
        employee_id: &EmployeeId,
        period: Period,
        candidates: &BTreeSet<NaiveDate>,
    ) -> Result<ValidationReport, ValidationError> {
        let employee = self
            .employees
            .get(employee_id)?
            .ok_or_else(|| ValidationError::UnknownEmployee(employee_id.clone()))?;
        let config = self.configs.get_or_create(period)?;
        self.validate_for(&employee, &config, period, candidates)
    }

    /// Variant for callers that already resolved the employee and config.
    pub fn validate_for(
        &self,
        employee: &EmployeeRef,
        config: &ScheduleConfig,
        period: Period,
        candidates: &BTreeSet<NaiveDate>,
    ) -> Result<ValidationReport, ValidationError> {
        let schedules = self.schedules.list_for_period(period)?;
        let snapshot = AggregateSnapshot::from_schedules(&schedules, &employee.id);

        let ctx = RuleContext {
            employee,
            period,
            candidates,
            config,
            snapshot: &snapshot,
        };
        Ok(evaluate_rules(&self.rules, &ctx))
    }
}
