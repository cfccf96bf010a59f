use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use super::super::domain::{EmployeeId, Position, Schedule, StoreId};

/// Committed off-day counts for one period, excluding the requester's own row.
///
/// Built from a single read of the period's schedules so every rule sees the
/// same frozen view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSnapshot {
    by_day: BTreeMap<NaiveDate, u32>,
    by_store: HashMap<(StoreId, NaiveDate), u32>,
    by_position: HashMap<(Position, NaiveDate), u32>,
}

impl AggregateSnapshot {
    pub fn from_schedules<'a>(
        schedules: impl IntoIterator<Item = &'a Schedule>,
        exclude: &EmployeeId,
    ) -> Self {
        let mut snapshot = Self::default();
        for schedule in schedules {
            if &schedule.employee_id == exclude {
                continue;
            }
            for date in &schedule.off_dates {
                *snapshot.by_day.entry(*date).or_default() += 1;
                *snapshot
                    .by_store
                    .entry((schedule.store.clone(), *date))
                    .or_default() += 1;
                *snapshot
                    .by_position
                    .entry((schedule.position, *date))
                    .or_default() += 1;
            }
        }
        snapshot
    }

    pub fn off_on(&self, date: NaiveDate) -> u32 {
        self.by_day.get(&date).copied().unwrap_or(0)
    }

    pub fn store_off_on(&self, store: &StoreId, date: NaiveDate) -> u32 {
        self.by_store
            .get(&(store.clone(), date))
            .copied()
            .unwrap_or(0)
    }

    pub fn position_off_on(&self, position: Position, date: NaiveDate) -> u32 {
        self.by_position
            .get(&(position, date))
            .copied()
            .unwrap_or(0)
    }
}
