use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SchedulingDefaults;

use super::domain::{Period, ScheduleConfig, StoreId};
use super::repository::{ConfigRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigStoreError {
    #[error("no schedule config exists for {0}")]
    MissingConfig(Period),
    #[error("submission window must open before it closes")]
    InvalidWindow,
    #[error("session time limit must be at least one second")]
    InvalidSessionLimit,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Administrative patch; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfigUpdate {
    pub max_off_days_per_person: Option<u32>,
    pub max_off_days_per_day: Option<u32>,
    pub max_weekend_off_days: Option<u32>,
    pub max_store_off_days_per_day: Option<u32>,
    pub max_part_time_off_days: Option<u32>,
    pub max_standby_off_days: Option<u32>,
    pub system_open_at: Option<DateTime<Utc>>,
    pub system_close_at: Option<DateTime<Utc>>,
    pub session_time_limit_seconds: Option<u32>,
    pub holiday_dates: Option<BTreeSet<NaiveDate>>,
    pub forbidden_dates: Option<BTreeSet<NaiveDate>>,
    pub store_holiday_dates: Option<BTreeMap<StoreId, BTreeSet<NaiveDate>>>,
    pub store_forbidden_dates: Option<BTreeMap<StoreId, BTreeSet<NaiveDate>>>,
}

impl ScheduleConfigUpdate {
    fn apply(self, config: &mut ScheduleConfig) {
        macro_rules! patch {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    config.$field = value;
                })*
            };
        }

        patch!(
            max_off_days_per_person,
            max_off_days_per_day,
            max_weekend_off_days,
            max_store_off_days_per_day,
            max_part_time_off_days,
            max_standby_off_days,
            session_time_limit_seconds,
            holiday_dates,
            forbidden_dates,
            store_holiday_dates,
            store_forbidden_dates,
        );

        if self.system_open_at.is_some() {
            config.system_open_at = self.system_open_at;
        }
        if self.system_close_at.is_some() {
            config.system_close_at = self.system_close_at;
        }
    }
}

/// Per-period config access with auto-provisioning and supersession.
pub struct ConfigStore {
    repository: Arc<dyn ConfigRepository>,
    defaults: SchedulingDefaults,
}

impl ConfigStore {
    pub fn new(repository: Arc<dyn ConfigRepository>, defaults: SchedulingDefaults) -> Self {
        Self {
            repository,
            defaults,
        }
    }

    pub fn defaults(&self) -> &SchedulingDefaults {
        &self.defaults
    }

    /// Active config for the period, provisioning one from defaults when allowed.
    pub fn get_or_create(&self, period: Period) -> Result<ScheduleConfig, ConfigStoreError> {
        if let Some(config) = self.repository.fetch_active(period)? {
            return Ok(config);
        }

        if !self.defaults.auto_provision {
            return Err(ConfigStoreError::MissingConfig(period));
        }

        let defaults = self.defaults.config_for(period);
        if defaults.session_time_limit_seconds == 0 {
            return Err(ConfigStoreError::InvalidSessionLimit);
        }
        let provisioned = self.repository.save(defaults)?;
        info!(%period, version = provisioned.version, "provisioned default schedule config");
        Ok(provisioned)
    }

    /// Supersede the active config with a patched copy.
    pub fn update(
        &self,
        period: Period,
        update: ScheduleConfigUpdate,
    ) -> Result<ScheduleConfig, ConfigStoreError> {
        let current = self.get_or_create(period)?;
        let mut next = current.clone();
        update.apply(&mut next);
        next.version = current.version + 1;
        next.active = true;

        if let (Some(opens), Some(closes)) = (next.system_open_at, next.system_close_at) {
            if opens >= closes {
                return Err(ConfigStoreError::InvalidWindow);
            }
        }
        if next.session_time_limit_seconds == 0 {
            return Err(ConfigStoreError::InvalidSessionLimit);
        }

        let saved = self.repository.save(next)?;
        info!(%period, version = saved.version, "schedule config superseded");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::scheduling::memory::InMemoryConfigRepository;
    use chrono::TimeZone;

    fn period() -> Period {
        Period::new(2025, 8).expect("valid period")
    }

    #[test]
    fn first_access_provisions_defaults_once() {
        let repository = Arc::new(InMemoryConfigRepository::default());
        let store = ConfigStore::new(repository.clone(), SchedulingDefaults::default());

        let first = store.get_or_create(period()).expect("provisioned");
        let second = store.get_or_create(period()).expect("reused");

        assert_eq!(first, second);
        assert_eq!(repository.history(period()).len(), 1);
    }

    #[test]
    fn missing_config_is_fatal_without_auto_provision() {
        let defaults = SchedulingDefaults {
            auto_provision: false,
            ..SchedulingDefaults::default()
        };
        let store = ConfigStore::new(Arc::new(InMemoryConfigRepository::default()), defaults);

        match store.get_or_create(period()) {
            Err(ConfigStoreError::MissingConfig(missing)) => assert_eq!(missing, period()),
            other => panic!("expected missing config, got {other:?}"),
        }
    }

    #[test]
    fn zero_length_defaults_are_never_provisioned() {
        let defaults = SchedulingDefaults {
            session_minutes: 0,
            ..SchedulingDefaults::default()
        };
        let repository = Arc::new(InMemoryConfigRepository::default());
        let store = ConfigStore::new(repository.clone(), defaults);

        assert!(matches!(
            store.get_or_create(period()),
            Err(ConfigStoreError::InvalidSessionLimit)
        ));
        assert!(repository.history(period()).is_empty());
    }

    #[test]
    fn update_supersedes_previous_version() {
        let repository = Arc::new(InMemoryConfigRepository::default());
        let store = ConfigStore::new(repository.clone(), SchedulingDefaults::default());

        let updated = store
            .update(
                period(),
                ScheduleConfigUpdate {
                    max_off_days_per_day: Some(2),
                    ..ScheduleConfigUpdate::default()
                },
            )
            .expect("update applies");

        assert_eq!(updated.version, 2);
        assert_eq!(updated.max_off_days_per_day, 2);
        let history = repository.history(period());
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().filter(|config| config.active).count(), 1);
        assert!(!history[0].active);
    }

    #[test]
    fn update_rejects_inverted_window() {
        let store = ConfigStore::new(
            Arc::new(InMemoryConfigRepository::default()),
            SchedulingDefaults::default(),
        );
        let update = ScheduleConfigUpdate {
            system_open_at: Some(Utc.with_ymd_and_hms(2025, 7, 20, 0, 0, 0).unwrap()),
            system_close_at: Some(Utc.with_ymd_and_hms(2025, 7, 10, 0, 0, 0).unwrap()),
            ..ScheduleConfigUpdate::default()
        };

        assert!(matches!(
            store.update(period(), update),
            Err(ConfigStoreError::InvalidWindow)
        ));
    }
}
