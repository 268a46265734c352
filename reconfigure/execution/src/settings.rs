// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine tunables, loadable from the operator's TOML config file

use corral_reconfigure_planning::RestartStrategy;
use corral_types::DEFAULT_REVISION_HISTORY_LIMIT;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Which end of the ordinal range a rolling wave starts from
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    JsonSchema,
    Deserialize,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RollingOrder {
    /// start at the highest ordinal and sweep down (the usual order for
    /// ordered workloads, where the primary tends to sit at ordinal 0)
    #[default]
    HighestFirst,
    LowestFirst,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot parse reconfigure settings")]
    Parse(#[from] toml::de::Error),

    #[error("invalid reconfigure settings: {0}")]
    Invalid(String),
}

/// Tunables of the reconfiguration engine
#[derive(Debug, Clone, Eq, PartialEq, JsonSchema, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconfigureSettings {
    /// how many replicas may be mid-update at once during a rolling wave
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_rolling_replicas: usize,

    /// how long a replica must have been ready before it counts as
    /// available for window-advance purposes (enforced by the store when
    /// it computes each replica's `available` observation)
    #[serde(default)]
    pub min_ready_seconds: u32,

    /// revisions retained in history before the oldest are evicted
    #[serde(default = "default_history_limit")]
    pub revision_history_limit: usize,

    #[serde(default)]
    pub rolling_order: RollingOrder,

    /// how restarts are carried out when a change needs one
    #[serde(default)]
    pub restart_strategy: RestartStrategy,
}

fn default_max_concurrent() -> usize {
    1
}

fn default_history_limit() -> usize {
    DEFAULT_REVISION_HISTORY_LIMIT
}

impl Default for ReconfigureSettings {
    fn default() -> ReconfigureSettings {
        ReconfigureSettings {
            max_concurrent_rolling_replicas: default_max_concurrent(),
            min_ready_seconds: 0,
            revision_history_limit: default_history_limit(),
            rolling_order: RollingOrder::default(),
            restart_strategy: RestartStrategy::default(),
        }
    }
}

impl ReconfigureSettings {
    pub fn from_toml_str(raw: &str) -> Result<ReconfigureSettings, SettingsError> {
        let settings: ReconfigureSettings = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_concurrent_rolling_replicas == 0 {
            return Err(SettingsError::Invalid(
                "max_concurrent_rolling_replicas must be at least 1"
                    .to_string(),
            ));
        }
        if self.revision_history_limit == 0 {
            return Err(SettingsError::Invalid(
                "revision_history_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::ReconfigureSettings;
    use super::RollingOrder;
    use corral_reconfigure_planning::RestartStrategy;

    #[test]
    fn test_defaults() {
        let settings = ReconfigureSettings::from_toml_str("").unwrap();
        assert_eq!(settings, ReconfigureSettings::default());
        assert_eq!(settings.max_concurrent_rolling_replicas, 1);
        assert_eq!(settings.revision_history_limit, 10);
        assert_eq!(settings.rolling_order, RollingOrder::HighestFirst);
        assert_eq!(settings.restart_strategy, RestartStrategy::Workload);
    }

    #[test]
    fn test_full_file() {
        let settings = ReconfigureSettings::from_toml_str(
            "max_concurrent_rolling_replicas = 2\n\
             min_ready_seconds = 30\n\
             revision_history_limit = 5\n\
             rolling_order = \"lowest_first\"\n\
             restart_strategy = \"rolling\"\n",
        )
        .unwrap();
        assert_eq!(settings.max_concurrent_rolling_replicas, 2);
        assert_eq!(settings.min_ready_seconds, 30);
        assert_eq!(settings.rolling_order, RollingOrder::LowestFirst);
        assert_eq!(settings.restart_strategy, RestartStrategy::Rolling);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ReconfigureSettings::from_toml_str(
            "max_concurrent_rolling_replicas = 0\n"
        )
        .is_err());
        assert!(ReconfigureSettings::from_toml_str(
            "revision_history_limit = 0\n"
        )
        .is_err());
        assert!(
            ReconfigureSettings::from_toml_str("no_such_setting = 1\n")
                .is_err()
        );
    }
}
