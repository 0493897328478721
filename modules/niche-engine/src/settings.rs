use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::config::AppConfig;
use crate::file_config::{FileConfig, SheetConfig};

/// Shortest pause between two status checks of a running job. Requested
/// intervals below this are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Rows written off per `step` once a run is cancelled.
pub const DRAIN_BATCH_SIZE: usize = 10;

/// Tunables for a `RunEngine`, independent of any single run.
#[derive(Debug, Clone, TypedBuilder)]
pub struct EngineSettings {
    /// Job credential for rows whose token cell is empty.
    #[builder(default)]
    pub default_token: Option<String>,
    #[builder(default = Duration::from_secs(5))]
    pub poll_interval: Duration,
    #[builder(default)]
    pub sheet: SheetConfig,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig, file_config: &FileConfig) -> Self {
        Self::builder()
            .default_token(config.apify_token.clone())
            .poll_interval(Duration::from_secs(file_config.provider.poll_interval_secs))
            .sheet(file_config.sheet.clone())
            .build()
    }

    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_has_a_floor() {
        let settings = EngineSettings::builder()
            .poll_interval(Duration::from_millis(10))
            .build();
        assert_eq!(settings.effective_poll_interval(), MIN_POLL_INTERVAL);

        let settings = EngineSettings::builder()
            .poll_interval(Duration::from_secs(9))
            .build();
        assert_eq!(settings.effective_poll_interval(), Duration::from_secs(9));
    }
}
