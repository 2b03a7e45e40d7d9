//! Generation settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for bulk card generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Cards generated and written per batch. Peak memory is one chunk,
    /// whatever the bunch size.
    pub chunk_size: usize,

    /// How long finished jobs stay visible to pollers before
    /// [`GenerationJobs::cleanup_finished`](crate::GenerationJobs::cleanup_finished)
    /// drops them.
    pub job_retention: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            job_retention: Duration::from_secs(3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_default() {
        let config = GenerationConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.job_retention, Duration::from_secs(3600));
    }
}
