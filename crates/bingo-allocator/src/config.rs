//! Allocator settings.

use serde::{Deserialize, Serialize};

/// Configuration shared by every round actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Bound of each round actor's command channel. When it fills up,
    /// callers wait.
    pub channel_size: usize,

    /// Characters per player code.
    pub code_length: usize,

    /// Fresh codes tried per join before giving up.
    pub code_attempts: usize,

    /// Allocation events buffered per subscriber. A subscriber that falls
    /// further behind than this skips the oldest events.
    pub event_capacity: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            channel_size: 64,
            code_length: 4,
            code_attempts: 10,
            event_capacity: 1024,
        }
    }
}
