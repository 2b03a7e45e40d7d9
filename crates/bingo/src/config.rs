//! Engine configuration.

use bingo_allocator::AllocatorConfig;
use bingo_cards::GenerationConfig;
use serde::{Deserialize, Serialize};

/// Everything [`BingoEngine`](crate::BingoEngine) can be tuned with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub generation: GenerationConfig,
    pub allocator: AllocatorConfig,
}
