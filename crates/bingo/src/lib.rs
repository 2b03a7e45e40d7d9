//! # Bingo
//!
//! Card pool engine for live bingo rounds.
//!
//! A host generates large *bunches* of cards in the background, then
//! points rounds at a bunch. Players joining a round are offered a few
//! cards nobody else holds, pick some before a deadline, and keep them for
//! the round. Whatever they don't pick goes back to the pool.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bingo::prelude::*;
//!
//! # async fn run() -> Result<(), BingoError> {
//! bingo::telemetry::init_tracing();
//! let engine = BingoEngine::in_memory(EngineConfig::default());
//!
//! // Host: fill a bunch.
//! let job_id = engine
//!     .create_generation_job("Saturday", GridSpec::new(5, 75), 500)
//!     .await?;
//!
//! // Player: join a round that uses the bunch, then pick cards.
//! let joined = engine.join_round(RoundId(1)).await?;
//! let chosen = joined.player.locked_card_ids[..2].to_vec();
//! engine.select_cards(joined.player.id, chosen).await?;
//! # let _ = job_id;
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
pub mod telemetry;

pub use config::EngineConfig;
pub use engine::BingoEngine;
pub use error::BingoError;

pub use bingo_allocator as allocator;
pub use bingo_cards as cards;
pub use bingo_protocol as protocol;
pub use bingo_store as store;

/// Common imports for engine users.
pub mod prelude {
    pub use crate::{BingoEngine, BingoError, EngineConfig};
    pub use bingo_allocator::{AllocError, AllocatorConfig, JoinedRound};
    pub use bingo_cards::{GenerationConfig, GenerationRequest};
    pub use bingo_protocol::{
        AllocationEvent, BunchCard, BunchId, CardBunch, CardDelivery, CardId, Codec,
        GenerationJob, Grid, GridSpec, JobId, JobStatus, JsonCodec, PlayerId, PlayerStatus,
        Recipient, RoundConfig, RoundId, RoundPlayer, RoundStatus,
    };
    pub use bingo_store::{MemoryStore, StaticRounds};
}
