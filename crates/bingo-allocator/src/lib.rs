//! Card allocation for bingo rounds.
//!
//! Each round runs as an isolated Tokio task (actor model) that owns every
//! write to the round's player records. Joins, selections, and timeouts
//! for one round are handled strictly one after another, which is what
//! keeps a card from being handed to two players.
//!
//! ```text
//! join_round ──→ [Selecting] ──select_cards──→ [Ready]
//!                     │
//!                     └──── deadline timer ───→ [Ready]
//! ```
//!
//! # Key types
//!
//! - [`AllocatorManager`] — spawns round actors, routes calls, answers queries
//! - [`RoundHandle`] — send commands to a running round actor
//! - [`JoinedRound`] — a new player and the grids they were offered
//! - [`AllocError`] — every way a join or selection can be refused

mod code;
mod config;
mod error;
mod manager;
mod round;

pub use code::{CODE_ALPHABET, generate_code};
pub use config::AllocatorConfig;
pub use error::AllocError;
pub use manager::AllocatorManager;
pub use round::{JoinedRound, RoundHandle};
