//! Persistence for the bingo card pool.
//!
//! Three seams, each a trait so the engine never knows which database it
//! runs against:
//!
//! - [`CardPoolStore`] — bunch metadata and the generated cards.
//! - [`PlayerStore`] — per-round player allocation records.
//! - [`RoundProvider`] — read-only round configuration, owned by whatever
//!   manages rounds.
//!
//! [`MemoryStore`] implements the first two and [`StaticRounds`] the third.
//! Both are complete in-process implementations; a database backend only
//! has to provide the same guarantees (batch inserts are all-or-nothing,
//! `(round, code)` is unique, deleting a bunch removes its cards).

#![allow(async_fn_in_trait)]

mod error;
mod memory;
mod rounds;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use rounds::StaticRounds;
pub use traits::{CardPoolStore, PlayerStore, RoundProvider};
