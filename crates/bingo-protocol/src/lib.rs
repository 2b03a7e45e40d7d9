//! Shared data model for the bingo card pool.
//!
//! This crate defines the types every other layer agrees on:
//!
//! - **Identity** ([`BunchId`], [`CardId`], [`RoundId`], [`PlayerId`],
//!   [`JobId`]) — newtype ids so a card id can never be passed where a
//!   player id is expected.
//! - **Model** ([`CardBunch`], [`BunchCard`], [`Grid`], [`RoundPlayer`],
//!   [`GenerationJob`], [`RoundConfig`]) — the records the store persists
//!   and the allocator mutates.
//! - **Events** ([`AllocationEvent`]) — what the allocator publishes for a
//!   real-time transport to relay to clients.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how events are turned
//!   into bytes.
//! - **Clock** ([`Clock`], [`SystemClock`], [`ManualClock`]) — the single
//!   source of "now" for deadlines and job timestamps.
//!
//! # Architecture
//!
//! ```text
//! bingo-cards / bingo-allocator  (behaviour)
//!         ↕
//! bingo-store                    (persistence traits)
//!         ↕
//! bingo-protocol (this crate)    (plain data)
//! ```

mod clock;
mod codec;
mod error;
mod events;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{AllocationEvent, Recipient};
pub use types::{
    BunchCard, BunchId, CardBunch, CardDelivery, CardId, GenerationJob,
    Grid, GridSpec, JobId, JobStatus, NewBunchCard, NewRoundPlayer,
    PlayerId, PlayerStatus, RoundConfig, RoundId, RoundPlayer, RoundStatus,
};
