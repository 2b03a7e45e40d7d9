//! Bingo card generation for the card pool.
//!
//! Bunches can hold hundreds of thousands of cards, so generation runs as a
//! background job that works in fixed-size chunks:
//!
//! ```text
//! GenerationJobs::start ──→ JobRegistry (running)
//!        │
//!        └─ spawned task ──→ generate_and_save
//!                               │  per chunk:
//!                               │    should_cancel?  ──yes──→ Cancelled
//!                               │    generate_grid × chunk
//!                               │    store.insert_cards (one batch)
//!                               │    on_progress(current, total)
//!                               ▼
//!                         Completed / Cancelled / Failed
//! ```
//!
//! # Key types
//!
//! - [`generate_grid`] — one random card, pure
//! - [`generate_and_save`] — the chunked runner, bounded memory
//! - [`JobRegistry`] — progress records shared between runner and pollers
//! - [`GenerationJobs`] — host-side job control (start, poll, cancel)

mod config;
mod error;
mod generator;
mod jobs;
mod registry;
mod runner;

pub use config::GenerationConfig;
pub use error::{GenerationError, JobError};
pub use generator::generate_grid;
pub use jobs::{GenerationHandle, GenerationJobs, GenerationRequest};
pub use registry::JobRegistry;
pub use runner::{ChunkPlan, generate_and_save};
