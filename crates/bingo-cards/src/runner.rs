//! Chunked bulk generation.
//!
//! Cards are generated and written one chunk at a time, so peak memory is
//! one chunk no matter how many cards the bunch asks for. Each chunk is a
//! single batch write that completes before the next chunk starts: a crash
//! mid-run leaves a prefix of complete cards, never a half-written one.

use bingo_protocol::{BunchId, GridSpec, NewBunchCard, ProtocolError};
use bingo_store::CardPoolStore;

use crate::GenerationError;
use crate::generator::generate_grid;

/// What to generate and how to slice it.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlan {
    pub bunch_id: BunchId,
    pub grid: GridSpec,
    /// Cards to generate in total.
    pub total: u64,
    /// Cards per batch. Zero is treated as one.
    pub chunk_size: usize,
}

/// Generates `plan.total` cards into `store`, chunk by chunk.
///
/// Before each chunk `should_cancel` is polled; cancellation is never
/// observed mid-chunk. After each chunk is written `on_progress(current,
/// total)` is called, so for `total = T` and `chunk_size = C` a complete
/// run reports exactly `ceil(T / C)` times with strictly increasing
/// `current`, the last one being `(T, T)`.
///
/// Card indices run from 0 to `total - 1` in order.
///
/// Returns the number of cards written.
///
/// # Errors
/// - [`GenerationError::Grid`] — `plan.grid` can't produce a card; nothing
///   is written.
/// - [`GenerationError::Cancelled`] — `should_cancel` returned `true`.
/// - [`GenerationError::Store`] — a chunk write failed.
///
/// In both of the last two cases the chunks already written stay put.
pub async fn generate_and_save<S, P, C>(
    store: &S,
    plan: ChunkPlan,
    mut on_progress: P,
    should_cancel: C,
) -> Result<u64, GenerationError>
where
    S: CardPoolStore,
    P: FnMut(u64, u64) + Send,
    C: Fn() -> bool + Send,
{
    plan.grid.validate()?;
    let chunk_size = plan.chunk_size.max(1) as u64;
    let mut generated: u64 = 0;

    tracing::debug!(
        bunch_id = %plan.bunch_id,
        total = plan.total,
        chunk_size,
        "bulk generation started"
    );

    while generated < plan.total {
        if should_cancel() {
            tracing::info!(
                bunch_id = %plan.bunch_id,
                generated,
                total = plan.total,
                "bulk generation cancelled"
            );
            return Err(GenerationError::Cancelled { generated });
        }

        let size = chunk_size.min(plan.total - generated);
        let chunk = build_chunk(plan.bunch_id, plan.grid, generated, size)?;
        store.insert_cards(chunk).await?;
        generated += size;

        tracing::debug!(
            bunch_id = %plan.bunch_id,
            current = generated,
            total = plan.total,
            "chunk written"
        );
        on_progress(generated, plan.total);

        // Chunk boundary: let pollers and other tasks run.
        tokio::task::yield_now().await;
    }

    Ok(generated)
}

/// Generates one chunk with the thread-local RNG.
///
/// Kept synchronous so the RNG (which is `!Send`) never lives across an
/// `.await`.
fn build_chunk(
    bunch_id: BunchId,
    grid: GridSpec,
    first_index: u64,
    size: u64,
) -> Result<Vec<NewBunchCard>, ProtocolError> {
    let mut rng = rand::rng();
    (first_index..first_index + size)
        .map(|index| {
            Ok(NewBunchCard {
                bunch_id,
                index,
                grid: generate_grid(&mut rng, grid)?,
            })
        })
        .collect()
}
