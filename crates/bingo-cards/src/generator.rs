//! Card grid generator.
//!
//! Pure: no state, no I/O. Safe to call from any number of tasks at once,
//! each with its own RNG.

use bingo_protocol::{Grid, GridSpec, ProtocolError};
use rand::Rng;
use rand::seq::SliceRandom;

/// Generates one card.
///
/// Builds the pool `1..=max_number`, Fisher–Yates shuffles it, keeps the
/// first `grid_size²` values, and on odd sizes overwrites the flattened
/// center with [`Grid::FREE`]. Numbers are drawn without replacement, so
/// no value repeats on a card.
///
/// # Errors
/// [`ProtocolError::InvalidGrid`] if `spec` fails [`GridSpec::validate`].
pub fn generate_grid<R: Rng + ?Sized>(
    rng: &mut R,
    spec: GridSpec,
) -> Result<Grid, ProtocolError> {
    spec.validate()?;

    let cells = spec.cell_count();
    let mut pool: Vec<u32> = (1..=spec.max_number).collect();
    pool.shuffle(rng);
    pool.truncate(cells);

    if spec.has_free_center() {
        pool[cells / 2] = Grid::FREE;
    }

    Grid::from_flat(spec.grid_size, pool)
}

/// Checks the card invariant: distinct non-free values in range, and a
/// free cell exactly at the center of odd grids.
#[cfg(test)]
pub(crate) fn is_well_formed(grid: &Grid, spec: GridSpec) -> bool {
    let mut seen = std::collections::HashSet::new();
    let numbers_ok = grid
        .numbers()
        .all(|n| n >= 1 && n <= spec.max_number && seen.insert(n));

    let free_cells: Vec<(usize, usize)> = (0..grid.size())
        .flat_map(|r| (0..grid.size()).map(move |c| (r, c)))
        .filter(|&(r, c)| grid.cell(r, c) == Some(Grid::FREE))
        .collect();
    let free_ok = match grid.center() {
        Some(center) => free_cells == vec![center],
        None => free_cells.is_empty(),
    };

    grid.size() == spec.grid_size && numbers_ok && free_ok
}
