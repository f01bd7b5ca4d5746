//! Initial temperatures and the fixed boundary conditions.
//!
//! ```text
//!        0        0        0
//!     0  +-----------------+  0
//!        |                 |
//!     0  |        0        |  ramp (peak / rows) * i
//!        |                 |
//!     0  +-----------------+  peak
//!        0   ramp (peak / columns) * j
//! ```
//!
//! The top row and left column stay at 0, the right column and bottom row
//! ramp linearly up to `peak` in the bottom-right corner. Values depend only
//! on the global cell index, so every partitioning yields the same grid.

use super::grid::{GridShape, GridStore};

/// Starting temperature of global cell `(row, column)`.
pub fn initial_temperature(shape: GridShape, peak: f64, row: usize, column: usize) -> f64 {
    if row == shape.rows + 1 {
        (peak / shape.columns as f64) * column as f64
    } else if row == 0 || column != shape.columns + 1 {
        0.0
    } else {
        (peak / shape.rows as f64) * row as f64
    }
}

/// Populate this rank's band. Must run once, before the first barrier.
pub fn initialize(store: &GridStore, peak: f64) {
    let shape = store.shape();
    store.fill_with(|row, column| initial_temperature(shape, peak, row, column));

    let range = store.range();
    tracing::debug!(
        first = range.first,
        last = range.last,
        top_boundary = range.contains(0),
        bottom_boundary = range.contains(shape.rows + 1),
        "band initialized"
    );
}
