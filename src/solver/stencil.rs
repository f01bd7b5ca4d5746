//! Four-point Jacobi update.
//!
//! Every interior cell becomes the average of its four grid neighbors from
//! the previous iteration:
//!
//! ```text
//! new[i][j] = 0.25 * (old[i+1][j] + old[i-1][j] + old[i][j+1] + old[i][j-1])
//! ```
//!
//! New values go into a [`Sweep`] buffer and reach the band only through
//! [`commit`](super::convergence::commit), so the sweep never reads a value
//! written in the same iteration. Rows just outside the band are resolved to
//! the halo rows fetched from the neighbors.

use std::ops::Range;

use crate::error::{Result, ThermoplateError};

use super::grid::{GridShape, GridStore};
use super::halo::HaloRows;
use super::partition::RowRange;

/// Scratch generation for the rows one rank updates, interior columns only.
#[derive(Debug, Clone)]
pub struct Sweep {
    rows: Range<usize>,
    columns: usize,
    values: Vec<f64>,
}

impl Sweep {
    /// Scratch space for the updatable rows of `range`: the owned rows minus
    /// the global boundary rows 0 and `rows + 1`. May be empty for a band
    /// that holds only a boundary row.
    pub fn for_band(shape: GridShape, range: RowRange) -> Self {
        let start = range.first.max(1);
        let end = (range.last.min(shape.rows) + 1).max(start);
        Self {
            rows: start..end,
            columns: shape.columns,
            values: vec![0.0; (end - start) * shape.columns],
        }
    }

    /// Global rows this sweep updates.
    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// New values for interior columns `1..=columns` of `global_row`.
    pub fn row(&self, global_row: usize) -> &[f64] {
        let k = global_row - self.rows.start;
        &self.values[k * self.columns..(k + 1) * self.columns]
    }
}

/// Compute the next generation of every updatable row into `sweep`.
pub fn sweep(store: &GridStore, halos: &HaloRows, sweep: &mut Sweep) -> Result<()> {
    let width = store.width();
    let range = store.range();
    let columns = sweep.columns;
    let rows = sweep.rows();

    store.with_cells(|cells| {
        let view = |row: usize| -> Result<&[f64]> {
            let halo = if row + 1 == range.first {
                halos.prev.as_deref()
            } else if row == range.last + 1 {
                halos.next.as_deref()
            } else if range.contains(row) {
                let offset = (row - range.first) * width;
                Some(&cells[offset..offset + width])
            } else {
                None
            };
            halo.ok_or_else(|| {
                ThermoplateError::Runtime(format!(
                    "row {row} is neither owned ({}..={}) nor a fetched halo",
                    range.first, range.last
                ))
            })
        };

        for (k, row) in rows.enumerate() {
            let above = view(row - 1)?;
            let here = view(row)?;
            let below = view(row + 1)?;
            let out = &mut sweep.values[k * columns..(k + 1) * columns];
            for (j, cell) in (1..=columns).zip(out.iter_mut()) {
                *cell = 0.25 * (below[j] + above[j] + here[j + 1] + here[j - 1]);
            }
        }
        Ok(())
    })
}
