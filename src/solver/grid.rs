//! Partitioned storage for the temperature grid.
//!
//! Each rank allocates one row-major buffer holding exactly the rows it owns,
//! `columns + 2` cells wide. The buffer sits behind an `Arc<RwLock<_>>` so a
//! [`RowWindow`] can hand out read-only access to other ranks; writes only
//! ever happen through the owning [`GridStore`].

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, ThermoplateError};

use super::partition::RowRange;

/// Interior dimensions of the plate. The stored grid is `(rows + 2) x (columns + 2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub rows: usize,
    pub columns: usize,
}

impl GridShape {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    /// Cells per stored row, boundary columns included.
    pub fn width(&self) -> usize {
        self.columns + 2
    }

    pub fn total_rows(&self) -> usize {
        self.rows + 2
    }
}

/// A rank's owned band of the grid.
#[derive(Debug)]
pub struct GridStore {
    shape: GridShape,
    range: RowRange,
    cells: Arc<RwLock<Vec<f64>>>,
}

impl GridStore {
    /// Allocate a zeroed band. The size is fixed for the rest of the run.
    pub fn new(shape: GridShape, range: RowRange) -> Self {
        let cells = vec![0.0; range.len() * shape.width()];
        Self {
            shape,
            range,
            cells: Arc::new(RwLock::new(cells)),
        }
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn range(&self) -> RowRange {
        self.range
    }

    pub fn width(&self) -> usize {
        self.shape.width()
    }

    /// Read-only handle on this band for other ranks.
    pub fn window(&self) -> RowWindow {
        RowWindow {
            range: self.range,
            width: self.shape.width(),
            cells: Arc::clone(&self.cells),
        }
    }

    /// Copy one owned row out of the band.
    pub fn row(&self, global_row: usize) -> Result<Vec<f64>> {
        let offset = self.offset(global_row)?;
        let cells = self.cells.read();
        Ok(cells[offset..offset + self.width()].to_vec())
    }

    pub fn get(&self, global_row: usize, column: usize) -> Result<f64> {
        let offset = self.offset(global_row)?;
        Ok(self.cells.read()[offset + column])
    }

    /// Overwrite every owned cell with `value(global_row, column)`.
    pub fn fill_with(&self, mut value: impl FnMut(usize, usize) -> f64) {
        let width = self.width();
        let mut cells = self.cells.write();
        for (local, row) in cells.chunks_exact_mut(width).enumerate() {
            let global_row = self.range.first + local;
            for (column, cell) in row.iter_mut().enumerate() {
                *cell = value(global_row, column);
            }
        }
    }

    /// Run `f` with shared access to the raw band.
    pub fn with_cells<R>(&self, f: impl FnOnce(&[f64]) -> R) -> R {
        f(&self.cells.read())
    }

    /// Run `f` with exclusive access to the raw band.
    pub fn with_cells_mut<R>(&self, f: impl FnOnce(&mut [f64]) -> R) -> R {
        f(&mut self.cells.write())
    }

    fn offset(&self, global_row: usize) -> Result<usize> {
        if !self.range.contains(global_row) {
            return Err(ThermoplateError::RowOutOfRange {
                row: global_row,
                first: self.range.first,
                last: self.range.last,
            });
        }
        Ok((global_row - self.range.first) * self.width())
    }
}

/// Read-only handle on another rank's band.
///
/// Holding a window does not pin any data: every read takes the lock,
/// copies, and releases it again.
#[derive(Debug, Clone)]
pub struct RowWindow {
    range: RowRange,
    width: usize,
    cells: Arc<RwLock<Vec<f64>>>,
}

impl RowWindow {
    pub fn row(&self, global_row: usize) -> Result<Vec<f64>> {
        if !self.range.contains(global_row) {
            return Err(ThermoplateError::RowOutOfRange {
                row: global_row,
                first: self.range.first,
                last: self.range.last,
            });
        }
        let offset = (global_row - self.range.first) * self.width;
        let cells = self.cells.read();
        Ok(cells[offset..offset + self.width].to_vec())
    }
}

/// Dense copy of the whole plate, stitched together from every band.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    shape: GridShape,
    cells: Vec<f64>,
}

impl Grid {
    /// Concatenate bands in rank order. They must tile `0..=rows + 1` exactly.
    pub fn assemble(stores: &[GridStore]) -> Result<Self> {
        let shape = match stores.first() {
            Some(store) => store.shape(),
            None => return Err(ThermoplateError::Runtime("no bands to assemble".into())),
        };
        let mut cells = Vec::with_capacity(shape.total_rows() * shape.width());
        let mut next_row = 0;
        for store in stores {
            let range = store.range();
            if store.shape() != shape || range.first != next_row {
                return Err(ThermoplateError::Runtime(format!(
                    "band {}..={} does not continue at row {next_row}",
                    range.first, range.last
                )));
            }
            store.with_cells(|band| cells.extend_from_slice(band));
            next_row = range.last + 1;
        }
        if next_row != shape.total_rows() {
            return Err(ThermoplateError::Runtime(format!(
                "bands stop at row {next_row}, grid has {} rows",
                shape.total_rows()
            )));
        }
        Ok(Self { shape, cells })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.cells[row * self.shape.width() + column]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let width = self.shape.width();
        &self.cells[row * width..(row + 1) * width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.cells.chunks_exact(self.shape.width())
    }
}
