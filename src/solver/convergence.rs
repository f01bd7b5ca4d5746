//! Commit of a finished sweep and the global convergence measure.
//!
//! `local_dt` is the largest `|new - old|` over the cells this rank updated
//! in one iteration, starting from 0 every time. `global_dt` is the max of
//! all ranks' `local_dt`, identical on every rank.

use super::comm::CommunicationBackend;
use super::grid::GridStore;
use super::stencil::Sweep;

/// `max` that lets NaN win, so a poisoned cell shows up in `global_dt`
/// instead of being silently dropped by `f64::max`.
pub fn max_change(acc: f64, value: f64) -> f64 {
    if value.is_nan() || value > acc {
        value
    } else {
        acc
    }
}

/// Write the swept rows into the band and return `local_dt`.
///
/// Only the rows the sweep updated are touched; boundary rows and columns
/// keep their values.
pub fn commit(store: &GridStore, sweep: &Sweep) -> f64 {
    let width = store.width();
    let first = store.range().first;
    let columns = 1..width - 1;

    store.with_cells_mut(|cells| {
        let mut local_dt = 0.0;
        for row in sweep.rows() {
            let offset = (row - first) * width;
            let old = &mut cells[offset + columns.start..offset + columns.end];
            let new = sweep.row(row);
            for (cell, &value) in old.iter_mut().zip(new) {
                local_dt = max_change(local_dt, (value - *cell).abs());
                *cell = value;
            }
        }
        local_dt
    })
}

/// Combine every rank's `local_dt` into `global_dt`.
pub fn reduce(comm: &dyn CommunicationBackend, local_dt: f64) -> f64 {
    let global_dt = comm.all_reduce_max(local_dt);
    tracing::trace!(local_dt, global_dt, "convergence reduced");
    global_dt
}
