//! Communication backend abstraction for the distributed relaxation.
//!
//! Provides a trait for rank discovery, synchronization, the convergence
//! max-reduction and halo row fetches, plus a single-process implementation.

use crate::error::{Result, ThermoplateError};

use super::grid::{GridStore, RowWindow};

/// Abstraction over the process group the relaxation runs on.
///
/// Implementations: `SingleProcessComm` (no peers), `ThreadComm` (ranks as
/// threads sharing memory), `MpiComm` (via mpi crate).
pub trait CommunicationBackend: Send + Sync {
    /// This process's rank, stable for the run.
    fn rank(&self) -> usize;

    /// Total number of ranks, stable for the run.
    fn num_ranks(&self) -> usize;

    /// Block until every rank has called `barrier`.
    fn barrier(&self);

    /// Max of a local scalar across all ranks. Every rank receives the result.
    fn all_reduce_max(&self, local: f64) -> f64;

    /// Make this rank's band readable by its peers.
    ///
    /// One-sided backends record the window here; backends that move rows
    /// with explicit messages ignore it.
    fn expose(&self, _window: RowWindow) {}

    /// Read one row owned by `peer`.
    ///
    /// `local` is this rank's own band. Two-sided backends use it to serve
    /// the matching request `peer` issues in the same exchange phase.
    /// Fails with `RankOutOfRange` if `peer >= num_ranks()`.
    fn fetch_row(&self, peer: usize, global_row: usize, local: &GridStore) -> Result<Vec<f64>>;
}

/// No-op communication backend for a single rank.
///
/// Reductions pass through unchanged. There are no peers, so every fetch is
/// out of range.
pub struct SingleProcessComm;

impl CommunicationBackend for SingleProcessComm {
    fn rank(&self) -> usize {
        0
    }

    fn num_ranks(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn all_reduce_max(&self, local: f64) -> f64 {
        local
    }

    fn fetch_row(&self, peer: usize, _global_row: usize, _local: &GridStore) -> Result<Vec<f64>> {
        Err(ThermoplateError::RankOutOfRange {
            rank: peer,
            num_ranks: 1,
        })
    }
}
