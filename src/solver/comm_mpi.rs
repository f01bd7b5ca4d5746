//! MPI communication backend for the distributed relaxation.
//!
//! Requires the `distributed` feature flag and an MPI installation.
//! Implements `CommunicationBackend` using `mpi::traits::*`.
//!
//! # Usage
//!
//! The caller must initialize MPI before constructing `MpiComm` and keep the
//! universe alive until the run is over:
//!
//! ```ignore
//! let universe = mpi::initialize().expect("MPI init failed");
//! let comm = MpiComm::new();
//! ```
//!
//! # Halo fetches
//!
//! MPI has no shared window here, so a fetch is a paired send/receive: when
//! rank `r` fetches from `r + 1`, rank `r + 1` is fetching from `r` in the
//! same exchange phase, and each side sends the edge row the other needs.
//! The lower rank sends first and the higher rank receives first, so the
//! pair cannot deadlock on blocking sends.

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::error::{Result, ThermoplateError};

use super::comm::CommunicationBackend;
use super::grid::GridStore;

/// MPI-based communication backend.
///
/// Wraps the MPI world communicator. Requires `mpi::initialize()` to have
/// been called before construction.
pub struct MpiComm;

impl MpiComm {
    /// Create a new MPI communication backend.
    pub fn new() -> Self {
        Self
    }
}

impl Default for MpiComm {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunicationBackend for MpiComm {
    fn rank(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.rank() as usize
    }

    fn num_ranks(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.size() as usize
    }

    fn barrier(&self) {
        let world = SimpleCommunicator::world();
        world.barrier();
    }

    fn all_reduce_max(&self, local: f64) -> f64 {
        let world = SimpleCommunicator::world();
        // MPI_MAX says nothing about NaN, so it travels as a separate flag.
        let (flag, value) = if local.is_nan() {
            (1.0, f64::NEG_INFINITY)
        } else {
            (0.0, local)
        };
        let send = [flag, value];
        let mut global = [0.0f64; 2];
        world.all_reduce_into(&send[..], &mut global[..], SystemOperation::max());
        if global[0] > 0.0 {
            f64::NAN
        } else {
            global[1]
        }
    }

    fn fetch_row(&self, peer: usize, global_row: usize, local: &GridStore) -> Result<Vec<f64>> {
        let world = SimpleCommunicator::world();
        let my_rank = world.rank() as usize;
        let num_ranks = world.size() as usize;
        if peer >= num_ranks || peer == my_rank {
            return Err(ThermoplateError::RankOutOfRange {
                rank: peer,
                num_ranks,
            });
        }

        // The peer wants whichever of our edge rows faces it.
        let range = local.range();
        let send_row = if peer < my_rank { range.first } else { range.last };
        let send_data = local.row(send_row)?;
        let mut recv = vec![0.0f64; local.width()];

        let process = world.process_at_rank(peer as i32);
        if my_rank < peer {
            process.send(&send_data[..]);
            process.receive_into(&mut recv[..]);
        } else {
            process.receive_into(&mut recv[..]);
            process.send(&send_data[..]);
        }

        tracing::trace!(peer, global_row, sent = send_row, "halo row exchanged");
        Ok(recv)
    }
}
