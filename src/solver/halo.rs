//! Halo exchange: fetch the one row each neighbor owns next to our band.
//!
//! A band needs row `first - 1` from the previous rank and row `last + 1`
//! from the next rank to update its own edge rows. Only neighbors that exist
//! are asked, so rank 0 never fetches "before" itself and the last rank
//! never fetches "after" itself. The rows live only for one iteration.

use crate::error::Result;

use super::comm::CommunicationBackend;
use super::grid::GridStore;
use super::partition::{Neighbors, Side};

/// Rows fetched from the neighbors for the current iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HaloRows {
    pub prev: Option<Vec<f64>>,
    pub next: Option<Vec<f64>>,
}

impl HaloRows {
    pub fn len(&self) -> usize {
        usize::from(self.prev.is_some()) + usize::from(self.next.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetch the halo row from every neighbor of this band.
///
/// Each fetch blocks until its row has arrived. The fetches are independent
/// of each other.
pub fn exchange(
    comm: &dyn CommunicationBackend,
    store: &GridStore,
    neighbors: &Neighbors,
) -> Result<HaloRows> {
    let mut halos = HaloRows::default();
    for neighbor in neighbors.iter() {
        let row = comm.fetch_row(neighbor.rank, neighbor.halo_row, store)?;
        tracing::trace!(
            peer = neighbor.rank,
            row = neighbor.halo_row,
            "halo row fetched"
        );
        match neighbor.side {
            Side::Prev => halos.prev = Some(row),
            Side::Next => halos.next = Some(row),
        }
    }
    Ok(halos)
}
