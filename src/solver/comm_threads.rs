//! In-process communication backend: every rank is a thread.
//!
//! `ThreadWorld::run` starts one rayon worker per rank and runs the same
//! closure on each of them (SPMD). Ranks share memory, so a halo fetch is a
//! one-sided read through the peer's exposed [`RowWindow`]; nothing is sent.
//!
//! ```ignore
//! let results = ThreadWorld::run(4, |comm| relaxation::solve(comm, &config, 100))?;
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, ThermoplateError};

use super::comm::CommunicationBackend;
use super::convergence::max_change;
use super::grid::{GridStore, RowWindow};

/// State shared by all ranks of one in-process run.
pub struct ThreadWorld {
    num_ranks: usize,
    barrier: Barrier,
    reduce_slots: Mutex<Vec<f64>>,
    windows: Vec<RwLock<Option<RowWindow>>>,
    fetches: Vec<AtomicUsize>,
}

impl ThreadWorld {
    pub fn new(num_ranks: usize) -> Result<Arc<Self>> {
        if num_ranks == 0 {
            return Err(ThermoplateError::Runtime(
                "a process group needs at least one rank".into(),
            ));
        }
        Ok(Arc::new(Self {
            num_ranks,
            barrier: Barrier::new(num_ranks),
            reduce_slots: Mutex::new(vec![0.0; num_ranks]),
            windows: (0..num_ranks).map(|_| RwLock::new(None)).collect(),
            fetches: (0..num_ranks).map(|_| AtomicUsize::new(0)).collect(),
        }))
    }

    /// Run `body` once per rank on its own thread and collect the results in
    /// rank order. Returns once every rank has finished.
    pub fn run<T, F>(num_ranks: usize, body: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&ThreadComm) -> T + Sync,
    {
        let world = Self::new(num_ranks)?;
        world.run_ranks(body)
    }

    /// Like [`ThreadWorld::run`] on an existing world, so callers can inspect
    /// the fetch counters afterwards.
    pub fn run_ranks<T, F>(self: &Arc<Self>, body: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&ThreadComm) -> T + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_ranks)
            .thread_name(|index| format!("rank-{index}"))
            .build()
            .map_err(|e| ThermoplateError::Runtime(format!("failed to start rank threads: {e}")))?;

        tracing::debug!(num_ranks = self.num_ranks, "starting in-process ranks");
        let results = pool.broadcast(|ctx| {
            let comm = ThreadComm {
                rank: ctx.index(),
                world: Arc::clone(self),
            };
            body(&comm)
        });
        Ok(results)
    }

    /// Remote fetches issued by `rank` so far.
    pub fn fetch_count(&self, rank: usize) -> usize {
        self.fetches
            .get(rank)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }
}

/// One rank's handle on a [`ThreadWorld`].
pub struct ThreadComm {
    rank: usize,
    world: Arc<ThreadWorld>,
}

impl ThreadComm {
    /// Read-only handle on `peer`'s whole band.
    pub fn fetch_remote(&self, peer: usize) -> Result<RowWindow> {
        let slot = self
            .world
            .windows
            .get(peer)
            .ok_or(ThermoplateError::RankOutOfRange {
                rank: peer,
                num_ranks: self.world.num_ranks,
            })?;
        self.world.fetches[self.rank].fetch_add(1, Ordering::Relaxed);
        slot.read().clone().ok_or_else(|| {
            ThermoplateError::Runtime(format!("rank {peer} has not exposed its rows"))
        })
    }
}

impl CommunicationBackend for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_ranks(&self) -> usize {
        self.world.num_ranks
    }

    fn barrier(&self) {
        self.world.barrier.wait();
    }

    fn all_reduce_max(&self, local: f64) -> f64 {
        self.world.reduce_slots.lock()[self.rank] = local;
        // Every slot is written before anyone reads...
        self.world.barrier.wait();
        let global = self
            .world
            .reduce_slots
            .lock()
            .iter()
            .copied()
            .reduce(max_change)
            .unwrap_or(local);
        // ...and read before anyone writes the next round.
        self.world.barrier.wait();
        global
    }

    fn expose(&self, window: RowWindow) {
        *self.world.windows[self.rank].write() = Some(window);
    }

    fn fetch_row(&self, peer: usize, global_row: usize, _local: &GridStore) -> Result<Vec<f64>> {
        self.fetch_remote(peer)?.row(global_row)
    }
}
