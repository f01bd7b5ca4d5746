//! The relaxation loop: initialize, then exchange / sweep / reduce until
//! converged or out of iterations.
//!
//! Every rank runs this same code in lockstep. One iteration is:
//!
//! 1. fetch the halo row from each existing neighbor;
//! 2. barrier, so no rank commits while a neighbor may still be reading;
//! 3. sweep the band into scratch space (Jacobi: reads only the last generation);
//! 4. commit the scratch rows and measure `local_dt`;
//! 5. barrier;
//! 6. max-reduce `local_dt` into `global_dt`, the same value on every rank.
//!
//! The loop stops once `global_dt <= max_temp_error` or the iteration budget
//! is spent. Running out of budget is a normal outcome, not an error.

use std::time::{Duration, Instant};

use crate::config::PlateConfig;
use crate::error::{Result, ThermoplateError};
use crate::stats::Stats;

use super::comm::CommunicationBackend;
use super::convergence;
use super::grid::{GridShape, GridStore};
use super::halo;
use super::init;
use super::partition::{Neighbors, RowPartition};
use super::stencil::{self, Sweep};

/// Final state of one rank after the loop ends.
#[derive(Debug)]
pub struct RelaxationOutcome {
    /// Iterations actually performed.
    pub iterations: usize,
    /// `global_dt` of the last iteration.
    pub global_dt: f64,
    pub converged: bool,
    /// This rank's band of the final grid.
    pub store: GridStore,
}

/// One rank's relaxation state.
pub struct Relaxation<'c> {
    comm: &'c dyn CommunicationBackend,
    config: PlateConfig,
    neighbors: Neighbors,
    store: GridStore,
    sweep: Sweep,
    iteration: usize,
    global_dt: Option<f64>,
}

impl<'c> Relaxation<'c> {
    /// Partition the plate, allocate and initialize this rank's band, expose
    /// it to the peers and wait for every rank to do the same.
    pub fn new(comm: &'c dyn CommunicationBackend, config: &PlateConfig) -> Result<Self> {
        config.validate()?;
        let rank = comm.rank();
        let partition = RowPartition::new(config.rows, comm.num_ranks())?;
        let range = partition.range(rank)?;
        let neighbors = partition.neighbors(rank)?;
        let shape = GridShape::new(config.rows, config.columns);

        tracing::debug!(
            rank,
            first = range.first,
            last = range.last,
            neighbors = neighbors.len(),
            remainder = partition.remainder(),
            "band assigned"
        );

        let store = GridStore::new(shape, range);
        init::initialize(&store, config.peak);
        comm.expose(store.window());
        comm.barrier();

        Ok(Self {
            comm,
            config: config.clone(),
            neighbors,
            sweep: Sweep::for_band(shape, range),
            store,
            iteration: 0,
            global_dt: None,
        })
    }

    pub fn store(&self) -> &GridStore {
        &self.store
    }

    /// Iterations completed so far.
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    /// `global_dt` of the most recent iteration, `None` before the first.
    pub fn global_dt(&self) -> Option<f64> {
        self.global_dt
    }

    /// Perform one full iteration and return its `global_dt`.
    ///
    /// Collective: every rank must call `step` the same number of times.
    pub fn step(&mut self, mut stats: Option<&mut Stats>) -> Result<f64> {
        let iteration = self.iteration + 1;
        let _span = tracing::debug_span!("iteration", iteration).entered();
        let mut clock = stats.as_ref().map(|_| Instant::now());

        let halos = halo::exchange(self.comm, &self.store, &self.neighbors)?;
        let fetched = halos.len();
        self.comm.barrier();
        lap(&mut stats, &mut clock, |s| &mut s.exchange);

        stencil::sweep(&self.store, &halos, &mut self.sweep)?;
        drop(halos);
        lap(&mut stats, &mut clock, |s| &mut s.stencil);

        let local_dt = convergence::commit(&self.store, &self.sweep);
        lap(&mut stats, &mut clock, |s| &mut s.commit);

        self.comm.barrier();
        let global_dt = convergence::reduce(self.comm, local_dt);
        lap(&mut stats, &mut clock, |s| &mut s.synchronization);

        if let Some(stats) = stats {
            stats.iterations += 1;
            stats.halo_rows_fetched += fetched;
        }

        self.iteration = iteration;
        self.global_dt = Some(global_dt);
        self.track_progress();
        Ok(global_dt)
    }

    /// Iterate until `global_dt <= max_temp_error` or `max_iterations`
    /// iterations have run.
    pub fn run(
        mut self,
        max_iterations: usize,
        mut stats: Option<&mut Stats>,
    ) -> Result<RelaxationOutcome> {
        if max_iterations == 0 {
            return Err(ThermoplateError::Config(
                "iteration budget must be at least 1".into(),
            ));
        }
        let _span = tracing::info_span!(
            "relaxation",
            rank = self.comm.rank(),
            num_ranks = self.comm.num_ranks(),
            max_iterations
        )
        .entered();

        let threshold = self.config.max_temp_error;
        let global_dt = loop {
            let global_dt = self.step(stats.as_deref_mut())?;
            if global_dt <= threshold || self.iteration >= max_iterations {
                break global_dt;
            }
        };

        let converged = global_dt <= threshold;
        if converged {
            tracing::info!(iterations = self.iteration, global_dt, "relaxation converged");
        } else {
            tracing::info!(
                iterations = self.iteration,
                global_dt,
                threshold,
                "iteration budget exhausted before convergence"
            );
        }

        Ok(RelaxationOutcome {
            iterations: self.iteration,
            global_dt,
            converged,
            store: self.store,
        })
    }

    /// Log the owned part of the bottom-right diagonal, where the plate
    /// changes most, every `progress_interval` iterations.
    fn track_progress(&self) {
        let interval = self.config.progress_interval;
        if interval == 0 || self.iteration % interval != 0 {
            return;
        }
        let rows = self.config.rows;
        let range = self.store.range();
        for i in rows.saturating_sub(5).max(1)..=rows {
            if !range.contains(i) || i >= self.store.width() {
                continue;
            }
            if let Ok(temperature) = self.store.get(i, i) {
                tracing::info!(iteration = self.iteration, cell = i, temperature, "progress");
            }
        }
    }
}

/// Initialize and relax in one call.
pub fn solve(
    comm: &dyn CommunicationBackend,
    config: &PlateConfig,
    max_iterations: usize,
) -> Result<RelaxationOutcome> {
    Relaxation::new(comm, config)?.run(max_iterations, None)
}

/// Charge the time since the last lap to one `Stats` field.
fn lap(
    stats: &mut Option<&mut Stats>,
    clock: &mut Option<Instant>,
    field: impl FnOnce(&mut Stats) -> &mut Duration,
) {
    if let (Some(stats), Some(start)) = (stats.as_deref_mut(), clock.as_mut()) {
        let now = Instant::now();
        *field(stats) += now - *start;
        *start = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::comm::SingleProcessComm;
    use approx::assert_abs_diff_eq;

    fn small_config(rows: usize, columns: usize) -> PlateConfig {
        PlateConfig {
            progress_interval: 0,
            ..PlateConfig::with_size(rows, columns)
        }
    }

    #[test]
    fn one_iteration_matches_hand_computation() {
        let comm = SingleProcessComm;
        let outcome = solve(&comm, &small_config(4, 4), 1).unwrap();

        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.global_dt, 50.0);
        assert!(!outcome.converged);
        assert_eq!(outcome.store.row(4).unwrap(), vec![0.0, 6.25, 12.5, 18.75, 50.0, 100.0]);
        assert_eq!(outcome.store.get(2, 4).unwrap(), 12.5);
        assert_eq!(outcome.store.get(2, 2).unwrap(), 0.0);
    }

    #[test]
    fn boundaries_never_change() {
        let comm = SingleProcessComm;
        let config = small_config(5, 3);
        let outcome = solve(&comm, &config, 20).unwrap();
        let shape = GridShape::new(5, 3);

        for row in 0..=6 {
            for column in [0, 4] {
                assert_eq!(
                    outcome.store.get(row, column).unwrap(),
                    init::initial_temperature(shape, config.peak, row, column)
                );
            }
        }
        for column in 0..=4 {
            assert_eq!(outcome.store.get(0, column).unwrap(), 0.0);
            assert_eq!(
                outcome.store.get(6, column).unwrap(),
                init::initial_temperature(shape, config.peak, 6, column)
            );
        }
    }

    #[test]
    fn zero_peak_converges_immediately() {
        let comm = SingleProcessComm;
        let config = PlateConfig {
            peak: 0.0,
            ..small_config(6, 6)
        };
        let outcome = solve(&comm, &config, 50).unwrap();
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.global_dt, 0.0);
        assert!(outcome.converged);
    }

    #[test]
    fn harmonic_plate_is_a_fixed_point() {
        // On a square plate, T = peak * i * j / (n * (n + 1)) matches every
        // boundary and is discretely harmonic.
        let n = 6;
        let comm = SingleProcessComm;
        let config = small_config(n, n);
        let mut relaxation = Relaxation::new(&comm, &config).unwrap();
        let k = config.peak / (n * (n + 1)) as f64;
        relaxation
            .store()
            .fill_with(|i, j| k * i as f64 * j as f64);

        let global_dt = relaxation.step(None).unwrap();
        assert_abs_diff_eq!(global_dt, 0.0, epsilon = 1e-12);
        assert_eq!(relaxation.global_dt(), Some(global_dt));
    }

    #[test]
    fn global_dt_is_non_negative_and_budget_is_respected() {
        let comm = SingleProcessComm;
        let config = PlateConfig {
            max_temp_error: 0.0,
            ..small_config(8, 5)
        };
        let mut relaxation = Relaxation::new(&comm, &config).unwrap();
        for _ in 0..10 {
            assert!(relaxation.step(None).unwrap() >= 0.0);
        }
        assert_eq!(relaxation.iterations(), 10);

        let outcome = solve(&comm, &config, 7).unwrap();
        assert_eq!(outcome.iterations, 7);
        assert!(!outcome.converged);
    }

    #[test]
    fn loose_threshold_stops_early() {
        let comm = SingleProcessComm;
        let config = PlateConfig {
            max_temp_error: 1.0,
            ..small_config(10, 10)
        };
        let outcome = solve(&comm, &config, 10_000).unwrap();
        assert!(outcome.converged);
        assert!(outcome.global_dt <= 1.0);
        assert!(outcome.iterations < 10_000);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let comm = SingleProcessComm;
        let err = solve(&comm, &small_config(4, 4), 0).unwrap_err();
        assert!(matches!(err, ThermoplateError::Config(_)));
    }

    #[test]
    fn stats_count_iterations() {
        let comm = SingleProcessComm;
        let mut stats = Stats::new();
        let outcome = Relaxation::new(&comm, &small_config(4, 4))
            .unwrap()
            .run(3, Some(&mut stats))
            .unwrap();
        assert_eq!(stats.iterations, outcome.iterations);
        assert_eq!(stats.halo_rows_fetched, 0);
    }
}
