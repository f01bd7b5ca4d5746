//! Multi-rank relaxation tests on the in-process runtime.
//!
//! Every scenario is compared against the same plate relaxed by a single
//! rank: the partitioning must not change a single bit of the result.

use approx::assert_abs_diff_eq;
use thermoplate::config::PlateConfig;
use thermoplate::solver::comm::{CommunicationBackend, SingleProcessComm};
use thermoplate::solver::comm_threads::ThreadWorld;
use thermoplate::solver::grid::{Grid, GridStore};
use thermoplate::solver::init::initial_temperature;
use thermoplate::solver::{solve, Relaxation, RelaxationOutcome};

fn plate(rows: usize, columns: usize) -> PlateConfig {
    PlateConfig {
        progress_interval: 0,
        ..PlateConfig::with_size(rows, columns)
    }
}

/// Helper: relax on `num_ranks` in-process ranks, return every rank's outcome.
fn relax(num_ranks: usize, config: &PlateConfig, max_iterations: usize) -> Vec<RelaxationOutcome> {
    ThreadWorld::run(num_ranks, |comm| solve(comm, config, max_iterations))
        .expect("rank threads failed to start")
        .into_iter()
        .map(|outcome| outcome.expect("relaxation failed"))
        .collect()
}

fn assemble(outcomes: Vec<RelaxationOutcome>) -> Grid {
    let stores: Vec<GridStore> = outcomes.into_iter().map(|o| o.store).collect();
    Grid::assemble(&stores).expect("bands do not tile the grid")
}

/// Helper: initialize on `num_ranks` ranks without iterating.
fn initialized(num_ranks: usize, config: &PlateConfig) -> Grid {
    let stores = ThreadWorld::run(num_ranks, |comm| {
        let relaxation = Relaxation::new(comm, config).expect("init failed");
        let store = relaxation.store();
        let copy = GridStore::new(store.shape(), store.range());
        store.with_cells(|src| copy.with_cells_mut(|dst| dst.copy_from_slice(src)));
        copy
    })
    .unwrap();
    Grid::assemble(&stores).unwrap()
}

// ── Initialization ──────────────────────────────────────────────────

#[test]
fn test_initialization_is_partition_independent() {
    let config = plate(10, 7);
    let reference = initialized(1, &config);
    for num_ranks in [2, 3, 4, 5, 12] {
        assert_eq!(
            initialized(num_ranks, &config),
            reference,
            "{num_ranks} ranks changed the initial grid"
        );
    }
}

#[test]
fn test_initial_boundaries() {
    let config = plate(4, 4);
    let grid = initialized(3, &config);
    let shape = grid.shape();
    for row in 0..=5 {
        for column in 0..=5 {
            assert_eq!(
                grid.get(row, column),
                initial_temperature(shape, 100.0, row, column)
            );
        }
    }
    assert_eq!(grid.row(5), &[0.0, 25.0, 50.0, 75.0, 100.0, 125.0]);
    assert_eq!(grid.get(3, 5), 75.0);
    assert_eq!(grid.get(3, 0), 0.0);
}

// ── One iteration by hand ───────────────────────────────────────────

#[test]
fn test_first_iteration_four_by_four() {
    for num_ranks in [1, 2, 3] {
        let outcomes = relax(num_ranks, &plate(4, 4), 1);
        assert!(outcomes.iter().all(|o| o.iterations == 1));
        assert!(outcomes.iter().all(|o| o.global_dt == 50.0));

        let grid = assemble(outcomes);
        let expected_interior = [
            [0.0, 0.0, 0.0, 6.25],
            [0.0, 0.0, 0.0, 12.5],
            [0.0, 0.0, 0.0, 18.75],
            [6.25, 12.5, 18.75, 50.0],
        ];
        for (i, expected) in expected_interior.iter().enumerate() {
            assert_eq!(&grid.row(i + 1)[1..5], expected, "row {}", i + 1);
        }
    }
}

// ── Reduction and partition equivalence ─────────────────────────────

#[test]
fn test_multi_rank_matches_single_rank() {
    let config = PlateConfig {
        max_temp_error: 0.0,
        ..plate(10, 9)
    };
    let reference = relax(1, &config, 25);
    let reference_dt = reference[0].global_dt;
    let reference_grid = assemble(reference);

    // 12 grid rows: 2, 3 and 4 divide evenly, 5 leaves a remainder.
    for num_ranks in [2, 3, 4, 5] {
        let outcomes = relax(num_ranks, &config, 25);
        for outcome in &outcomes {
            assert_eq!(outcome.iterations, 25);
            assert_eq!(outcome.global_dt, reference_dt, "{num_ranks} ranks");
        }
        assert_eq!(assemble(outcomes), reference_grid, "{num_ranks} ranks");
    }
}

#[test]
fn test_every_rank_sees_the_same_global_dt_each_iteration() {
    let config = plate(9, 6);
    let histories = ThreadWorld::run(3, |comm| {
        let mut relaxation = Relaxation::new(comm, &config).unwrap();
        (0..15)
            .map(|_| relaxation.step(None).unwrap())
            .collect::<Vec<f64>>()
    })
    .unwrap();

    assert_eq!(histories[0], histories[1]);
    assert_eq!(histories[1], histories[2]);
    assert!(histories[0].iter().all(|&dt| dt >= 0.0));
}

#[test]
fn test_converges_with_remainder_partition() {
    let config = PlateConfig {
        max_temp_error: 0.5,
        ..plate(9, 9)
    };
    let single = relax(1, &config, 5_000);
    let split = relax(3, &config, 5_000);

    assert!(single[0].converged);
    assert!(split.iter().all(|o| o.converged));
    assert_eq!(split[0].iterations, single[0].iterations);
    assert!(split[2].global_dt <= 0.5);
}

// ── Fixed points and termination ────────────────────────────────────

#[test]
fn test_harmonic_plate_is_fixed_point_on_four_ranks() {
    let n = 10;
    let config = plate(n, n);
    let k = config.peak / (n * (n + 1)) as f64;
    let results = ThreadWorld::run(4, |comm| {
        let mut relaxation = Relaxation::new(comm, &config).unwrap();
        relaxation.store().fill_with(|i, j| k * i as f64 * j as f64);
        comm.barrier();
        relaxation.step(None).unwrap()
    })
    .unwrap();

    for global_dt in results {
        assert_abs_diff_eq!(global_dt, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn test_budget_bounds_iterations() {
    let config = PlateConfig {
        max_temp_error: 0.0,
        ..plate(6, 6)
    };
    for budget in [1, 2, 17] {
        let outcomes = relax(2, &config, budget);
        assert!(outcomes.iter().all(|o| o.iterations == budget));
        assert!(outcomes.iter().all(|o| !o.converged));
        assert!(outcomes.iter().all(|o| o.global_dt > 0.0));
    }
}

#[test]
fn test_one_rank_per_grid_row() {
    // Ranks 0 and 5 hold only a boundary row and update nothing.
    let config = plate(4, 3);
    let reference = assemble(relax(1, &config, 6));
    assert_eq!(assemble(relax(6, &config, 6)), reference);
}

#[test]
fn test_single_process_comm_matches_one_thread_rank() {
    let config = plate(5, 5);
    let threaded = relax(1, &config, 9);
    let single = solve(&SingleProcessComm, &config, 9).unwrap();
    assert_eq!(single.global_dt, threaded[0].global_dt);
    assert_eq!(
        Grid::assemble(&[single.store]).unwrap(),
        assemble(threaded)
    );
}

// ── Halo traffic ────────────────────────────────────────────────────

#[test]
fn test_boundary_ranks_fetch_once_interior_twice() {
    // 11 grid rows over 3 ranks: 3 + 3 + 5 (last rank takes the remainder).
    let config = PlateConfig {
        max_temp_error: 0.0,
        ..plate(9, 4)
    };
    let world = ThreadWorld::new(3).unwrap();
    let iterations = 4;
    let outcomes = world
        .run_ranks(|comm| {
            let rank = comm.rank();
            let outcome = solve(comm, &config, iterations).unwrap();
            (rank, outcome.store.range())
        })
        .unwrap();

    assert_eq!(outcomes[2].1.first, 6);
    assert_eq!(outcomes[2].1.last, 10);
    assert_eq!(world.fetch_count(0), iterations);
    assert_eq!(world.fetch_count(1), 2 * iterations);
    assert_eq!(world.fetch_count(2), iterations);
}

#[test]
fn test_too_many_ranks_is_rejected_on_every_rank() {
    let config = plate(2, 2);
    let results = ThreadWorld::run(5, |comm| solve(comm, &config, 1).is_err()).unwrap();
    assert_eq!(results, vec![true; 5]);
}
