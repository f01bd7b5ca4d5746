use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thermoplate::config::PlateConfig;
use thermoplate::error::Result;
use thermoplate::output::{self, RunReport};
use thermoplate::solver::comm::CommunicationBackend;
use thermoplate::solver::comm_threads::ThreadWorld;
use thermoplate::solver::grid::{Grid, GridStore};
use thermoplate::solver::{Relaxation, RelaxationOutcome};
use thermoplate::stats::Stats;

/// Distributed Jacobi relaxation of a heated plate
#[derive(Parser)]
#[command(name = "thermoplate", version)]
struct Cli {
    /// Iteration budget
    max_iterations: usize,

    /// Number of in-process ranks
    #[arg(long, default_value_t = 1)]
    ranks: usize,

    /// TOML file with plate settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interior rows (overrides the config file)
    #[arg(long)]
    rows: Option<usize>,

    /// Interior columns (overrides the config file)
    #[arg(long)]
    columns: Option<usize>,

    /// Peak boundary temperature (overrides the config file)
    #[arg(long)]
    peak: Option<f64>,

    /// Convergence threshold on the largest per-cell change
    #[arg(long)]
    tolerance: Option<f64>,

    /// Log the diagonal every N iterations (0 disables)
    #[arg(long)]
    progress_interval: Option<usize>,

    /// Write the final grid as CSV (in-process ranks only)
    #[arg(long)]
    grid_csv: Option<PathBuf>,

    /// Print performance stats to stderr
    #[arg(long)]
    stats: bool,

    /// Run one rank per MPI process instead of in-process ranks
    #[cfg(feature = "distributed")]
    #[arg(long)]
    mpi: bool,
}

impl Cli {
    fn plate_config(&self) -> Result<PlateConfig> {
        let mut config = match &self.config {
            Some(path) => PlateConfig::load(path)?,
            None => PlateConfig::default(),
        };
        if let Some(rows) = self.rows {
            config.rows = rows;
        }
        if let Some(columns) = self.columns {
            config.columns = columns;
        }
        if let Some(peak) = self.peak {
            config.peak = peak;
        }
        if let Some(tolerance) = self.tolerance {
            config.max_temp_error = tolerance;
        }
        if let Some(interval) = self.progress_interval {
            config.progress_interval = interval;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() {
    let start = Instant::now();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = cli.plate_config().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    #[cfg(feature = "distributed")]
    {
        if cli.mpi {
            run_mpi(&cli, &config, start);
            return;
        }
    }

    run_in_process(&cli, &config, start);
}

/// Everything one rank does between bootstrap and teardown.
fn run_rank(
    comm: &dyn CommunicationBackend,
    cli: &Cli,
    config: &PlateConfig,
) -> (Result<RelaxationOutcome>, Option<Stats>) {
    tracing::info!(
        iterations = cli.max_iterations,
        ranks = comm.num_ranks(),
        my_rank = comm.rank(),
        "rank starting"
    );
    let mut stats = (cli.stats && comm.rank() == 0).then(Stats::new);

    let init_start = Instant::now();
    let relaxation = match Relaxation::new(comm, config) {
        Ok(relaxation) => relaxation,
        Err(e) => return (Err(e), stats),
    };
    if let Some(ref mut stats) = stats {
        stats.add_phase("Initialization", init_start.elapsed());
    }

    let loop_start = Instant::now();
    let outcome = relaxation.run(cli.max_iterations, stats.as_mut());
    if let Some(ref mut stats) = stats {
        stats.add_phase("Relaxation", loop_start.elapsed());
    }
    (outcome, stats)
}

fn run_in_process(cli: &Cli, config: &PlateConfig, start: Instant) {
    let results = ThreadWorld::run(cli.ranks, |comm| run_rank(comm, cli, config))
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    let mut outcomes = Vec::with_capacity(results.len());
    let mut stats = None;
    for (outcome, rank_stats) in results {
        let outcome = outcome.unwrap_or_else(|e| {
            eprintln!("Relaxation error: {}", e);
            std::process::exit(1);
        });
        stats = stats.or(rank_stats);
        outcomes.push(outcome);
    }

    let first = &outcomes[0];
    let report = RunReport {
        iterations: first.iterations,
        global_dt: first.global_dt,
        converged: first.converged,
        num_ranks: cli.ranks,
        elapsed: start.elapsed(),
    };
    output::write_report(&report, &mut io::stdout()).unwrap_or_else(|e| {
        eprintln!("Output error: {}", e);
        std::process::exit(1);
    });

    if let Some(path) = &cli.grid_csv {
        let stores: Vec<GridStore> = outcomes.into_iter().map(|o| o.store).collect();
        write_grid(path, &stores).unwrap_or_else(|e| {
            eprintln!("Output error: {}", e);
            std::process::exit(1);
        });
    }

    if let Some(ref stats) = stats {
        stats.display();
    }
}

fn write_grid(path: &Path, stores: &[GridStore]) -> Result<()> {
    let grid = Grid::assemble(stores)?;
    let mut file = io::BufWriter::new(std::fs::File::create(path)?);
    output::write_grid_csv(&grid, &mut file)
}

#[cfg(feature = "distributed")]
fn run_mpi(cli: &Cli, config: &PlateConfig, start: Instant) {
    use thermoplate::solver::comm_mpi::MpiComm;

    let _universe = mpi::initialize().unwrap_or_else(|| {
        eprintln!("Error: MPI initialization failed");
        std::process::exit(1);
    });
    let comm = MpiComm::new();
    if cli.ranks != 1 {
        tracing::warn!(ranks = cli.ranks, "--ranks is ignored under --mpi");
    }

    let (outcome, stats) = run_rank(&comm, cli, config);
    let outcome = outcome.unwrap_or_else(|e| {
        eprintln!("Relaxation error on rank {}: {}", comm.rank(), e);
        std::process::exit(1);
    });

    if comm.rank() == 0 {
        let report = RunReport {
            iterations: outcome.iterations,
            global_dt: outcome.global_dt,
            converged: outcome.converged,
            num_ranks: comm.num_ranks(),
            elapsed: start.elapsed(),
        };
        output::write_report(&report, &mut io::stdout()).unwrap_or_else(|e| {
            eprintln!("Output error: {}", e);
            std::process::exit(1);
        });
        if cli.grid_csv.is_some() {
            eprintln!("--grid-csv is not supported under --mpi; skipping");
        }
        if let Some(ref stats) = stats {
            stats.display();
        }
    }
}
