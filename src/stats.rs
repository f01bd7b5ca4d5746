//! Timing counters behind `--stats`.

use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Wall-clock breakdown of one rank's run.
///
/// Only rank 0 creates one; the solver receives it as `Option<&mut Stats>`
/// and skips every clock read when it is `None`.
pub struct Stats {
    total_start: Instant,
    phases: Vec<(&'static str, Duration)>,
    pub iterations: usize,
    pub halo_rows_fetched: usize,
    pub exchange: Duration,
    pub stencil: Duration,
    pub commit: Duration,
    pub synchronization: Duration,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            iterations: 0,
            halo_rows_fetched: 0,
            exchange: Duration::ZERO,
            stencil: Duration::ZERO,
            commit: Duration::ZERO,
            synchronization: Duration::ZERO,
        }
    }

    /// Record a completed top-level phase.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        self.phases.push((name, duration));
    }

    /// Time spent inside iterations, summed over the four loop phases.
    pub fn loop_time(&self) -> Duration {
        self.exchange + self.stencil + self.commit + self.synchronization
    }

    /// Print the table to stderr.
    pub fn display(&self) {
        // stderr is the last resort; nothing sensible to do if it fails
        let _ = self.write_table(&mut io::stderr().lock());
    }

    /// Render the table: top-level phases first, then each loop phase with
    /// its total, its mean per iteration, and its share of the loop.
    pub fn write_table<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "thermoplate stats (rank 0)")?;
        for (name, dur) in &self.phases {
            writeln!(out, "{:<16}{:>12.6}s", name, dur.as_secs_f64())?;
        }

        if self.iterations > 0 {
            let loop_secs = self.loop_time().as_secs_f64();
            writeln!(
                out,
                "{:<16}{:>13}{:>16}{:>8}",
                "phase", "total", "per iteration", "share"
            )?;
            let rows = [
                ("exchange", self.exchange),
                ("stencil", self.stencil),
                ("commit", self.commit),
                ("sync+reduce", self.synchronization),
            ];
            for (name, dur) in rows {
                let secs = dur.as_secs_f64();
                let share = if loop_secs > 0.0 {
                    100.0 * secs / loop_secs
                } else {
                    0.0
                };
                writeln!(
                    out,
                    "{:<16}{:>12.6}s{:>14.3}us{:>7.1}%",
                    name,
                    secs,
                    1e6 * secs / self.iterations as f64,
                    share
                )?;
            }
            writeln!(
                out,
                "{} iterations, {} halo rows fetched ({:.1} per iteration)",
                self.iterations,
                self.halo_rows_fetched,
                self.halo_rows_fetched as f64 / self.iterations as f64
            )?;
        }

        writeln!(
            out,
            "elapsed {:.6}s",
            self.total_start.elapsed().as_secs_f64()
        )
    }
}
