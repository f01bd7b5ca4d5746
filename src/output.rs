//! Results output: the final run report and the assembled grid as CSV.

use std::io::Write;
use std::time::Duration;

use crate::error::Result;
use crate::solver::grid::Grid;

/// What the coordinating rank reports once the loop has ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    pub iterations: usize,
    pub global_dt: f64,
    pub converged: bool,
    pub num_ranks: usize,
    pub elapsed: Duration,
}

/// Write the final report.
///
/// Format:
/// ```text
/// Max error at iteration 3372 was 0.009995
/// Total time was 12.345678 seconds.
/// Ranks: 4, converged: true
/// ```
pub fn write_report<W: Write>(report: &RunReport, writer: &mut W) -> Result<()> {
    writeln!(writer)?;
    writeln!(
        writer,
        "Max error at iteration {} was {:.6}",
        report.iterations, report.global_dt
    )?;
    writeln!(
        writer,
        "Total time was {:.6} seconds.",
        report.elapsed.as_secs_f64()
    )?;
    writeln!(
        writer,
        "Ranks: {}, converged: {}",
        report.num_ranks, report.converged
    )?;
    Ok(())
}

/// Write the whole plate as CSV, one grid row per line, boundaries included.
///
/// Format:
/// ```csv
/// 0,0,0,0
/// 0,0.5,1.25,50
/// 0,25,50,100
/// ```
pub fn write_grid_csv<W: Write>(grid: &Grid, writer: &mut W) -> Result<()> {
    for row in grid.rows() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", line.join(","))?;
    }
    Ok(())
}
