//! Distributed Jacobi relaxation for the steady-state heat equation.
//!
//! The plate is split into contiguous row bands, one per rank. Each rank
//! owns its band, reads the single adjacent row from each neighbor every
//! iteration, and the ranks agree on convergence through a max-reduction.

pub mod config;
pub mod error;
pub mod output;
pub mod solver;
pub mod stats;
