//! Distributed relaxation engine.
//!
//! Leaves first: `partition` and `grid` (storage), `init`, `halo`,
//! `stencil`, `convergence`, then `relaxation` which drives them over a
//! `comm::CommunicationBackend`.

pub mod comm;
#[cfg(feature = "distributed")]
pub mod comm_mpi;
pub mod comm_threads;
pub mod convergence;
pub mod grid;
pub mod halo;
pub mod init;
pub mod partition;
pub mod relaxation;
pub mod stencil;

pub use relaxation::{solve, Relaxation, RelaxationOutcome};
