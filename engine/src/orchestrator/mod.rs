//! Trajectory controller - main simulation loop
//!
//! Builds validated models, runs the Δt step loop, and aggregates outcomes
//! across replications.
//!
//! See `engine.rs` for the full implementation.

pub mod engine;

pub use engine::{
    ModelSettings, ReplicationSummary, SimulationError, StopReason, Trajectory, TrajectoryOutcome,
    run_replications,
};
