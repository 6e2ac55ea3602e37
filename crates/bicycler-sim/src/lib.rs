//! Bicycler Simulation Library
//!
//! Runs the linearized bicycle model forward in time, records the result as a
//! [`Trajectory`] and persists it to a single archive file.

pub mod archive;
pub mod config;
pub mod sim;
pub mod sweep;
pub mod trajectory;

// Re-export main types
pub use archive::{Archive, Entry};
pub use config::{
    RunConfiguration, RunConfigurationBuilder, DEFAULT_STEPCOUNT, DEFAULT_TIMESTEP,
    DEFAULT_VELOCITY,
};
pub use sim::{simulate, Simulation, SimulationStatus, StepObserver, TracingObserver};
pub use sweep::{run_sweep, SweepOutcome, SweepSpec, SweepTarget};
pub use trajectory::{BikeAnimation, Trajectory};
