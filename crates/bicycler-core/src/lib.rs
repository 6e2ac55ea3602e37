//! # Bicycler Core
//!
//! The physics side of the bicycle stability simulator:
//! - Physical parameters of the Whipple benchmark bicycle
//! - The linearized lean/steer coefficient matrices
//! - The six-scalar bicycle state
//! - Steering controllers

pub mod controller;
pub mod error;
pub mod model;
pub mod params;
pub mod state;

// Re-export core types
pub use controller::{BicycleControl, ControlLaw, Controller, DEFAULT_PID_WINDOW};
pub use error::{SimError, SimResult};
pub use model::BicycleModel;
pub use params::{parse_override, parse_overrides, BicycleParams, ParamSpec, PARAMETERS};
pub use state::{BicycleState, COLUMN_NAMES, STATE_COLUMNS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
