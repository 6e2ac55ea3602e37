//! Run configuration: everything one simulation needs, fixed up front.

use std::collections::BTreeMap;

use bicycler_core::{BicycleModel, BicycleState, ControlLaw, Controller, SimError, SimResult};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------
pub const DEFAULT_VELOCITY: f64 = 4.0; // m/s
pub const DEFAULT_TIMESTEP: f64 = 0.01; // s
pub const DEFAULT_STEPCOUNT: usize = 500;

/// Immutable inputs of one simulation run.
///
/// The controller stored here is a prototype: every
/// [`Simulation`](crate::sim::Simulation) clones its own instance, so one
/// configuration can drive any number of runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfiguration {
    model: BicycleModel,
    initial_state: BicycleState,
    velocity: f64,
    controller: Controller,
    timestep: f64,
    stepcount: usize,
}

impl RunConfiguration {
    /// Validate and bundle the run inputs.
    pub fn new(
        model: BicycleModel,
        initial_state: BicycleState,
        velocity: f64,
        controller: Controller,
        timestep: f64,
        stepcount: usize,
    ) -> SimResult<Self> {
        if !velocity.is_finite() {
            return Err(SimError::config(format!(
                "velocity must be finite, got {velocity}"
            )));
        }
        if !(timestep.is_finite() && timestep > 0.0) {
            return Err(SimError::config(format!(
                "timestep must be a positive number of seconds, got {timestep}"
            )));
        }
        if stepcount == 0 {
            return Err(SimError::config("stepcount must be at least 1"));
        }
        if initial_state.to_row().iter().any(|v| !v.is_finite()) {
            return Err(SimError::config(format!(
                "initial state must be finite, got {initial_state:?}"
            )));
        }

        Ok(Self {
            model,
            initial_state,
            velocity,
            controller,
            timestep,
            stepcount,
        })
    }

    pub fn builder(initial_state: BicycleState) -> RunConfigurationBuilder {
        RunConfigurationBuilder::new(initial_state)
    }

    pub fn model(&self) -> &BicycleModel {
        &self.model
    }

    pub fn initial_state(&self) -> &BicycleState {
        &self.initial_state
    }

    /// Forward speed in m/s, constant for the whole run.
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Integration step in seconds.
    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn stepcount(&self) -> usize {
        self.stepcount
    }

    /// Copy of this configuration with a different model.
    pub fn with_model(&self, model: BicycleModel) -> Self {
        Self {
            model,
            ..self.clone()
        }
    }

    /// Copy of this configuration with a different forward speed.
    pub fn with_velocity(&self, velocity: f64) -> SimResult<Self> {
        Self::new(
            self.model.clone(),
            self.initial_state,
            velocity,
            self.controller.clone(),
            self.timestep,
            self.stepcount,
        )
    }

    /// Human-readable summary stored as trajectory metadata.
    pub fn description(&self) -> BTreeMap<String, String> {
        let mut description = BTreeMap::new();

        let non_default = self.model.params().non_default_values();
        let model = if non_default.is_empty() {
            "default".to_string()
        } else {
            let values: Vec<String> = non_default
                .iter()
                .map(|(name, value)| format!("{name}:{value:?}"))
                .collect();
            format!("custom ({})", values.join(", "))
        };
        description.insert("bicycle_model".to_string(), model);

        description.insert(
            "initial_state".to_string(),
            format!(
                "roll: {:?}°, steer: {:?}°",
                round3(self.initial_state.roll.to_degrees()),
                round3(self.initial_state.steer.to_degrees())
            ),
        );
        description.insert(
            "bicycle_velocity".to_string(),
            format!("{:?} m/s", self.velocity),
        );

        let params = self.controller.parameters();
        let controller = if params.is_empty() {
            self.controller.name().to_string()
        } else {
            let values: Vec<String> = params.iter().map(|(k, v)| format!("{k}:{v}")).collect();
            format!("{} ({})", self.controller.name(), values.join(", "))
        };
        description.insert("controller".to_string(), controller);

        description.insert(
            "timestep".to_string(),
            format!("{:?}ms", round3(self.timestep * 1000.0)),
        );
        description.insert("stepcount".to_string(), self.stepcount.to_string());

        description
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder with the stock defaults: benchmark bicycle, 4 m/s, no control,
/// 10 ms steps, 500 steps.
#[derive(Debug, Clone)]
pub struct RunConfigurationBuilder {
    model: Option<BicycleModel>,
    initial_state: BicycleState,
    velocity: f64,
    controller: Controller,
    timestep: f64,
    stepcount: usize,
}

impl RunConfigurationBuilder {
    pub fn new(initial_state: BicycleState) -> Self {
        Self {
            model: None,
            initial_state,
            velocity: DEFAULT_VELOCITY,
            controller: Controller::default(),
            timestep: DEFAULT_TIMESTEP,
            stepcount: DEFAULT_STEPCOUNT,
        }
    }

    pub fn model(mut self, model: BicycleModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn velocity(mut self, velocity: f64) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn controller(mut self, controller: Controller) -> Self {
        self.controller = controller;
        self
    }

    pub fn timestep(mut self, timestep: f64) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn stepcount(mut self, stepcount: usize) -> Self {
        self.stepcount = stepcount;
        self
    }

    pub fn build(self) -> SimResult<RunConfiguration> {
        let model = match self.model {
            Some(model) => model,
            None => BicycleModel::benchmark()?,
        };
        RunConfiguration::new(
            model,
            self.initial_state,
            self.velocity,
            self.controller,
            self.timestep,
            self.stepcount,
        )
    }
}
