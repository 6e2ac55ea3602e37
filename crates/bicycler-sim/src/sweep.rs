//! One-dimensional sweeps over a physical parameter or the forward speed.

use std::fmt;

use bicycler_core::{params, BicycleModel, BicycleState, SimError, SimResult};

use crate::config::RunConfiguration;
use crate::sim::{Simulation, SimulationStatus};

/// Quantity varied across the runs of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepTarget {
    Velocity,
    /// A named physical constant, e.g. `w` or `mB`.
    Parameter(&'static str),
}

impl SweepTarget {
    /// `velocity` (or `v`) or any known parameter name.
    pub fn parse(name: &str) -> SimResult<Self> {
        if name == "velocity" || name == "v" {
            return Ok(Self::Velocity);
        }
        params::param_spec(name)
            .map(|spec| Self::Parameter(spec.name))
            .ok_or_else(|| {
                SimError::config(format!("cannot sweep unknown parameter \"{name}\""))
            })
    }
}

impl fmt::Display for SweepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Velocity => f.write_str("velocity"),
            Self::Parameter(name) => f.write_str(name),
        }
    }
}

/// Evenly spaced values `from..=to` over `steps` runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepSpec {
    pub target: SweepTarget,
    pub from: f64,
    pub to: f64,
    pub steps: usize,
}

impl SweepSpec {
    pub fn new(target: SweepTarget, from: f64, to: f64, steps: usize) -> SimResult<Self> {
        if steps == 0 {
            return Err(SimError::config("sweep needs at least one step"));
        }
        if !(from.is_finite() && to.is_finite()) {
            return Err(SimError::config(format!(
                "sweep range must be finite, got {from}..{to}"
            )));
        }
        Ok(Self {
            target,
            from,
            to,
            steps,
        })
    }

    pub fn values(&self) -> Vec<f64> {
        if self.steps == 1 {
            return vec![self.from];
        }
        let span = self.to - self.from;
        (0..self.steps)
            .map(|i| self.from + span * (i as f64 / (self.steps - 1) as f64))
            .collect()
    }
}

/// Summary of one run in a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    pub value: f64,
    /// Step at which the bicycle fell over, if it did.
    pub fell_at: Option<usize>,
    pub final_state: BicycleState,
}

impl SweepOutcome {
    pub fn fell(&self) -> bool {
        self.fell_at.is_some()
    }
}

/// Configuration for one point of the sweep.
pub fn configure(
    base: &RunConfiguration,
    target: SweepTarget,
    value: f64,
) -> SimResult<RunConfiguration> {
    match target {
        SweepTarget::Velocity => base.with_velocity(value),
        SweepTarget::Parameter(name) => {
            let mut params = *base.model().params();
            params.set(name, value)?;
            Ok(base.with_model(BicycleModel::new(params)?))
        }
    }
}

/// Run every point of `spec` against `base`, each with a fresh controller.
pub fn run_sweep(base: &RunConfiguration, spec: &SweepSpec) -> SimResult<Vec<SweepOutcome>> {
    let values = spec.values();
    let mut outcomes = Vec::with_capacity(values.len());

    for (i, value) in values.into_iter().enumerate() {
        let config = configure(base, spec.target, value)?;
        let mut simulation = Simulation::new(&config);
        let status = simulation.run()?;
        let trajectory = simulation.into_result()?;

        let fell_at = match status {
            SimulationStatus::Aborted { at_step } => Some(at_step),
            SimulationStatus::Completed | SimulationStatus::NotRun => None,
        };
        let final_state = trajectory.final_state().copied().unwrap_or_default();

        tracing::info!(
            run = i + 1,
            of = spec.steps,
            target = %spec.target,
            value,
            fell_at,
            "sweep run finished"
        );
        outcomes.push(SweepOutcome {
            value,
            fell_at,
            final_state,
        });
    }

    Ok(outcomes)
}
