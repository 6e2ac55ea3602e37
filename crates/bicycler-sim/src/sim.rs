//! Fixed-step integrator for the linearized lean/steer equations.

use bicycler_core::{BicycleState, ControlLaw, Controller, SimError, SimResult};
use nalgebra::Vector2;

use crate::config::RunConfiguration;
use crate::trajectory::Trajectory;

/// Lifecycle of a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationStatus {
    NotRun,
    /// Every step was integrated.
    Completed,
    /// The bicycle fell over at `at_step`; later rows repeat that row.
    Aborted { at_step: usize },
}

impl SimulationStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::NotRun)
    }
}

/// Per-step diagnostics sink.
pub trait StepObserver {
    fn on_step(&mut self, step: usize, state: &BicycleState);

    fn on_abort(&mut self, _step: usize, _state: &BicycleState) {}
}

/// Observer that forwards every step to `tracing` at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StepObserver for TracingObserver {
    fn on_step(&mut self, step: usize, state: &BicycleState) {
        tracing::trace!(
            step,
            roll = state.roll,
            steer = state.steer,
            roll_rate = state.roll_rate,
            steer_rate = state.steer_rate,
            steer_torque = state.steer_torque,
            heading = state.heading,
            "step"
        );
    }

    fn on_abort(&mut self, step: usize, state: &BicycleState) {
        tracing::info!(step, roll = state.roll, steer = state.steer, "bicycle fell over");
    }
}

/// One run of a [`RunConfiguration`]. `run` may be called once.
pub struct Simulation<'a> {
    config: &'a RunConfiguration,
    controller: Controller,
    result: Trajectory,
    status: SimulationStatus,
    observer: Option<Box<dyn StepObserver + 'a>>,
}

impl<'a> Simulation<'a> {
    pub fn new(config: &'a RunConfiguration) -> Self {
        let mut controller = config.controller().clone();
        controller.reset();
        Self {
            config,
            controller,
            result: Trajectory::new(config.timestep(), config.stepcount()),
            status: SimulationStatus::NotRun,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: impl StepObserver + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    /// Integrate every step, or until the bicycle falls over.
    pub fn run(&mut self) -> SimResult<SimulationStatus> {
        if self.status.is_finished() {
            return Err(SimError::invalid_state("simulation has already been run"));
        }

        let config = self.config;
        let model = config.model();
        let v = config.velocity();
        let dt = config.timestep();
        let stepcount = config.stepcount();

        tracing::debug!(
            velocity = v,
            timestep = dt,
            stepcount,
            controller = self.controller.name(),
            "starting simulation"
        );

        let init = *config.initial_state();
        let control = self
            .controller
            .compute(init.roll, init.steer, init.roll_rate, init.steer_rate);
        let mut prev = init.with_steer_torque(control.steer_torque);
        self.result.set_state_at(0, prev);
        if let Some(observer) = self.observer.as_mut() {
            observer.on_step(0, &prev);
        }

        let mut status = SimulationStatus::Completed;
        for step in 1..stepcount {
            let q = prev.q();
            let q_dot = prev.q_dot();
            let q_ddot = model.acceleration(v, &q, &q_dot, &prev.f());

            // Forward Euler: both updates use the previous row's derivatives
            let q_new: Vector2<f64> = q + q_dot * dt;
            let q_dot_new: Vector2<f64> = q_dot + q_ddot * dt;

            let control = self
                .controller
                .compute(q_new[0], q_new[1], q_dot_new[0], q_dot_new[1]);
            let heading_rate = model.heading_rate(v, q_new[1], q_dot_new[1]);

            let next = BicycleState::new(q_new[0], q_new[1], q_dot_new[0], q_dot_new[1])
                .with_steer_torque(control.steer_torque)
                .with_heading(prev.heading + dt * heading_rate);
            self.result.set_state_at(step, next);
            if let Some(observer) = self.observer.as_mut() {
                observer.on_step(step, &next);
            }

            if next.is_fallen() {
                self.result.freeze_from(step);
                if let Some(observer) = self.observer.as_mut() {
                    observer.on_abort(step, &next);
                }
                tracing::debug!(step, "fall-over limit exceeded, freezing remaining rows");
                status = SimulationStatus::Aborted { at_step: step };
                break;
            }
            prev = next;
        }

        self.result.set_timestep(dt);
        self.result.extend_metadata(config.description());
        self.status = status;

        tracing::debug!(?status, "simulation finished");
        Ok(status)
    }

    /// The recorded trajectory; fails until `run` has returned.
    pub fn result(&self) -> SimResult<&Trajectory> {
        if !self.status.is_finished() {
            return Err(SimError::invalid_state(
                "simulation result requested before run",
            ));
        }
        Ok(&self.result)
    }

    pub fn into_result(self) -> SimResult<Trajectory> {
        if !self.status.is_finished() {
            return Err(SimError::invalid_state(
                "simulation result requested before run",
            ));
        }
        Ok(self.result)
    }
}

/// Run `config` once and return its trajectory.
pub fn simulate(config: &RunConfiguration) -> SimResult<Trajectory> {
    let mut simulation = Simulation::new(config);
    simulation.run()?;
    simulation.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::BikeAnimation;
    use bicycler_core::BicycleModel;

    fn config(initial: BicycleState, controller: Controller, stepcount: usize) -> RunConfiguration {
        RunConfiguration::builder(initial)
            .controller(controller)
            .stepcount(stepcount)
            .build()
            .unwrap()
    }

    #[test]
    fn test_first_step_matches_hand_computation() {
        let init = BicycleState::new(0.05, -0.02, 0.1, 0.3);
        let cfg = config(init, Controller::roll(10.0), 2);
        let t = simulate(&cfg).unwrap();

        let model = BicycleModel::benchmark().unwrap();
        let dt = cfg.timestep();
        let v = cfg.velocity();
        let row0 = t.rows()[0];
        assert_eq!(row0.steer_torque, 10.0 * init.roll);
        assert_eq!(row0.f(), Vector2::new(0.0, row0.steer_torque));
        let q_ddot = model.acceleration(v, &init.q(), &init.q_dot(), &row0.f());

        let row1 = t.rows()[1];
        assert_eq!(row1.roll, 0.05 + dt * 0.1);
        assert_eq!(row1.steer, -0.02 + dt * 0.3);
        assert_eq!(row1.roll_rate, 0.1 + dt * q_ddot[0]);
        assert_eq!(row1.steer_rate, 0.3 + dt * q_ddot[1]);
        assert_eq!(row1.steer_torque, 10.0 * row1.roll);
        let heading_rate = model.heading_rate(v, row1.steer, row1.steer_rate);
        assert_eq!(row1.heading, dt * heading_rate);
    }

    #[test]
    fn test_single_step_run() {
        let init = BicycleState::from_degrees(2.0, 1.0);
        let t = simulate(&config(init, Controller::none(), 1)).unwrap();
        assert_eq!(t.rows(), &[init]);
        assert_eq!(t.metadata()["stepcount"], "1");
    }

    #[test]
    fn test_status_transitions() {
        let cfg = config(BicycleState::from_degrees(1.0, 0.0), Controller::none(), 5);
        let mut sim = Simulation::new(&cfg);
        assert_eq!(sim.status(), SimulationStatus::NotRun);
        assert!(matches!(sim.result(), Err(SimError::InvalidState { .. })));

        assert_eq!(sim.run().unwrap(), SimulationStatus::Completed);
        assert_eq!(sim.result().unwrap().frame_count(), 5);
        assert!(matches!(sim.run(), Err(SimError::InvalidState { .. })));
    }

    #[test]
    fn test_prototype_controller_is_untouched() {
        let cfg = config(
            BicycleState::from_degrees(3.0, 0.0),
            Controller::pid(2.0, 1.0, 0.5),
            50,
        );
        let first = simulate(&cfg).unwrap();
        let second = simulate(&cfg).unwrap();
        assert_eq!(first, second);
        assert_eq!(cfg.controller(), &Controller::pid(2.0, 1.0, 0.5));
    }
}
