//! Steering controllers.
//!
//! Every controller maps the current lean/steer state to a pair of torques.
//! The integrator only feeds the steer torque back into the equations of
//! motion; the roll channel is reported but unused. Each variant keeps the
//! channel it was designed for, so `RollPid` writes roll torque while the
//! other feedback laws write steer torque.

/// Default number of error samples kept by [`RollPidWindowed`].
pub const DEFAULT_PID_WINDOW: usize = 10;

/// Torques commanded by a controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BicycleControl {
    pub roll_torque: f64,
    pub steer_torque: f64,
}

impl BicycleControl {
    pub fn new(roll_torque: f64, steer_torque: f64) -> Self {
        Self {
            roll_torque,
            steer_torque,
        }
    }

    pub fn steer(steer_torque: f64) -> Self {
        Self::new(0.0, steer_torque)
    }
}

/// Capability shared by all controller variants.
pub trait ControlLaw {
    /// Torques for the given state. Stateful laws update their accumulator
    /// exactly once per call.
    fn compute(&mut self, roll: f64, steer: f64, roll_rate: f64, steer_rate: f64)
        -> BicycleControl;

    /// Tunable parameters, in display order.
    fn parameters(&self) -> Vec<(&'static str, String)>;

    fn name(&self) -> &'static str;
}

fn fmt_gain(value: f64) -> String {
    format!("{value:?}")
}

// ---------------------------------------------------------------------------
// Stateless laws
// ---------------------------------------------------------------------------

/// Applies no torque at all.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NoControl;

impl ControlLaw for NoControl {
    fn compute(&mut self, _: f64, _: f64, _: f64, _: f64) -> BicycleControl {
        BicycleControl::default()
    }

    fn parameters(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn name(&self) -> &'static str {
        "NoControlController"
    }
}

/// Steer torque proportional to the roll rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollRateFeedback {
    pub gain: f64,
}

impl ControlLaw for RollRateFeedback {
    fn compute(&mut self, _roll: f64, _steer: f64, roll_rate: f64, _: f64) -> BicycleControl {
        BicycleControl::steer(self.gain * roll_rate)
    }

    fn parameters(&self) -> Vec<(&'static str, String)> {
        vec![("gain", fmt_gain(self.gain))]
    }

    fn name(&self) -> &'static str {
        "RollRateFeedbackController"
    }
}

/// Steer torque proportional to the roll angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollFeedback {
    pub gain: f64,
}

impl ControlLaw for RollFeedback {
    fn compute(&mut self, roll: f64, _steer: f64, _: f64, _: f64) -> BicycleControl {
        BicycleControl::steer(self.gain * roll)
    }

    fn parameters(&self) -> Vec<(&'static str, String)> {
        vec![("gain", fmt_gain(self.gain))]
    }

    fn name(&self) -> &'static str {
        "RollFeedbackController"
    }
}

/// PD on roll, driving it to zero through the steer channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollPd {
    pub kp: f64,
    pub kd: f64,
}

impl ControlLaw for RollPd {
    fn compute(&mut self, roll: f64, _steer: f64, roll_rate: f64, _: f64) -> BicycleControl {
        let error = -roll;
        let output = self.kp * error + self.kd * roll_rate;
        tracing::trace!(error, derivative = roll_rate, output, "roll PD terms");
        BicycleControl::steer(output)
    }

    fn parameters(&self) -> Vec<(&'static str, String)> {
        vec![("kp", fmt_gain(self.kp)), ("kd", fmt_gain(self.kd))]
    }

    fn name(&self) -> &'static str {
        "RollPDController"
    }
}

// ---------------------------------------------------------------------------
// Stateful laws
// ---------------------------------------------------------------------------

/// PID on roll with an unbounded integral, output on the roll channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RollPid {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub target_roll: f64,
    integral: f64,
}

impl RollPid {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            target_roll: 0.0,
            integral: 0.0,
        }
    }

    pub fn with_target(mut self, target_roll: f64) -> Self {
        self.target_roll = target_roll;
        self
    }

    /// Sum of all errors seen so far.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
    }
}

impl ControlLaw for RollPid {
    fn compute(&mut self, roll: f64, _steer: f64, roll_rate: f64, _: f64) -> BicycleControl {
        let error = self.target_roll - roll;
        self.integral += error;
        let output = self.kp * error + self.ki * self.integral + self.kd * roll_rate;
        tracing::trace!(
            error,
            integral = self.integral,
            derivative = roll_rate,
            output,
            "roll PID terms"
        );
        BicycleControl::new(output, 0.0)
    }

    fn parameters(&self) -> Vec<(&'static str, String)> {
        vec![
            ("kp", fmt_gain(self.kp)),
            ("ki", fmt_gain(self.ki)),
            ("kd", fmt_gain(self.kd)),
        ]
    }

    fn name(&self) -> &'static str {
        "RollPIDController"
    }
}

/// PID on roll whose integral only covers the most recent errors.
///
/// Errors go into a fixed ring; the integral term is the ring's sum and is
/// subtracted, and the result drives the steer channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RollPidWindowed {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub target_roll: f64,
    window: Vec<f64>,
    index: usize,
}

impl RollPidWindowed {
    /// Windowed PID over `window` samples. Returns `None` for an empty window.
    pub fn new(kp: f64, ki: f64, kd: f64, window: usize) -> Option<Self> {
        if window == 0 {
            return None;
        }
        Some(Self {
            kp,
            ki,
            kd,
            target_roll: 0.0,
            window: vec![0.0; window],
            index: 0,
        })
    }

    pub fn with_target(mut self, target_roll: f64) -> Self {
        self.target_roll = target_roll;
        self
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Sum of the errors currently held in the window.
    pub fn windowed_integral(&self) -> f64 {
        self.window.iter().sum()
    }

    pub fn reset(&mut self) {
        self.window.fill(0.0);
        self.index = 0;
    }
}

impl ControlLaw for RollPidWindowed {
    fn compute(&mut self, roll: f64, _steer: f64, roll_rate: f64, _: f64) -> BicycleControl {
        let error = self.target_roll - roll;
        self.window[self.index] = error;
        self.index = (self.index + 1) % self.window.len();

        let integral = self.windowed_integral();
        let output = self.kp * error - self.ki * integral + self.kd * roll_rate;
        tracing::trace!(
            error,
            integral,
            derivative = roll_rate,
            output,
            "windowed roll PID terms"
        );
        BicycleControl::steer(output)
    }

    fn parameters(&self) -> Vec<(&'static str, String)> {
        vec![
            ("kp", fmt_gain(self.kp)),
            ("ki", fmt_gain(self.ki)),
            ("kd", fmt_gain(self.kd)),
            ("window", self.window.len().to_string()),
        ]
    }

    fn name(&self) -> &'static str {
        "RollPIDWindowedController"
    }
}

// ---------------------------------------------------------------------------
// Closed set of variants
// ---------------------------------------------------------------------------

/// Any of the supported controllers.
///
/// Cloning yields an independent instance including the accumulator, so a
/// configured controller can serve as the prototype for many runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Controller {
    NoControl(NoControl),
    RollRate(RollRateFeedback),
    Roll(RollFeedback),
    Pid(RollPid),
    PidWindowed(RollPidWindowed),
    Pd(RollPd),
}

impl Default for Controller {
    fn default() -> Self {
        Self::NoControl(NoControl)
    }
}

impl Controller {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn roll_rate(gain: f64) -> Self {
        Self::RollRate(RollRateFeedback { gain })
    }

    pub fn roll(gain: f64) -> Self {
        Self::Roll(RollFeedback { gain })
    }

    pub fn pid(kp: f64, ki: f64, kd: f64) -> Self {
        Self::Pid(RollPid::new(kp, ki, kd))
    }

    pub fn pid_windowed(kp: f64, ki: f64, kd: f64, window: usize) -> Option<Self> {
        RollPidWindowed::new(kp, ki, kd, window).map(Self::PidWindowed)
    }

    pub fn pd(kp: f64, kd: f64) -> Self {
        Self::Pd(RollPd { kp, kd })
    }

    /// Clear any accumulated error history.
    pub fn reset(&mut self) {
        match self {
            Self::Pid(c) => c.reset(),
            Self::PidWindowed(c) => c.reset(),
            Self::NoControl(_) | Self::RollRate(_) | Self::Roll(_) | Self::Pd(_) => {}
        }
    }

    /// Whether `compute` mutates internal state.
    pub fn is_stateful(&self) -> bool {
        matches!(self, Self::Pid(_) | Self::PidWindowed(_))
    }

    fn law(&self) -> &dyn ControlLaw {
        match self {
            Self::NoControl(c) => c,
            Self::RollRate(c) => c,
            Self::Roll(c) => c,
            Self::Pid(c) => c,
            Self::PidWindowed(c) => c,
            Self::Pd(c) => c,
        }
    }

    fn law_mut(&mut self) -> &mut dyn ControlLaw {
        match self {
            Self::NoControl(c) => c,
            Self::RollRate(c) => c,
            Self::Roll(c) => c,
            Self::Pid(c) => c,
            Self::PidWindowed(c) => c,
            Self::Pd(c) => c,
        }
    }
}

impl ControlLaw for Controller {
    fn compute(
        &mut self,
        roll: f64,
        steer: f64,
        roll_rate: f64,
        steer_rate: f64,
    ) -> BicycleControl {
        self.law_mut().compute(roll, steer, roll_rate, steer_rate)
    }

    fn parameters(&self) -> Vec<(&'static str, String)> {
        self.law().parameters()
    }

    fn name(&self) -> &'static str {
        self.law().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_no_control() {
        let mut c = Controller::none();
        assert_eq!(c.compute(0.3, -0.1, 2.0, 1.0), BicycleControl::default());
        assert!(c.parameters().is_empty());
        assert_eq!(c.name(), "NoControlController");
    }

    #[test]
    fn test_feedback_laws_use_steer_channel() {
        let mut rate = Controller::roll_rate(50.0);
        assert_eq!(rate.compute(0.1, 0.2, 0.3, 0.4), BicycleControl::new(0.0, 50.0 * 0.3));
        assert_eq!(rate.parameters(), vec![("gain", "50.0".to_string())]);
        assert_eq!(rate.name(), "RollRateFeedbackController");

        let mut roll = Controller::roll(-12.5);
        assert_eq!(roll.compute(0.1, 0.2, 0.3, 0.4), BicycleControl::new(0.0, -12.5 * 0.1));
        assert_eq!(roll.parameters(), vec![("gain", "-12.5".to_string())]);
    }

    #[test]
    fn test_pd() {
        let mut pd = Controller::pd(10.0, 2.0);
        let out = pd.compute(0.2, 0.0, -0.5, 0.0);
        assert_eq!(out.roll_torque, 0.0);
        assert_relative_eq!(out.steer_torque, 10.0 * -0.2 + 2.0 * -0.5);
        assert!(!pd.is_stateful());
    }

    #[test]
    fn test_pid_accumulates_on_roll_channel() {
        let mut pid = RollPid::new(2.0, 0.5, 1.0);
        let first = pid.compute(0.1, 0.0, 0.2, 0.0);
        assert_eq!(first.steer_torque, 0.0);
        assert_relative_eq!(first.roll_torque, 2.0 * -0.1 + 0.5 * -0.1 + 1.0 * 0.2);

        let second = pid.compute(0.1, 0.0, 0.2, 0.0);
        assert_relative_eq!(second.roll_torque, 2.0 * -0.1 + 0.5 * -0.2 + 1.0 * 0.2);
        assert_relative_eq!(pid.integral(), -0.2);

        pid.reset();
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_pid_parameters_list_gains_only() {
        let pid = Controller::pid(2.0, 0.5, 1.0);
        let names: Vec<_> = pid.parameters().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["kp", "ki", "kd"]);

        let tilted = RollPid::new(2.0, 0.5, 1.0).with_target(0.1);
        assert_eq!(tilted.parameters(), pid.parameters());

        let windowed = Controller::pid_windowed(2.0, 0.5, 1.0, 4).unwrap();
        let names: Vec<_> = windowed.parameters().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["kp", "ki", "kd", "window"]);
    }

    #[test]
    fn test_pid_target_is_per_instance() {
        let mut a = RollPid::new(1.0, 0.0, 0.0).with_target(0.05);
        let mut b = RollPid::new(1.0, 0.0, 0.0);
        assert_relative_eq!(a.compute(0.0, 0.0, 0.0, 0.0).roll_torque, 0.05);
        assert_eq!(b.compute(0.0, 0.0, 0.0, 0.0).roll_torque, 0.0);
    }

    #[test]
    fn test_windowed_pid_constant_error() {
        let mut pid = RollPidWindowed::new(0.0, 1.0, 0.0, 3).unwrap();
        let roll = -0.25; // error = +0.25
        let mut outputs = Vec::new();
        for _ in 0..5 {
            outputs.push(pid.compute(roll, 0.0, 0.0, 0.0));
        }
        // The window saturates after three samples
        assert_relative_eq!(outputs[0].steer_torque, -0.25);
        assert_relative_eq!(outputs[1].steer_torque, -0.5);
        assert_relative_eq!(outputs[2].steer_torque, -0.75);
        assert_relative_eq!(outputs[3].steer_torque, -0.75);
        assert_relative_eq!(outputs[4].steer_torque, -0.75);
        assert_relative_eq!(pid.windowed_integral(), 0.75);
        assert!(outputs.iter().all(|o| o.roll_torque == 0.0));
    }

    #[test]
    fn test_windowed_pid_overwrites_oldest_error() {
        let (kp, ki, kd) = (1.5, 0.5, 0.25);
        let mut pid = RollPidWindowed::new(kp, ki, kd, 3).unwrap();
        let errors = [1.0, 2.0, 3.0, 4.0, 5.0];
        let outputs: Vec<_> = errors
            .iter()
            .enumerate()
            .map(|(i, e)| pid.compute(-e, 0.0, i as f64, 0.0))
            .collect();
        let last = outputs[4];
        // Ring after five writes holds 4, 5, 3
        let windowed = 4.0 + 5.0 + 3.0;
        assert_relative_eq!(pid.windowed_integral(), windowed);
        assert_relative_eq!(last.steer_torque, kp * 5.0 - ki * windowed + kd * 4.0);
    }

    #[test]
    fn test_windowed_pid_requires_non_empty_window() {
        assert!(RollPidWindowed::new(1.0, 1.0, 1.0, 0).is_none());
        assert!(Controller::pid_windowed(1.0, 1.0, 1.0, 0).is_none());
        let c = Controller::pid_windowed(1.0, 1.0, 1.0, DEFAULT_PID_WINDOW).unwrap();
        assert_eq!(
            c.parameters().last(),
            Some(&("window", DEFAULT_PID_WINDOW.to_string()))
        );
    }

    #[test]
    fn test_clones_do_not_share_accumulators() {
        let prototype = Controller::pid(1.0, 1.0, 0.0);
        let mut a = prototype.clone();
        let mut b = prototype.clone();
        a.compute(-1.0, 0.0, 0.0, 0.0);
        a.compute(-1.0, 0.0, 0.0, 0.0);
        let first_b = b.compute(-1.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(first_b.roll_torque, 2.0);
        assert_eq!(prototype, Controller::pid(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_reset_restores_fresh_behaviour() {
        let mut c = Controller::pid_windowed(1.0, 1.0, 0.0, 4).unwrap();
        let fresh = c.clone().compute(-0.5, 0.0, 0.0, 0.0);
        c.compute(-0.5, 0.0, 0.0, 0.0);
        c.compute(-0.5, 0.0, 0.0, 0.0);
        c.reset();
        assert_eq!(c.compute(-0.5, 0.0, 0.0, 0.0), fresh);
        assert!(c.is_stateful());
    }
}
