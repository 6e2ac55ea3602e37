use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Number of scalars in one trajectory row.
pub const STATE_COLUMNS: usize = 6;

/// Column names in row order.
pub const COLUMN_NAMES: [&str; STATE_COLUMNS] = [
    "roll",
    "steer",
    "roll_rate",
    "steer_rate",
    "steer_torque",
    "heading",
];

/// Snapshot of the bicycle at one instant.
///
/// Angles are radians, rates rad/s, torque N·m. `steer_torque` is the torque
/// the controller applied at this instant; `heading` accumulates without
/// wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BicycleState {
    pub roll: f64,
    pub steer: f64,
    pub roll_rate: f64,
    pub steer_rate: f64,
    pub steer_torque: f64,
    pub heading: f64,
}

impl BicycleState {
    pub fn new(roll: f64, steer: f64, roll_rate: f64, steer_rate: f64) -> Self {
        Self {
            roll,
            steer,
            roll_rate,
            steer_rate,
            ..Self::default()
        }
    }

    /// Upright-at-rest state tilted by the given angles in degrees.
    pub fn from_degrees(roll_deg: f64, steer_deg: f64) -> Self {
        Self::new(roll_deg.to_radians(), steer_deg.to_radians(), 0.0, 0.0)
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_steer_torque(mut self, steer_torque: f64) -> Self {
        self.steer_torque = steer_torque;
        self
    }

    /// Generalized coordinates `(roll, steer)`.
    pub fn q(&self) -> Vector2<f64> {
        Vector2::new(self.roll, self.steer)
    }

    /// Generalized speeds `(roll_rate, steer_rate)`.
    pub fn q_dot(&self) -> Vector2<f64> {
        Vector2::new(self.roll_rate, self.steer_rate)
    }

    /// Generalized forces. Lean is never actuated directly.
    pub fn f(&self) -> Vector2<f64> {
        Vector2::new(0.0, self.steer_torque)
    }

    /// True once roll or steer exceeds a quarter turn.
    pub fn is_fallen(&self) -> bool {
        self.roll.abs() > FRAC_PI_2 || self.steer.abs() > FRAC_PI_2
    }

    pub fn to_row(&self) -> [f64; STATE_COLUMNS] {
        [
            self.roll,
            self.steer,
            self.roll_rate,
            self.steer_rate,
            self.steer_torque,
            self.heading,
        ]
    }

    pub fn from_row(row: [f64; STATE_COLUMNS]) -> Self {
        let [roll, steer, roll_rate, steer_rate, steer_torque, heading] = row;
        Self {
            roll,
            steer,
            roll_rate,
            steer_rate,
            steer_torque,
            heading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views() {
        let s = BicycleState::new(0.1, -0.2, 0.3, -0.4).with_steer_torque(2.5);
        assert_eq!(s.q(), Vector2::new(0.1, -0.2));
        assert_eq!(s.q_dot(), Vector2::new(0.3, -0.4));
        assert_eq!(s.f(), Vector2::new(0.0, 2.5));
        assert_eq!(s.heading, 0.0);
    }

    #[test]
    fn test_row_layout() {
        let s = BicycleState::new(1.0, 2.0, 3.0, 4.0)
            .with_steer_torque(5.0)
            .with_heading(6.0);
        assert_eq!(s.to_row(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(BicycleState::from_row(s.to_row()), s);
    }

    #[test]
    fn test_fallen() {
        assert!(!BicycleState::from_degrees(89.9, -89.9).is_fallen());
        assert!(!BicycleState::new(FRAC_PI_2, -FRAC_PI_2, 0.0, 0.0).is_fallen());
        assert!(BicycleState::from_degrees(100.0, 0.0).is_fallen());
        assert!(BicycleState::from_degrees(0.0, -95.0).is_fallen());
    }
}
