//! Error types shared by the bicycler crates.

use thiserror::Error;

/// Result alias used throughout bicycler.
pub type SimResult<T> = Result<T, SimError>;

/// Every failure the model, the integrator and the persistence layer report.
///
/// A bicycle falling over is not an error; it shows up as frozen rows at the
/// end of a trajectory.
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed parameter override, non-numeric value or invalid run setting.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Operation requested in the wrong lifecycle state.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// The physical parameters produce a singular or non-finite system.
    #[error("numeric degeneracy: {message}")]
    NumericDegeneracy { message: String },

    /// A persisted trajectory is missing fields or has the wrong shape.
    #[error("format error: {message}")]
    Format { message: String },

    /// Encoding a trajectory archive failed.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::NumericDegeneracy {
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}
