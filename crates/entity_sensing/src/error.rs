//! Error types for sensor construction, updates and persistence

use crate::foundation::collections::{EntityHandle, SensorHandle};

/// Sensor errors
#[derive(thiserror::Error, Debug)]
pub enum SensorError {
    /// Kind, shape and target do not describe a usable sensor
    #[error("Invalid sensor: {0}")]
    InvalidCreation(String),

    /// The source entity no longer resolves; the sensor skips this tick
    #[error("Source entity {0:?} is not alive")]
    MissingSource(EntityHandle),

    /// Handle does not name a registered sensor
    #[error("Sensor {0:?} does not exist")]
    MissingSensor(SensorHandle),

    /// Encoding a record failed
    #[error("Encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Decoding a record failed
    #[error("Decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// Record was written by an incompatible format version
    #[error("Unsupported sensor record version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the record
        found: u16,
        /// Version this build reads
        expected: u16,
    },
}

/// Result alias for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;
