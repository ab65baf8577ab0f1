use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemotionError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Kinematics error: {0}")]
    Kinematics(#[from] KinematicsError),

    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl MemotionError {
    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Geometry failures while turning landmarks into joint angles
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KinematicsError {
    #[error("Invalid geometry: {details}")]
    InvalidGeometry { details: String },

    #[error("Landmark {index} missing (set has {available} points)")]
    MissingLandmark { index: usize, available: usize },
}

impl KinematicsError {
    pub fn invalid_geometry<S: Into<String>>(details: S) -> Self {
        Self::InvalidGeometry {
            details: details.into(),
        }
    }
}

/// Safe-max calibration failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Insufficient samples: need {required}, have {actual}")]
    InsufficientSamples { required: usize, actual: usize },

    #[error("Calibration has not been started")]
    NotStarted,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Engine not initialized: {reason}")]
    NotInitialized { reason: String },

    #[error("Invalid phase number: {0}")]
    InvalidPhase(u8),
}

/// Session registry failures (outside the per-session engine)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Session expired: {session_id}")]
    SessionExpired { session_id: String },
}

pub type Result<T> = std::result::Result<T, MemotionError>;
