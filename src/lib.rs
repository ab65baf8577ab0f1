pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod kinematics;
pub mod landmarks;
pub mod pain;
pub mod registry;
pub mod scoring;
pub mod sync;
pub mod video;

#[cfg(test)]
pub mod test_support;

pub use calibration::{Calibrator, SafeMaxCalibrator, UserProfile};
pub use config::MemotionConfig;
pub use engine::{AppPhase, EngineOutput, FinalReport, SessionEngine, StateSnapshot};
pub use error::{MemotionError, Result};
pub use events::{EngineEvent, EventFilter, EventQueue};
pub use kinematics::{calculate_joint_angle, compare_sequences, DtwResult, JointType};
pub use landmarks::{Landmark, LandmarkSet};
pub use pain::{PainAnalyzer, PainDetector, PainLevel};
pub use registry::SessionRegistry;
pub use scoring::{Grade, HealthScorer, Scorer};
pub use sync::{ExerciseDefinition, MotionSyncController};
pub use video::VideoEngine;
