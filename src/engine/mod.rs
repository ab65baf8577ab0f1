//! Per-user session engine: phase orchestration from pose detection to the final report.

mod orchestrator;
mod phase_calibration;
mod phase_detection;
mod phase_scoring;
mod phase_sync;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::SessionEngine;
pub use state::{CalibrationStage, EngineState, StateSnapshot};
pub use types::{
    direction_hint, feedback_text, AppPhase, CalibratedJoint, CalibrationOutput,
    CalibrationStatus, DetectionOutput, DetectionStatus, DirectionHint, EngineOutput, FinalReport,
    JointCalibrationStatus, JointError, JointProgress, SyncOutput, SyncPhaseStatus, Transition,
};
