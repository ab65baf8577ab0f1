//! Checkpoint synchronization between the user and a reference exercise.

mod controller;
mod exercise;
mod rep_detector;

#[cfg(test)]
mod tests;

pub use controller::{MotionSyncController, SyncEvent, SyncState, SyncStatus};
pub use exercise::{
    exercise_weights, Checkpoint, ExerciseDefinition, ExerciseKind, MotionPhase,
    DEFAULT_JOINT_WEIGHT,
};
pub use rep_detector::RepDetector;
