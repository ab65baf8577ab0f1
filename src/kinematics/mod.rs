mod angle;
mod dtw;
mod joints;

#[cfg(test)]
mod tests;

pub use angle::{calculate_joint_angle, joint_angle, joint_angle_2d, Point3};
pub use dtw::{compare_sequences, dtw_distance, dtw_path, preprocess_sequence, DtwResult, RhythmQuality};
pub use joints::JointType;
