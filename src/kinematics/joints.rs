use crate::landmarks::pose;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Joints the engine can measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointType {
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftKnee,
    RightKnee,
    LeftHip,
    RightHip,
}

impl JointType {
    pub const ALL: [JointType; 8] = [
        JointType::LeftShoulder,
        JointType::RightShoulder,
        JointType::LeftElbow,
        JointType::RightElbow,
        JointType::LeftKnee,
        JointType::RightKnee,
        JointType::LeftHip,
        JointType::RightHip,
    ];

    /// Landmark triple `(proximal, vertex, distal)`; the angle is measured at the vertex
    pub fn landmark_indices(&self) -> (usize, usize, usize) {
        match self {
            JointType::LeftElbow => (pose::LEFT_SHOULDER, pose::LEFT_ELBOW, pose::LEFT_WRIST),
            JointType::RightElbow => (pose::RIGHT_SHOULDER, pose::RIGHT_ELBOW, pose::RIGHT_WRIST),
            JointType::LeftShoulder => (pose::LEFT_HIP, pose::LEFT_SHOULDER, pose::LEFT_ELBOW),
            JointType::RightShoulder => (pose::RIGHT_HIP, pose::RIGHT_SHOULDER, pose::RIGHT_ELBOW),
            JointType::LeftKnee => (pose::LEFT_HIP, pose::LEFT_KNEE, pose::LEFT_ANKLE),
            JointType::RightKnee => (pose::RIGHT_HIP, pose::RIGHT_KNEE, pose::RIGHT_ANKLE),
            JointType::LeftHip => (pose::LEFT_SHOULDER, pose::LEFT_HIP, pose::LEFT_KNEE),
            JointType::RightHip => (pose::RIGHT_SHOULDER, pose::RIGHT_HIP, pose::RIGHT_KNEE),
        }
    }

    /// The same joint on the opposite side of the body
    pub fn mirror(&self) -> JointType {
        match self {
            JointType::LeftShoulder => JointType::RightShoulder,
            JointType::RightShoulder => JointType::LeftShoulder,
            JointType::LeftElbow => JointType::RightElbow,
            JointType::RightElbow => JointType::LeftElbow,
            JointType::LeftKnee => JointType::RightKnee,
            JointType::RightKnee => JointType::LeftKnee,
            JointType::LeftHip => JointType::RightHip,
            JointType::RightHip => JointType::LeftHip,
        }
    }

    pub fn is_left(&self) -> bool {
        matches!(
            self,
            JointType::LeftShoulder | JointType::LeftElbow | JointType::LeftKnee | JointType::LeftHip
        )
    }

    pub fn is_elbow(&self) -> bool {
        matches!(self, JointType::LeftElbow | JointType::RightElbow)
    }

    pub fn is_knee(&self) -> bool {
        matches!(self, JointType::LeftKnee | JointType::RightKnee)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JointType::LeftShoulder => "left_shoulder",
            JointType::RightShoulder => "right_shoulder",
            JointType::LeftElbow => "left_elbow",
            JointType::RightElbow => "right_elbow",
            JointType::LeftKnee => "left_knee",
            JointType::RightKnee => "right_knee",
            JointType::LeftHip => "left_hip",
            JointType::RightHip => "right_hip",
        }
    }

    /// Human-readable name for feedback text
    pub fn display_name(&self) -> &'static str {
        match self {
            JointType::LeftShoulder => "Left shoulder",
            JointType::RightShoulder => "Right shoulder",
            JointType::LeftElbow => "Left elbow",
            JointType::RightElbow => "Right elbow",
            JointType::LeftKnee => "Left knee",
            JointType::RightKnee => "Right knee",
            JointType::LeftHip => "Left hip",
            JointType::RightHip => "Right hip",
        }
    }

    /// Positioning hint shown while the calibration countdown runs
    pub fn position_instruction(&self) -> &'static str {
        match self {
            JointType::LeftShoulder | JointType::RightShoulder => {
                "Stand facing the camera and raise your arm sideways as high as is comfortable"
            }
            JointType::LeftElbow | JointType::RightElbow => {
                "Keep your upper arm still and straighten your elbow as far as is comfortable"
            }
            JointType::LeftKnee | JointType::RightKnee => {
                "Hold onto a support and straighten your leg as far as is comfortable"
            }
            JointType::LeftHip | JointType::RightHip => {
                "Hold onto a support and lift your leg forward as far as is comfortable"
            }
        }
    }
}

impl fmt::Display for JointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JointType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JointType::ALL
            .iter()
            .copied()
            .find(|joint| joint.as_str() == s)
            .ok_or_else(|| format!("Unknown joint type: {}", s))
    }
}
