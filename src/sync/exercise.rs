use crate::kinematics::JointType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Part of a repetition the reference motion is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPhase {
    Idle,
    Eccentric,
    Hold,
    Concentric,
}

impl MotionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionPhase::Idle => "idle",
            MotionPhase::Eccentric => "eccentric",
            MotionPhase::Hold => "hold",
            MotionPhase::Concentric => "concentric",
        }
    }
}

/// Reference frame at which a motion phase begins, with the angle the user should show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub frame_index: u32,
    pub phase_start: MotionPhase,
    pub target_angle: f64,
    pub tolerance: f64,
    pub message: String,
}

impl Checkpoint {
    pub fn new<S: Into<String>>(
        frame_index: u32,
        phase_start: MotionPhase,
        target_angle: f64,
        tolerance: f64,
        message: S,
    ) -> Self {
        Self {
            frame_index,
            phase_start,
            target_angle,
            tolerance,
            message: message.into(),
        }
    }

    pub fn is_satisfied_by(&self, angle: f64) -> bool {
        (angle - self.target_angle).abs() <= self.tolerance
    }
}

/// Reference exercise: checkpoints laid over a video of known length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    pub name: String,
    pub joint: JointType,
    pub checkpoints: Vec<Checkpoint>,
    pub total_frames: u32,
    pub fps: f64,
}

/// Checkpoint offsets within one cycle, as fractions of the cycle length
const CYCLE_LAYOUT: [(f64, MotionPhase); 4] = [
    (0.15, MotionPhase::Eccentric),
    (0.45, MotionPhase::Hold),
    (0.60, MotionPhase::Concentric),
    (0.90, MotionPhase::Idle),
];

const ARM_RAISE_REST_ANGLE: f64 = 20.0;
const CHECKPOINT_TOLERANCE: f64 = 20.0;

impl ExerciseDefinition {
    /// Shoulder abduction from the side up to `max_angle` and back, `cycles` times
    pub fn arm_raise(total_frames: u32, fps: f64, max_angle: f64, cycles: u32) -> Self {
        let messages = ["Raise your arm", "Hold it there", "Lower slowly", "Rest"];
        Self::cyclic(
            "arm_raise",
            JointType::LeftShoulder,
            total_frames,
            fps,
            cycles,
            ARM_RAISE_REST_ANGLE,
            max_angle,
            messages,
        )
    }

    /// Elbow curl from full extension (`max_angle`) to a proportional flexion
    pub fn elbow_flex(total_frames: u32, fps: f64, max_angle: f64, cycles: u32) -> Self {
        let messages = ["Bend your elbow", "Hold the curl", "Straighten slowly", "Rest"];
        Self::cyclic(
            "elbow_flex",
            JointType::LeftElbow,
            total_frames,
            fps,
            cycles,
            max_angle,
            90.0 * max_angle / 180.0,
            messages,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn cyclic(
        name: &str,
        joint: JointType,
        total_frames: u32,
        fps: f64,
        cycles: u32,
        rest_angle: f64,
        peak_angle: f64,
        messages: [&str; 4],
    ) -> Self {
        let cycles = cycles.max(1);
        let cycle_len = total_frames as f64 / cycles as f64;

        let mut checkpoints = Vec::with_capacity(cycles as usize * CYCLE_LAYOUT.len());
        for cycle in 0..cycles {
            let offset = cycle as f64 * cycle_len;
            for (i, &(fraction, phase)) in CYCLE_LAYOUT.iter().enumerate() {
                let target = match phase {
                    MotionPhase::Hold | MotionPhase::Concentric => peak_angle,
                    MotionPhase::Eccentric | MotionPhase::Idle => rest_angle,
                };
                checkpoints.push(Checkpoint::new(
                    (offset + fraction * cycle_len).floor() as u32,
                    phase,
                    target,
                    CHECKPOINT_TOLERANCE,
                    messages[i],
                ));
            }
        }

        Self {
            name: name.to_string(),
            joint,
            checkpoints,
            total_frames,
            fps,
        }
    }

    pub fn with_joint(mut self, joint: JointType) -> Self {
        self.joint = joint;
        self
    }

    /// Largest checkpoint target
    pub fn reference_max(&self) -> f64 {
        self.checkpoints
            .iter()
            .map(|cp| cp.target_angle)
            .fold(0.0, f64::max)
    }

    /// Scale factor applied to targets for a user with the given safe maximum (never above 1)
    pub fn rescale_factor(&self, user_max: f64) -> f64 {
        let reference_max = self.reference_max();
        if user_max <= 0.0 || reference_max <= 0.0 {
            return 1.0;
        }
        (user_max / reference_max).min(1.0)
    }

    /// Copy with every target scaled down to the user's safe range
    pub fn rescaled(&self, user_max: f64) -> Self {
        let factor = self.rescale_factor(user_max);
        let mut exercise = self.clone();
        for cp in &mut exercise.checkpoints {
            cp.target_angle *= factor;
        }
        exercise
    }

    /// Phase of the reference motion at `frame`
    pub fn phase_at(&self, frame: u32) -> MotionPhase {
        self.checkpoints
            .iter()
            .take_while(|cp| cp.frame_index <= frame)
            .last()
            .map(|cp| cp.phase_start)
            .unwrap_or(MotionPhase::Idle)
    }

    /// Target angle at `frame`, interpolated between the surrounding checkpoints
    pub fn target_at(&self, frame: u32) -> f64 {
        let (first, last) = match (self.checkpoints.first(), self.checkpoints.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if frame <= first.frame_index {
            return first.target_angle;
        }
        if frame >= last.frame_index {
            return last.target_angle;
        }

        for pair in self.checkpoints.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if frame >= a.frame_index && frame < b.frame_index {
                let span = (b.frame_index - a.frame_index) as f64;
                let t = (frame - a.frame_index) as f64 / span;
                return a.target_angle + (b.target_angle - a.target_angle) * t;
            }
        }
        last.target_angle
    }

    pub fn duration_s(&self) -> f64 {
        if self.fps > 0.0 {
            self.total_frames as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// Exercise family used for joint weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    ArmRaise,
    BicepCurl,
    Squat,
}

impl ExerciseKind {
    /// Exercise family implied by the joint that leads the movement
    pub fn for_joint(joint: JointType) -> Self {
        if joint.is_elbow() {
            ExerciseKind::BicepCurl
        } else if joint.is_knee() {
            ExerciseKind::Squat
        } else {
            ExerciseKind::ArmRaise
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::ArmRaise => "arm_raise",
            ExerciseKind::BicepCurl => "bicep_curl",
            ExerciseKind::Squat => "squat",
        }
    }
}

/// Weight of a joint when unlisted for an exercise
pub const DEFAULT_JOINT_WEIGHT: f64 = 0.5;

/// Relative importance of each joint for the realtime score
pub fn exercise_weights(kind: ExerciseKind) -> BTreeMap<JointType, f64> {
    use JointType::*;

    let table: [(f64, [JointType; 2]); 4] = match kind {
        ExerciseKind::ArmRaise => [
            (1.0, [LeftShoulder, RightShoulder]),
            (0.6, [LeftElbow, RightElbow]),
            (0.1, [LeftKnee, RightKnee]),
            (0.2, [LeftHip, RightHip]),
        ],
        ExerciseKind::Squat => [
            (1.0, [LeftKnee, RightKnee]),
            (0.8, [LeftHip, RightHip]),
            (0.2, [LeftShoulder, RightShoulder]),
            (0.1, [LeftElbow, RightElbow]),
        ],
        ExerciseKind::BicepCurl => [
            (1.0, [LeftElbow, RightElbow]),
            (0.5, [LeftShoulder, RightShoulder]),
            (0.1, [LeftKnee, RightKnee]),
            (0.2, [LeftHip, RightHip]),
        ],
    };

    table
        .iter()
        .flat_map(|&(weight, joints)| joints.into_iter().map(move |j| (j, weight)))
        .collect()
}
