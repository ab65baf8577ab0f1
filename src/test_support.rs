//! Synthetic landmark builders shared by unit tests.

use crate::kinematics::JointType;
use crate::landmarks::{pose, Landmark, LandmarkSet, FACE_LANDMARK_COUNT, POSE_LANDMARK_COUNT};

/// A neutral standing pose, arms hanging and legs straight
pub fn standing_points() -> Vec<Landmark> {
    let mut points = vec![Landmark::new(0.5, 0.5, 0.0); POSE_LANDMARK_COUNT];
    let mut set = |index: usize, x: f64, y: f64| points[index] = Landmark::new(x, y, 0.0);

    set(pose::NOSE, 0.5, 0.15);
    set(pose::LEFT_SHOULDER, 0.6, 0.3);
    set(pose::RIGHT_SHOULDER, 0.4, 0.3);
    set(pose::LEFT_ELBOW, 0.62, 0.45);
    set(pose::RIGHT_ELBOW, 0.38, 0.45);
    set(pose::LEFT_WRIST, 0.63, 0.6);
    set(pose::RIGHT_WRIST, 0.37, 0.6);
    set(pose::LEFT_HIP, 0.56, 0.6);
    set(pose::RIGHT_HIP, 0.44, 0.6);
    set(pose::LEFT_KNEE, 0.56, 0.78);
    set(pose::RIGHT_KNEE, 0.44, 0.78);
    set(pose::LEFT_ANKLE, 0.56, 0.95);
    set(pose::RIGHT_ANKLE, 0.44, 0.95);

    points
}

pub fn standing_pose() -> LandmarkSet {
    LandmarkSet::new(standing_points())
}

/// Standing pose with the listed joints bent to exact angles (applied in order)
pub fn pose_with_angles(angles: &[(JointType, f64)]) -> LandmarkSet {
    let mut points = standing_points();
    for &(joint, angle) in angles {
        set_joint_angle(&mut points, joint, angle);
    }
    LandmarkSet::new(points)
}

/// Move the distal landmark of `joint` so the measured angle equals `angle_deg`
pub fn set_joint_angle(points: &mut [Landmark], joint: JointType, angle_deg: f64) {
    let (a, b, c) = joint.landmark_indices();
    let (ax, ay) = (points[a].x - points[b].x, points[a].y - points[b].y);
    let reference_len = ax.hypot(ay);
    let (ux, uy) = (ax / reference_len, ay / reference_len);
    let segment = (points[c].x - points[b].x).hypot(points[c].y - points[b].y);

    let theta = if joint.is_left() {
        -angle_deg.to_radians()
    } else {
        angle_deg.to_radians()
    };
    let (rx, ry) = (
        ux * theta.cos() - uy * theta.sin(),
        ux * theta.sin() + uy * theta.cos(),
    );

    points[c] = Landmark::new(points[b].x + segment * rx, points[b].y + segment * ry, 0.0);
}

/// Face mesh whose ratios match the built-in neutral baseline
pub fn neutral_face() -> LandmarkSet {
    face_with(0.33, 0.0224, 0.51)
}

/// Face with a lowered brow, nearly closed eyes and a raised upper lip
pub fn pained_face() -> LandmarkSet {
    face_with(0.37, 0.0022, 0.48)
}

fn face_with(brow_y: f64, eye_opening: f64, lip_top_y: f64) -> LandmarkSet {
    let mut points = vec![Landmark::new(0.5, 0.5, 0.0); FACE_LANDMARK_COUNT];
    let mut set = |index: usize, x: f64, y: f64| points[index] = Landmark::new(x, y, 0.0);

    // face outline: height 0.5
    set(10, 0.5, 0.2);
    set(152, 0.5, 0.7);

    set(66, 0.42, brow_y);
    set(296, 0.58, brow_y);

    set(159, 0.42, 0.37);
    set(145, 0.42, 0.37 + eye_opening);
    set(133, 0.46, 0.38);
    set(33, 0.38, 0.38);
    set(386, 0.58, 0.37);
    set(374, 0.58, 0.37 + eye_opening);
    set(362, 0.54, 0.38);
    set(263, 0.62, 0.38);

    set(6, 0.5, 0.40);
    set(1, 0.5, 0.46);

    set(0, 0.5, lip_top_y);
    set(13, 0.5, 0.54);
    set(14, 0.5, 0.555);
    set(61, 0.45, 0.55);
    set(291, 0.55, 0.55);

    LandmarkSet::new(points)
}
