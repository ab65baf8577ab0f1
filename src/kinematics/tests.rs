use super::*;
use crate::error::KinematicsError;
use crate::landmarks::{pose, Landmark, LandmarkSet};
use crate::test_support::{pose_with_angles, standing_points, standing_pose};

#[test]
fn test_right_angle_is_exactly_ninety() {
    let angle = joint_angle(
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    )
    .unwrap();

    assert_eq!(angle, 90.0);
}

#[test]
fn test_straight_and_folded_angles() {
    let origin = Point3::new(0.0, 0.0, 0.0);
    let straight = joint_angle(Point3::new(-1.0, 0.0, 0.0), origin, Point3::new(2.0, 0.0, 0.0)).unwrap();
    let folded = joint_angle(Point3::new(1.0, 0.0, 0.0), origin, Point3::new(3.0, 0.0, 0.0)).unwrap();

    assert!((straight - 180.0).abs() < 1e-9);
    assert!(folded.abs() < 1e-9);
}

#[test]
fn test_degenerate_vector_is_invalid_geometry() {
    let p = Point3::new(0.3, 0.3, 0.0);
    let result = joint_angle(p, p, Point3::new(1.0, 0.0, 0.0));

    assert!(matches!(result, Err(KinematicsError::InvalidGeometry { .. })));
}

#[test]
fn test_non_finite_coordinates_are_invalid_geometry() {
    let v = Point3::new(0.0, 0.0, 0.0);
    let a = Point3::new(f64::NAN, 0.0, 0.0);
    let b = Point3::new(0.0, f64::INFINITY, 0.0);

    assert!(matches!(
        joint_angle(a, v, Point3::new(0.0, 1.0, 0.0)),
        Err(KinematicsError::InvalidGeometry { .. })
    ));
    assert!(matches!(
        joint_angle(Point3::new(1.0, 0.0, 0.0), v, b),
        Err(KinematicsError::InvalidGeometry { .. })
    ));

    let mut points = standing_points();
    points[pose::LEFT_ELBOW] = Landmark::new(f64::NAN, 0.5, 0.0);
    let result = calculate_joint_angle(&LandmarkSet::new(points), JointType::LeftShoulder, false);
    assert!(matches!(result, Err(KinematicsError::InvalidGeometry { .. })));
}

#[test]
fn test_2d_projection_ignores_depth() {
    let a = Point3::new(1.0, 0.0, 5.0);
    let v = Point3::new(0.0, 0.0, 0.0);
    let b = Point3::new(0.0, 1.0, -3.0);

    assert!((joint_angle_2d(a, v, b).unwrap() - 90.0).abs() < 1e-9);
    assert!(joint_angle(a, v, b).unwrap() > 90.0);
}

#[test]
fn test_joint_angle_from_landmarks() {
    let pose = pose_with_angles(&[(JointType::LeftShoulder, 120.0)]);
    let angle = calculate_joint_angle(&pose, JointType::LeftShoulder, true).unwrap();

    assert!((angle - 120.0).abs() < 1e-6);
}

#[test]
fn test_missing_landmark_is_reported() {
    let result = calculate_joint_angle(&LandmarkSet::empty(), JointType::LeftKnee, true);

    assert!(matches!(result, Err(KinematicsError::MissingLandmark { .. })));
}

#[test]
fn test_standing_pose_angles_are_plausible() {
    let pose = standing_pose();
    let knee = calculate_joint_angle(&pose, JointType::LeftKnee, true).unwrap();
    let shoulder = calculate_joint_angle(&pose, JointType::RightShoulder, true).unwrap();

    assert!(knee > 170.0);
    assert!(shoulder < 30.0);
}

#[test]
fn test_joint_mirror_round_trips() {
    for joint in JointType::ALL {
        assert_eq!(joint.mirror().mirror(), joint);
        assert_ne!(joint.is_left(), joint.mirror().is_left());
        assert_eq!(joint.as_str().parse::<JointType>().unwrap(), joint);
    }
}

#[test]
fn test_dtw_identity() {
    let seq = [0.0, 10.0, 25.0, 40.0, 25.0, 10.0];

    assert_eq!(dtw_distance(&seq, &seq), 0.0);
}

#[test]
fn test_dtw_symmetry() {
    let a = [0.0, 10.0, 20.0, 30.0, 20.0];
    let b = [0.0, 5.0, 30.0, 10.0];

    assert_eq!(dtw_distance(&a, &b), dtw_distance(&b, &a));
}

#[test]
fn test_dtw_empty_is_infinite() {
    assert!(dtw_distance(&[], &[1.0]).is_infinite());
    assert!(dtw_distance(&[1.0], &[]).is_infinite());
}

#[test]
fn test_dtw_tolerates_time_stretching() {
    let a = [0.0, 10.0, 20.0, 30.0];
    let stretched = [0.0, 0.0, 10.0, 10.0, 20.0, 20.0, 30.0, 30.0];

    assert_eq!(dtw_distance(&a, &stretched), 0.0);
}

#[test]
fn test_dtw_path_spans_both_sequences() {
    let (distance, path) = dtw_path(&[1.0, 2.0, 3.0], &[1.0, 3.0]);

    assert_eq!(path.first(), Some(&(0, 0)));
    assert_eq!(path.last(), Some(&(2, 1)));
    assert_eq!(distance, 1.0);
}

#[test]
fn test_preprocess_normalizes_range() {
    let processed = preprocess_sequence(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
    let min = processed.iter().copied().fold(f64::INFINITY, f64::min);
    let max = processed.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    assert!((min - 0.0).abs() < 1e-9);
    assert!((max - 1.0).abs() < 1e-9);
}

#[test]
fn test_compare_identical_sequences_scores_high() {
    let seq = [0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 40.0, 30.0, 20.0, 10.0, 0.0];
    let result = compare_sequences(&seq, &seq, true);

    assert!(result.similarity_score > 95.0);
    assert_eq!(result.rhythm_quality, RhythmQuality::Excellent);
}

#[test]
fn test_compare_empty_sequences_is_unknown() {
    let result = compare_sequences(&[], &[1.0, 2.0], true);

    assert_eq!(result.rhythm_quality, RhythmQuality::Unknown);
    assert_eq!(result.similarity_score, 100.0);
}
