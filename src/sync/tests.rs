use super::*;
use crate::config::{FreeTrainingConfig, SyncConfig};
use crate::kinematics::JointType;

fn single_checkpoint() -> ExerciseDefinition {
    ExerciseDefinition {
        name: "single".to_string(),
        joint: JointType::LeftShoulder,
        checkpoints: vec![Checkpoint::new(50, MotionPhase::Hold, 150.0, 10.0, "Hold it")],
        total_frames: 100,
        fps: 30.0,
    }
}

fn arm_raise() -> ExerciseDefinition {
    ExerciseDefinition::arm_raise(100, 30.0, 150.0, 1)
}

#[test]
fn test_pause_until_checkpoint_reached() {
    let mut controller = MotionSyncController::new(&single_checkpoint(), 150.0, &SyncConfig::default());

    let state = controller.update(100.0, 50, 1_000);
    assert_eq!(state.sync_status, SyncStatus::Pause);
    assert_eq!(state.target_angle, 150.0);

    let state = controller.update(145.0, 50, 1_100);
    assert_eq!(state.sync_status, SyncStatus::Play);
    assert_eq!(state.checkpoints_reached, 1);

    let state = controller.update(145.0, 51, 1_200);
    assert_eq!(state.sync_status, SyncStatus::Complete);
}

#[test]
fn test_same_frame_checkpoints_resolve_in_order() {
    let exercise = ExerciseDefinition {
        name: "stacked".to_string(),
        joint: JointType::LeftShoulder,
        checkpoints: vec![
            Checkpoint::new(50, MotionPhase::Hold, 150.0, 10.0, "Reach up"),
            Checkpoint::new(50, MotionPhase::Concentric, 100.0, 10.0, "Come halfway"),
        ],
        total_frames: 100,
        fps: 30.0,
    };
    let mut controller = MotionSyncController::new(&exercise, 150.0, &SyncConfig::default());

    // Only the second checkpoint is met; the first still holds playback
    let state = controller.update(100.0, 50, 1_000);
    assert_eq!(state.sync_status, SyncStatus::Pause);
    assert_eq!(state.checkpoint_index, 0);
    assert_eq!(state.target_angle, 150.0);
    assert_eq!(state.checkpoints_reached, 0);

    // Meeting the first hands control to the second
    let state = controller.update(150.0, 50, 1_100);
    assert_eq!(state.sync_status, SyncStatus::Pause);
    assert_eq!(state.checkpoint_index, 1);
    assert_eq!(state.target_angle, 100.0);
    assert_eq!(state.checkpoints_reached, 1);

    let state = controller.update(100.0, 50, 1_200);
    assert_eq!(state.sync_status, SyncStatus::Play);
    assert_eq!(state.checkpoints_reached, 2);
}

#[test]
fn test_wait_escalates_to_loop_then_skip() {
    let mut controller = MotionSyncController::new(&single_checkpoint(), 150.0, &SyncConfig::default());

    assert_eq!(controller.update(100.0, 50, 0).sync_status, SyncStatus::Pause);
    assert_eq!(controller.update(100.0, 50, 3_999).sync_status, SyncStatus::Pause);
    assert_eq!(controller.update(100.0, 50, 4_000).sync_status, SyncStatus::Loop);

    // Looping the video back does not release the checkpoint
    let state = controller.update(100.0, 20, 10_000);
    assert_eq!(state.sync_status, SyncStatus::Loop);
    assert_eq!(state.wait_time_ms, 10_000);

    let state = controller.update(100.0, 50, 10_001);
    assert_eq!(state.sync_status, SyncStatus::Skip);
    assert_eq!(state.checkpoints_skipped, 1);

    let events = controller.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SyncEvent::CheckpointSkipped { index: 0, .. })));

    assert_eq!(controller.update(100.0, 51, 10_100).sync_status, SyncStatus::Complete);
}

#[test]
fn test_never_complete_with_unreached_checkpoint() {
    let exercise = ExerciseDefinition {
        name: "two".to_string(),
        joint: JointType::LeftShoulder,
        checkpoints: vec![
            Checkpoint::new(10, MotionPhase::Eccentric, 40.0, 10.0, "first"),
            Checkpoint::new(20, MotionPhase::Hold, 120.0, 10.0, "second"),
        ],
        total_frames: 30,
        fps: 30.0,
    };
    let mut controller = MotionSyncController::new(&exercise, 150.0, &SyncConfig::default());

    // Satisfies the second checkpoint only; the first still governs
    for (i, frame) in (20..30).enumerate() {
        let state = controller.update(120.0, frame, i as u64 * 100);
        assert_ne!(state.sync_status, SyncStatus::Complete);
        assert_eq!(state.checkpoint_index, 0);
    }
}

#[test]
fn test_following_reference_counts_one_rep() {
    let mut controller = MotionSyncController::new(&arm_raise(), 150.0, &SyncConfig::default());
    let mut completed_at = None;

    for frame in 0..100u32 {
        let angle = controller.target_at(frame);
        let state = controller.update(angle, frame, frame as u64 * 33);
        assert_ne!(state.sync_status, SyncStatus::Pause, "paused at frame {}", frame);
        if state.sync_status == SyncStatus::Complete && completed_at.is_none() {
            completed_at = Some(frame);
        }
    }

    assert_eq!(controller.state().rep_count, 1);
    assert_eq!(completed_at, Some(91));
}

#[test]
fn test_looped_segment_does_not_double_count() {
    let mut controller = MotionSyncController::new(&arm_raise(), 150.0, &SyncConfig::default());
    let mut ts = 0;
    let mut tick = || {
        ts += 33;
        ts
    };

    for frame in 0..90u32 {
        let angle = controller.target_at(frame);
        controller.update(angle, frame, tick());
    }

    // Arm still raised when the rest checkpoint arrives
    let state = controller.update(150.0, 90, tick());
    assert_eq!(state.sync_status, SyncStatus::Pause);
    assert_eq!(state.rep_count, 1);
    assert_eq!(controller.loop_segment(), Some((60, 89)));

    for frame in 60..90u32 {
        controller.update(150.0, frame, tick());
    }
    let state = controller.update(20.0, 90, tick());

    assert_eq!(state.rep_count, 1);
    assert_eq!(state.checkpoints_reached, 4);
}

#[test]
fn test_reset_clears_progress() {
    let mut controller = MotionSyncController::new(&single_checkpoint(), 150.0, &SyncConfig::default());
    controller.update(150.0, 60, 0);
    controller.reset();

    let state = controller.update(100.0, 50, 1);
    assert_eq!(state.sync_status, SyncStatus::Pause);
    assert_eq!(state.checkpoints_reached, 0);
}

#[test]
fn test_rescale_never_increases_targets() {
    let exercise = arm_raise();

    for user_max in [0.0, 60.0, 120.0, 150.0, 200.0] {
        let rescaled = exercise.rescaled(user_max);
        for (orig, scaled) in exercise.checkpoints.iter().zip(&rescaled.checkpoints) {
            assert!(scaled.target_angle <= orig.target_angle + 1e-9);
        }
    }

    assert!((exercise.rescaled(120.0).reference_max() - 120.0).abs() < 1e-9);
    assert_eq!(exercise.rescaled(-5.0), exercise);
}

#[test]
fn test_cycle_layout() {
    let exercise = ExerciseDefinition::arm_raise(200, 30.0, 150.0, 2);
    let frames: Vec<u32> = exercise.checkpoints.iter().map(|cp| cp.frame_index).collect();

    assert_eq!(frames, vec![15, 45, 60, 90, 115, 145, 160, 190]);
    assert_eq!(exercise.phase_at(0), MotionPhase::Idle);
    assert_eq!(exercise.phase_at(50), MotionPhase::Hold);
    assert_eq!(exercise.phase_at(95), MotionPhase::Idle);
    assert_eq!(exercise.phase_at(150), MotionPhase::Hold);

    let elbow = ExerciseDefinition::elbow_flex(100, 30.0, 160.0, 1);
    assert_eq!(elbow.checkpoints[0].target_angle, 160.0);
    assert!((elbow.checkpoints[1].target_angle - 80.0).abs() < 1e-9);
}

#[test]
fn test_target_interpolates_between_checkpoints() {
    let exercise = arm_raise();

    assert_eq!(exercise.target_at(0), 20.0);
    assert!((exercise.target_at(30) - 85.0).abs() < 1e-9);
    assert_eq!(exercise.target_at(99), 20.0);
}

#[test]
fn test_exercise_weights() {
    let weights = exercise_weights(ExerciseKind::ArmRaise);
    assert_eq!(weights[&JointType::LeftShoulder], 1.0);
    assert_eq!(weights[&JointType::RightKnee], 0.1);
    assert_eq!(weights.len(), 8);

    assert_eq!(ExerciseKind::for_joint(JointType::LeftElbow), ExerciseKind::BicepCurl);
    assert_eq!(ExerciseKind::for_joint(JointType::RightKnee), ExerciseKind::Squat);
    assert_eq!(exercise_weights(ExerciseKind::Squat)[&JointType::LeftHip], 0.8);
}

#[test]
fn test_free_training_rep_through_hold() {
    let mut detector = RepDetector::new(150.0, &FreeTrainingConfig::default());
    let angles = [10.0, 40.0, 80.0, 110.0, 120.0, 105.0, 60.0];

    for angle in angles {
        assert!(!detector.update(angle));
    }
    assert_eq!(detector.phase(), MotionPhase::Eccentric);
    assert!(detector.update(20.0));
    assert_eq!(detector.rep_count(), 1);
    assert_eq!(detector.phase(), MotionPhase::Idle);
}

#[test]
fn test_free_training_partial_rep() {
    let mut detector = RepDetector::new(150.0, &FreeTrainingConfig::default());

    for angle in [10.0, 40.0, 60.0] {
        detector.update(angle);
    }
    assert_eq!(detector.phase(), MotionPhase::Concentric);

    // Turning back before reaching the top
    detector.update(50.0);
    assert_eq!(detector.phase(), MotionPhase::Eccentric);
    assert!(detector.update(20.0));
}
