use super::phase_sync::SyncRuntime;
use super::*;
use crate::calibration::SafeMaxCalibrator;
use crate::config::{MemotionConfig, ReferenceConfig};
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::kinematics::{DtwResult, JointType};
use crate::landmarks::LandmarkSet;
use crate::pain::{PainDetector, PainEvent};
use crate::scoring::{FrameSample, HealthScorer, RepScore, Scorer, ScorerStatus, SessionReport};
use crate::sync::{MotionPhase, SyncStatus};
use crate::test_support::{neutral_face, pained_face, pose_with_angles, standing_pose};
use crate::video::PlaybackState;
use parking_lot::Mutex;
use std::sync::Arc;

const FRAME_MS: u64 = 33;

/// Short timings so a whole session fits in a few hundred frames
fn create_test_config() -> MemotionConfig {
    let mut config = MemotionConfig::default();
    config.detection.stable_frames = 3;
    config.detection.countdown_s = 0.5;
    config.calibration.joints = vec![JointType::LeftShoulder];
    config.calibration.countdown_s = 0.5;
    config.calibration.duration_ms = 1000;
    config.calibration.min_samples = 10;
    config.calibration.complete_delay_s = 0.5;
    config.free_training.target_reps = 2;
    config
}

/// Feeds frames at a fixed rate
struct Driver {
    engine: SessionEngine,
    now_ms: u64,
}

impl Driver {
    fn new(config: MemotionConfig) -> Self {
        Self {
            engine: SessionEngine::new(config).with_user_id("patient-7"),
            now_ms: 0,
        }
    }

    fn frame(&mut self, pose: &LandmarkSet) -> EngineOutput {
        self.frame_with_face(pose, None)
    }

    fn frame_with_face(&mut self, pose: &LandmarkSet, face: Option<&LandmarkSet>) -> EngineOutput {
        let output = self.engine.process_frame(pose, face, self.now_ms);
        self.now_ms += FRAME_MS;
        output
    }

    fn run_until_transition(&mut self, pose: &LandmarkSet, to_phase: u8, limit: usize) -> EngineOutput {
        for _ in 0..limit {
            let output = self.frame(pose);
            if output.transition.as_ref().map(|t| t.to_phase) == Some(to_phase) {
                return output;
            }
        }
        panic!("no transition to phase {} within {} frames", to_phase, limit);
    }
}

/// One raise-and-lower cycle of the left shoulder
fn rep_cycle() -> Vec<LandmarkSet> {
    [10.0, 30.0, 50.0, 70.0, 90.0, 110.0, 110.0, 110.0, 90.0, 70.0, 50.0, 30.0, 10.0, 10.0]
        .iter()
        .map(|&angle| pose_with_angles(&[(JointType::LeftShoulder, angle)]))
        .collect()
}

#[test]
fn test_no_pose_stays_in_detection() {
    let mut driver = Driver::new(MemotionConfig::default());
    let empty = LandmarkSet::empty();

    while driver.now_ms < 10_000 {
        let output = driver.frame(&empty);
        assert_eq!(output.phase, 1);
        assert!(output.transition.is_none());

        let detection = output.detection.unwrap();
        assert_eq!(detection.stable_count, 0);
        assert_eq!(detection.status, DetectionStatus::Idle);
        assert!(!detection.pose_detected);
    }
    assert_eq!(driver.engine.current_phase(), AppPhase::Detection);
}

#[test]
fn test_detection_counts_down_then_transitions() {
    let mut driver = Driver::new(create_test_config());
    let pose = standing_pose();

    let first = driver.frame(&pose).detection.unwrap();
    assert_eq!(first.status, DetectionStatus::Detecting);
    assert_eq!(first.stable_count, 1);

    // Losing the pose resets the count
    let lost = driver.frame(&LandmarkSet::empty()).detection.unwrap();
    assert_eq!(lost.stable_count, 0);

    driver.frame(&pose);
    driver.frame(&pose);
    let countdown = driver.frame(&pose).detection.unwrap();
    assert_eq!(countdown.status, DetectionStatus::Countdown);
    assert_eq!(countdown.progress, 1.0);
    assert!(countdown.countdown_remaining.unwrap() > 0.0);

    let output = driver.run_until_transition(&pose, 2, 30);
    assert_eq!(output.phase, 1);
    assert_eq!(output.detection.unwrap().status, DetectionStatus::Transitioning);
    let transition = output.transition.unwrap();
    assert_eq!((transition.from_phase, transition.to_phase), (1, 2));
    assert_eq!(driver.engine.current_phase(), AppPhase::Calibration);
}

#[test]
fn test_full_session_in_free_training() {
    let mut driver = Driver::new(create_test_config());
    let raised = pose_with_angles(&[(JointType::LeftShoulder, 120.0)]);

    driver.run_until_transition(&raised, 2, 100);

    let output = driver.run_until_transition(&raised, 3, 200);
    assert_eq!(output.phase, 2);
    let calibration = output.calibration.unwrap();
    assert_eq!(calibration.status, CalibrationStatus::AllComplete);
    assert_eq!(calibration.joints_status[0].status, JointProgress::Complete);

    let profile = driver.engine.user_profile().unwrap();
    assert_eq!(profile.user_id, "patient-7");
    let max = profile.calibrated_joints[&JointType::LeftShoulder];
    assert!((max - 120.0).abs() < 1e-6);

    let events = driver.engine.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::JointCalibrated { joint: JointType::LeftShoulder, .. }
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::ProfileReady { .. })));

    // Two reps complete the exercise
    let mut last = None;
    'reps: for _ in 0..3 {
        for pose in rep_cycle() {
            let output = driver.frame(&pose);
            assert_eq!(output.phase, 3);
            let done = output.transition.is_some();
            last = Some(output);
            if done {
                break 'reps;
            }
        }
    }
    let last = last.unwrap();
    let sync = last.sync.unwrap();
    assert!(sync.is_free_training);
    assert_eq!(sync.rep_count, 2);
    assert_eq!(sync.status, SyncPhaseStatus::Complete);
    assert!((0.0..=100.0).contains(&sync.current_score));
    assert_eq!(last.transition.unwrap().to_phase, 4);

    let output = driver.frame(&raised);
    assert_eq!(output.phase, 4);
    assert_eq!(output.phase_name, "scoring");
    assert!(output.transition.is_some());
    let report = output.final_report.unwrap();
    assert_eq!(report.total_reps, 2);
    assert_eq!(report.rep_scores.len(), 2);
    assert_eq!(report.exercise_name, "arm_raise");
    assert_eq!(report.primary_joint, JointType::LeftShoulder);
    assert!((0.0..=100.0).contains(&report.total_score));
    assert!(driver.engine.is_complete());

    // The report is computed once
    let again = driver.frame(&raised);
    assert!(again.transition.is_none());
    assert_eq!(again.final_report.unwrap(), report);

    let events = driver.engine.drain_events();
    let reps = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::RepCompleted { .. }))
        .count();
    assert_eq!(reps, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::SessionCompleted { total_reps: 2, .. })));
}

#[test]
fn test_calibration_retries_then_skips_joint() {
    let mut config = create_test_config();
    config.calibration.joints = vec![JointType::LeftShoulder, JointType::LeftElbow];
    config.calibration.max_retries = 1;
    let mut driver = Driver::new(config);

    assert_eq!(driver.engine.skip_to_phase(2), Ok(true));

    // Nothing measurable: the shoulder is retried once, then skipped
    let empty = LandmarkSet::empty();
    let mut saw_retry = false;
    for _ in 0..200 {
        let output = driver.frame(&empty);
        let calibration = output.calibration.unwrap();
        if calibration.status == CalibrationStatus::Retrying {
            saw_retry = true;
            assert!(output.warning.is_some());
        }
        if calibration.current_joint == Some(JointType::LeftElbow) {
            break;
        }
    }
    assert!(saw_retry);

    let events = driver.engine.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::CalibrationRetry { joint: JointType::LeftShoulder, attempt: 1, .. }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::JointSkipped { joint: JointType::LeftShoulder, .. }
    )));

    // The elbow still calibrates normally
    let output = driver.run_until_transition(&standing_pose(), 3, 200);
    let calibration = output.calibration.unwrap();
    assert_eq!(calibration.joints_status[0].status, JointProgress::Skipped);
    assert_eq!(calibration.joints_status[1].status, JointProgress::Complete);

    let profile = driver.engine.user_profile().unwrap();
    assert!(!profile.is_calibrated(JointType::LeftShoulder));
    assert!(profile.is_calibrated(JointType::LeftElbow));

    // Sync runs on the elbow alone
    let output = driver.frame(&standing_pose());
    assert_eq!(output.phase, 3);
    assert_eq!(driver.engine.state_snapshot().calibrated_joints.len(), 1);
}

#[test]
fn test_invalid_config_reports_not_initialized() {
    let mut config = create_test_config();
    config.scoring.weights.rom = 0.9;
    let mut driver = Driver::new(config);

    for _ in 0..3 {
        let output = driver.frame(&standing_pose());
        assert_eq!(output.phase, 1);
        assert!(output.detection.is_none());
        let error = output.error.unwrap();
        assert!(error.starts_with("Engine not initialized:"), "{}", error);
    }
    assert!(!driver.engine.is_initialized());
    assert!(driver.engine.drain_events().is_empty());
}

#[test]
fn test_skip_to_phase_only_moves_forward() {
    let mut driver = Driver::new(create_test_config());

    assert_eq!(driver.engine.skip_to_phase(9), Err(EngineError::InvalidPhase(9)));
    assert_eq!(driver.engine.skip_to_phase(1), Ok(false));
    assert_eq!(driver.engine.skip_to_phase(3), Ok(true));
    assert_eq!(driver.engine.skip_to_phase(2), Ok(false));

    // Fallback calibration stands in for the skipped phase
    let snapshot = driver.engine.state_snapshot();
    assert_eq!(snapshot.current_phase, 3);
    assert_eq!(snapshot.calibrated_joints[&JointType::LeftShoulder], 150.0);

    let output = driver.frame(&standing_pose());
    assert_eq!(output.phase, 3);
    assert!(output.sync.is_some());

    assert_eq!(driver.engine.skip_to_phase(4), Ok(true));
    let report = driver.frame(&standing_pose()).final_report.unwrap();
    assert_eq!(report.total_reps, 0);
    assert_eq!(report.primary_max_angle, 150.0);
}

#[test]
fn test_pause_and_resume_only_in_sync() {
    let mut driver = Driver::new(create_test_config());
    assert!(!driver.engine.pause());

    driver.engine.skip_to_phase(3).unwrap();
    driver.frame(&standing_pose());
    assert!(driver.engine.pause());
    assert!(!driver.engine.pause());

    for pose in rep_cycle() {
        let sync = driver.frame(&pose).sync.unwrap();
        assert_eq!(sync.status, SyncPhaseStatus::Paused);
        assert!(sync.video_paused);
        assert_eq!(sync.rep_count, 0);
    }

    assert!(driver.engine.resume());
    for pose in rep_cycle() {
        driver.frame(&pose);
    }
    assert_eq!(driver.engine.state_snapshot().rep_count, 1);
}

#[test]
fn test_restart_keeps_instance_id() {
    let mut driver = Driver::new(create_test_config());
    let instance_id = driver.engine.instance_id().to_string();
    let session_id = driver.engine.session_id().to_string();

    driver.engine.skip_to_phase(3).unwrap();
    driver.frame(&standing_pose());
    driver.engine.restart();

    assert_eq!(driver.engine.instance_id(), instance_id);
    assert_ne!(driver.engine.session_id(), session_id);
    assert_eq!(driver.engine.current_phase(), AppPhase::Detection);
    assert!(driver.engine.user_profile().is_none());

    let output = driver.frame(&standing_pose());
    assert_eq!(output.phase, 1);
    assert_eq!(output.detection.unwrap().stable_count, 1);
}

#[test]
fn test_video_sync_pauses_loops_and_skips() {
    let mut config = create_test_config();
    config.sync.reference = Some(ReferenceConfig {
        total_frames: 60,
        fps: 30.0,
        cycles: 1,
    });
    config.sync.max_loops = 10;
    let mut driver = Driver::new(config);
    driver.engine.skip_to_phase(3).unwrap();

    // The user never raises the arm past rest
    let resting = pose_with_angles(&[(JointType::LeftShoulder, 20.0)]);
    let mut statuses = Vec::new();
    let mut paused_video = false;
    while driver.now_ms < 15_000 {
        let output = driver.frame(&resting);
        let Some(sync) = output.sync else { break };
        assert!(!sync.is_free_training);
        if sync.sync_status == Some(SyncStatus::Pause) && sync.video_paused {
            paused_video = true;
        }
        if let Some(status) = sync.sync_status {
            if statuses.last() != Some(&status) {
                statuses.push(status);
            }
        }
        if output.transition.is_some() {
            break;
        }
    }

    assert!(paused_video);
    let position = |status| statuses.iter().position(|s| *s == status).unwrap();
    assert!(position(SyncStatus::Pause) < position(SyncStatus::Loop));
    assert!(position(SyncStatus::Loop) < position(SyncStatus::Skip));

    let events = driver.engine.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::CheckpointSkipped { message, .. } if message == "Hold it there"
    )));
}

#[test]
fn test_sustained_pain_raises_event_and_warning() {
    let mut driver = Driver::new(create_test_config());
    driver.engine.skip_to_phase(3).unwrap();
    let pose = standing_pose();

    let calm = driver.frame_with_face(&pose, Some(&neutral_face()));
    assert!(calm.warning.is_none());

    let pained = pained_face();
    let mut warned = None;
    for _ in 0..40 {
        let output = driver.frame_with_face(&pose, Some(&pained));
        if output.warning.is_some() {
            warned = Some(output);
            break;
        }
    }
    let output = warned.unwrap();
    let sync = output.sync.unwrap();
    assert!(sync.pain_score > 0.0);
    assert_ne!(sync.pain_level, crate::pain::PainLevel::None);

    let events = driver.engine.drain_events();
    let detections = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::PainDetected { .. }))
        .count();
    assert_eq!(detections, 1);
}

#[test]
fn test_output_serializes_one_payload() {
    let mut driver = Driver::new(create_test_config());
    let output = driver.frame(&standing_pose());

    let json: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();
    assert_eq!(json["phase"], 1);
    assert_eq!(json["phase_name"], "detection");
    assert!(json.get("detection").is_some());
    assert!(json.get("sync").is_none());
    assert!(json.get("error").is_none());

    let snapshot = serde_json::to_value(driver.engine.state_snapshot()).unwrap();
    assert_eq!(snapshot["initialized"], true);
    assert_eq!(snapshot["current_phase"], 1);
}

#[test]
fn test_direction_and_feedback() {
    assert_eq!(direction_hint(80.0, 100.0), DirectionHint::Raise);
    assert_eq!(direction_hint(120.0, 100.0), DirectionHint::Lower);
    assert_eq!(direction_hint(95.0, 100.0), DirectionHint::Ok);

    assert_eq!(feedback_text(5.0, 100.0), "Excellent!");
    assert_eq!(feedback_text(15.0, 100.0), "Good!");
    assert_eq!(feedback_text(25.0, 100.0), "Fair");
    assert_eq!(feedback_text(50.0, 100.0), "Adjust!");
    assert_eq!(feedback_text(5.0, 0.0), "");
}

#[test]
fn test_phase_numbers() {
    assert_eq!(AppPhase::Completed.number(), 4);
    assert_eq!(AppPhase::from_number(3), Ok(AppPhase::Sync));
    assert_eq!(EngineOutput::new(AppPhase::Completed).phase_name, "scoring");
}

/// Angles of one smooth 10° -> 110° -> 10° raise, `frames` samples long
fn smooth_rep(frames: usize) -> Vec<LandmarkSet> {
    (0..frames)
        .map(|i| {
            let t = i as f64 / frames as f64 * std::f64::consts::TAU;
            pose_with_angles(&[(JointType::LeftShoulder, 60.0 - 50.0 * t.cos())])
        })
        .collect()
}

#[test]
fn test_free_training_flow_uses_smoothness_estimate() {
    let mut config = create_test_config();
    config.free_training.target_reps = 3;
    let mut driver = Driver::new(config);
    driver.engine.skip_to_phase(3).unwrap();

    let mut finished = false;
    'reps: for _ in 0..4 {
        for pose in smooth_rep(40) {
            if driver.frame(&pose).transition.is_some() {
                finished = true;
                break 'reps;
            }
        }
    }
    assert!(finished);

    let report = driver.frame(&standing_pose()).final_report.unwrap();
    assert_eq!(report.rep_scores.len(), 3);
    for rep in &report.rep_scores {
        assert!(rep.flow_score > 40.0, "flow {}", rep.flow_score);
        assert!(rep.flow_score <= 100.0);
    }
}

#[test]
fn test_video_holds_at_checkpoint_after_loops_run_out() {
    let mut config = create_test_config();
    config.sync.reference = Some(ReferenceConfig {
        total_frames: 300,
        fps: 30.0,
        cycles: 3,
    });
    assert_eq!(config.sync.max_loops, 3);
    let mut driver = Driver::new(config);
    driver.engine.skip_to_phase(3).unwrap();

    let resting = pose_with_angles(&[(JointType::LeftShoulder, 20.0)]);
    let mut loops_exhausted = false;
    let mut held_after_loops = false;
    let mut skipped = false;
    while driver.now_ms < 20_000 && !skipped {
        let output = driver.frame(&resting);
        let sync = output.sync.unwrap();
        skipped = sync.sync_status == Some(SyncStatus::Skip);

        let Some(SyncRuntime::Video {
            controller, video, ..
        }) = &driver.engine.runtime
        else {
            panic!("expected video pacing");
        };
        if sync.sync_status != Some(SyncStatus::Loop) {
            continue;
        }

        let pending = controller.state().checkpoint_index;
        let pending_frame = controller.exercise().checkpoints[pending].frame_index;
        assert!(
            video.current_frame() <= pending_frame,
            "video at {} while waiting on frame {}",
            video.current_frame(),
            pending_frame
        );
        if video.loop_count() >= 3 {
            loops_exhausted = true;
            if video.state() == PlaybackState::Paused {
                held_after_loops = true;
            }
        }
    }

    assert!(loops_exhausted);
    assert!(held_after_loops);
    assert!(skipped);
}

/// Delegates to the health scorer and records the phase tag of every sample
struct PhaseRecorder {
    inner: HealthScorer,
    samples: Arc<Mutex<Vec<(f64, MotionPhase)>>>,
}

impl Scorer for PhaseRecorder {
    fn start_session(&mut self, exercise_name: &str, session_id: &str) {
        self.inner.start_session(exercise_name, session_id);
    }

    fn add_frame(&mut self, sample: FrameSample<'_>) {
        self.samples.lock().push((sample.angle, sample.phase));
        self.inner.add_frame(sample);
    }

    fn complete_rep(&mut self, target_angle: f64, dtw: Option<&DtwResult>) -> RepScore {
        self.inner.complete_rep(target_angle, dtw)
    }

    fn add_pain_event(&mut self, event: PainEvent) {
        self.inner.add_pain_event(event);
    }

    fn compute_session_report(&self) -> SessionReport {
        self.inner.compute_session_report()
    }

    fn current_status(&self) -> ScorerStatus {
        self.inner.current_status()
    }
}

#[test]
fn test_scorer_samples_carry_current_motion_phase() {
    let config = create_test_config();
    let samples = Arc::new(Mutex::new(Vec::new()));
    let engine = SessionEngine::with_components(
        config.clone(),
        Box::new(SafeMaxCalibrator::new(config.calibration.clone())),
        Box::new(PhaseRecorder {
            inner: HealthScorer::new(config.scoring.clone()),
            samples: Arc::clone(&samples),
        }),
        Box::new(PainDetector::new(config.pain.clone())),
    );
    let mut driver = Driver { engine, now_ms: 0 };
    driver.engine.skip_to_phase(3).unwrap();

    // Fallback max 150: above 30 starts the raise, 105 and up is the hold
    for angle in [10.0, 60.0, 120.0] {
        driver.frame(&pose_with_angles(&[(JointType::LeftShoulder, angle)]));
    }

    let samples = samples.lock();
    let phases: Vec<MotionPhase> = samples.iter().map(|(_, phase)| *phase).collect();
    assert_eq!(
        phases,
        vec![MotionPhase::Idle, MotionPhase::Concentric, MotionPhase::Hold]
    );
}
