use super::orchestrator::SessionEngine;
use super::types::{
    direction_hint, feedback_text, AppPhase, EngineOutput, JointError, SyncOutput, SyncPhaseStatus,
};
use crate::events::EngineEvent;
use crate::kinematics::{calculate_joint_angle, compare_sequences, JointType};
use crate::landmarks::{LandmarkSet, POSE_LANDMARK_COUNT};
use crate::scoring::{realtime_joint_score, FrameSample};
use crate::sync::{
    exercise_weights, ExerciseDefinition, ExerciseKind, MotionSyncController, RepDetector,
    SyncEvent, SyncStatus, DEFAULT_JOINT_WEIGHT,
};
use crate::video::{PlaybackState, PlaybackStatus, VideoEngine, VideoInfo};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, warn};

/// Consecutive frames without usable joint angles before a warning is logged
const GEOMETRY_WARN_FRAMES: u32 = 30;

/// Reference used when no video is configured
const DEFAULT_REFERENCE: (u32, f64, u32) = (300, 30.0, 1);

/// How the exercise is paced during sync
pub(super) enum SyncRuntime {
    /// Following a reference video, gated by checkpoints
    Video {
        controller: MotionSyncController,
        video: VideoEngine,
        /// Checkpoint index whose segment is currently being looped
        loop_started_for: Option<usize>,
    },
    /// No reference: reps are counted from the user's own motion
    Free { detector: RepDetector },
}

impl SessionEngine {
    /// Build the exercise around the calibrated joints and start pacing it
    pub(super) fn enter_sync(&mut self, timestamp_ms: u64) {
        self.calibrator.reset();

        if self.state.calibrated_joints.is_empty() {
            let joint = self
                .config
                .calibration
                .joints
                .first()
                .copied()
                .unwrap_or(JointType::LeftShoulder);
            let angle = self.config.sync.fallback_max_angle;
            warn!(
                "No calibrated joints, assuming {} reaches {:.0} deg",
                joint.display_name(),
                angle
            );
            self.state.calibrated_joints.insert(joint, angle);
        }

        let primary = self.select_primary_joint();
        let primary_max = self
            .state
            .calibrated_joints
            .get(&primary)
            .copied()
            .unwrap_or(self.config.sync.fallback_max_angle);

        self.state.primary_joint = primary;
        self.state.primary_max_angle = primary_max;
        self.state.active_joints = self.state.calibrated_joints.keys().copied().collect();
        self.state.joint_weights = exercise_weights(ExerciseKind::for_joint(primary));

        let (total_frames, fps, cycles) = self
            .config
            .sync
            .reference
            .as_ref()
            .map(|r| (r.total_frames, r.fps, r.cycles))
            .unwrap_or(DEFAULT_REFERENCE);
        let exercise = if primary.is_elbow() {
            ExerciseDefinition::elbow_flex(total_frames, fps, primary_max, cycles)
        } else {
            ExerciseDefinition::arm_raise(total_frames, fps, primary_max, cycles)
        }
        .with_joint(primary);

        self.state.exercise_name = exercise.name.clone();
        self.scorer.start_session(&exercise.name, &self.state.session_id);

        if !self.face_baseline.is_empty() {
            if !self.pain.calibrate_baseline(&self.face_baseline) {
                debug!("Face baseline rejected, keeping the default");
            }
            self.face_baseline.clear();
        }

        let runtime = if self.config.sync.reference.is_some() {
            let controller = MotionSyncController::new(&exercise, primary_max, &self.config.sync);
            let mut video = VideoEngine::new(VideoInfo::new(total_frames, fps));
            let checkpoints = &controller.exercise().checkpoints;
            let frames: Vec<u32> = checkpoints.iter().map(|cp| cp.frame_index).collect();
            let messages: BTreeMap<u32, String> = checkpoints
                .iter()
                .map(|cp| (cp.frame_index, cp.message.clone()))
                .collect();
            video.set_checkpoints(&frames, messages);
            video.set_speed(self.config.sync.video_speed);
            video.play(timestamp_ms);
            SyncRuntime::Video {
                controller,
                video,
                loop_started_for: None,
            }
        } else {
            SyncRuntime::Free {
                detector: RepDetector::new(primary_max, &self.config.free_training),
            }
        };

        info!(
            "Exercise {} on {} (safe max {:.1} deg, {} joints, {})",
            exercise.name,
            primary.display_name(),
            primary_max,
            self.state.active_joints.len(),
            match runtime {
                SyncRuntime::Video { .. } => "video",
                SyncRuntime::Free { .. } => "free training",
            }
        );
        self.runtime = Some(runtime);
    }

    /// First calibrated shoulder in queue order, else the first calibrated joint
    fn select_primary_joint(&self) -> JointType {
        let state = &self.state;
        let calibrated = |joint: &&JointType| state.calibrated_joints.contains_key(*joint);

        state
            .calibration_queue
            .iter()
            .filter(calibrated)
            .find(|joint| matches!(joint, JointType::LeftShoulder | JointType::RightShoulder))
            .or_else(|| state.calibration_queue.iter().find(calibrated))
            .copied()
            .or_else(|| state.calibrated_joints.keys().next().copied())
            .unwrap_or(JointType::LeftShoulder)
    }

    pub(super) fn process_sync(
        &mut self,
        landmarks: &LandmarkSet,
        face_landmarks: Option<&LandmarkSet>,
        timestamp_ms: u64,
    ) -> EngineOutput {
        let mut output = EngineOutput::new(AppPhase::Sync);
        if self.state.is_paused {
            let playback = self.playback_status();
            output.sync = Some(self.sync_payload(SyncPhaseStatus::Paused, playback));
            return output;
        }

        let playback = self.advance_video(timestamp_ms);
        self.update_joint_angles(landmarks);
        // Pacing first so the scorer sample carries this frame's motion phase
        let rep_completed = self.update_targets(timestamp_ms);
        self.feed_scorer(landmarks, timestamp_ms);

        self.state.warning = None;
        if let Some(face) = face_landmarks {
            self.analyze_pain(face, timestamp_ms);
        }

        if rep_completed {
            self.score_rep(timestamp_ms);
        }
        self.update_realtime_score();
        self.state.fatigue_level = self.scorer.current_status().fatigue_level;

        let complete = match &self.runtime {
            Some(SyncRuntime::Video { .. }) => {
                self.state.last_sync_status == Some(SyncStatus::Complete)
                    || playback.as_ref().map(|p| p.state) == Some(PlaybackState::Finished)
            }
            Some(SyncRuntime::Free { .. }) => {
                let target_reps = self.config.free_training.target_reps;
                target_reps > 0 && self.state.rep_count >= target_reps
            }
            None => false,
        };

        let status = if complete {
            SyncPhaseStatus::Complete
        } else {
            SyncPhaseStatus::Syncing
        };
        output.sync = Some(self.sync_payload(status, playback));
        output.warning = self.state.warning.clone();

        if complete {
            output.transition = Some(self.transition_to(
                AppPhase::Scoring,
                timestamp_ms,
                "Exercise complete",
            ));
        }
        output
    }

    /// Apply the previous frame's sync decision to the video, then step it
    fn advance_video(&mut self, timestamp_ms: u64) -> Option<PlaybackStatus> {
        let last_status = self.state.last_sync_status;
        let max_loops = self.config.sync.max_loops;
        let Some(SyncRuntime::Video {
            controller,
            video,
            loop_started_for,
        }) = self.runtime.as_mut()
        else {
            return None;
        };

        match last_status {
            Some(SyncStatus::Pause) => video.pause(),
            Some(SyncStatus::Loop) => {
                let index = controller.state().checkpoint_index;
                if *loop_started_for != Some(index) {
                    match controller.loop_segment() {
                        Some((start, end)) => video.start_loop(start, end, max_loops),
                        None => video.pause(),
                    }
                    *loop_started_for = Some(index);
                } else if !matches!(
                    video.state(),
                    PlaybackState::Looping | PlaybackState::Paused
                ) {
                    // Loop budget spent: hold at the checkpoint still being waited on
                    match controller.exercise().checkpoints.get(index) {
                        Some(checkpoint) => {
                            debug!(
                                "Loops exhausted, holding at checkpoint frame {}",
                                checkpoint.frame_index
                            );
                            video.seek(checkpoint.frame_index);
                        }
                        None => video.pause(),
                    }
                }
            }
            _ => {
                if video.state() == PlaybackState::Looping {
                    video.stop_loop();
                }
                if !matches!(
                    video.state(),
                    PlaybackState::Playing | PlaybackState::Finished
                ) {
                    video.play(timestamp_ms);
                }
            }
        }

        let status = video.get_frame(timestamp_ms);
        for event in video.drain_events() {
            debug!("Video event: {:?}", event);
        }
        Some(status)
    }

    fn playback_status(&self) -> Option<PlaybackStatus> {
        match &self.runtime {
            Some(SyncRuntime::Video { video, .. }) => Some(video.status()),
            _ => None,
        }
    }

    /// Angles of every active joint; a joint keeps its last value when geometry fails
    fn update_joint_angles(&mut self, landmarks: &LandmarkSet) {
        let use_3d = self.config.sync.use_3d;
        let mut failed = false;

        for &joint in &self.state.active_joints {
            match calculate_joint_angle(landmarks, joint, use_3d) {
                Ok(angle) => {
                    self.state.user_angles.insert(joint, angle);
                }
                Err(e) => {
                    debug!("Keeping last {} angle: {}", joint.display_name(), e);
                    failed = true;
                }
            }
        }

        if failed {
            self.state.geometry_failures += 1;
            if self.state.geometry_failures == GEOMETRY_WARN_FRAMES {
                warn!(
                    "Joint angles unavailable for {} consecutive frames",
                    GEOMETRY_WARN_FRAMES
                );
            }
        } else {
            self.state.geometry_failures = 0;
        }

        if let Some(&angle) = self.state.user_angles.get(&self.state.primary_joint) {
            self.state.user_angle = angle;
        }
    }

    fn feed_scorer(&mut self, landmarks: &LandmarkSet, timestamp_ms: u64) {
        let primary = self.state.primary_joint;
        let (left, right) = if primary.is_left() {
            (primary, primary.mirror())
        } else {
            (primary.mirror(), primary)
        };
        let use_3d = self.config.sync.use_3d;
        let side_angle = |joint: JointType| {
            self.state
                .user_angles
                .get(&joint)
                .copied()
                .or_else(|| calculate_joint_angle(landmarks, joint, use_3d).ok())
        };

        let mut sample = FrameSample::new(self.state.user_angle, timestamp_ms, self.state.motion_phase);
        sample.left_angle = side_angle(left);
        sample.right_angle = side_angle(right);
        if landmarks.len() >= POSE_LANDMARK_COUNT {
            sample.landmarks = Some(landmarks);
        }
        self.scorer.add_frame(sample);
    }

    fn analyze_pain(&mut self, face: &LandmarkSet, timestamp_ms: u64) {
        let result = self.pain.analyze(face, timestamp_ms);

        if let Some(event) = result.ended_event {
            self.scorer.add_pain_event(event);
        }
        if result.newly_detected {
            warn!(
                "Pain detected: {} (score {:.1})",
                result.pain_level.as_str(),
                result.pain_score
            );
            self.events.push(EngineEvent::PainDetected {
                level: result.pain_level,
                score: result.pain_score,
                timestamp_ms,
            });
        }

        self.state.pain_level = result.pain_level;
        self.state.pain_score = result.pain_score;
        if result.is_pain_detected && !result.message.is_empty() {
            self.state.warning = Some(result.message);
        }
    }

    /// Per-joint targets and pacing for this frame; returns true when a rep finished
    fn update_targets(&mut self, timestamp_ms: u64) -> bool {
        let user_angle = self.state.user_angle;
        let is_video = matches!(self.runtime, Some(SyncRuntime::Video { .. }));
        let state = &mut self.state;
        let mut rep_completed = false;

        match self.runtime.as_mut() {
            Some(SyncRuntime::Video {
                controller, video, ..
            }) => {
                let frame = video.current_frame();
                let base = controller.target_at(frame);
                let reference_max = controller.exercise().reference_max();

                for &joint in &state.active_joints {
                    let joint_max = state.calibrated_joints.get(&joint).copied().unwrap_or(0.0);
                    let factor = if reference_max > 0.0 && joint_max > 0.0 {
                        (joint_max / reference_max).min(1.0)
                    } else {
                        1.0
                    };
                    state.target_angles.insert(joint, base * factor);
                }

                let sync = controller.update(user_angle, frame, timestamp_ms);
                state.motion_phase = sync.current_phase;
                state.last_sync_status = Some(sync.sync_status);
                state.rep_count = sync.rep_count;
                state.target_angle = sync.target_angle;

                for event in controller.drain_events() {
                    match event {
                        SyncEvent::RepCompleted { .. } => rep_completed = true,
                        SyncEvent::CheckpointReached { index, .. } => {
                            debug!("Checkpoint {} reached", index);
                        }
                        SyncEvent::CheckpointSkipped {
                            frame_index,
                            message,
                            timestamp_ms: skipped_at,
                            ..
                        } => {
                            self.events.push(EngineEvent::CheckpointSkipped {
                                frame_index,
                                message,
                                timestamp_ms: skipped_at,
                            });
                        }
                    }
                }
            }
            Some(SyncRuntime::Free { detector }) => {
                rep_completed = detector.update(user_angle);
                state.motion_phase = detector.phase();
                state.rep_count = detector.rep_count();
                state.target_angle = detector.max_angle();
                for &joint in &state.active_joints {
                    let max = state.calibrated_joints.get(&joint).copied().unwrap_or(0.0);
                    state.target_angles.insert(joint, max);
                }
            }
            None => {}
        }

        // Free training has no reference motion to align against
        let window = self.config.sync.dtw_window.max(1);
        push_bounded(&mut state.user_trace, user_angle, window);
        if is_video && state.target_angle > 0.0 {
            push_bounded(&mut state.reference_trace, state.target_angle, window);
        }
        rep_completed
    }

    fn score_rep(&mut self, timestamp_ms: u64) {
        let min_samples = self.config.sync.dtw_min_samples;
        let state = &self.state;
        let is_video = matches!(self.runtime, Some(SyncRuntime::Video { .. }));
        let dtw = (is_video
            && state.user_trace.len() > min_samples
            && state.reference_trace.len() > min_samples)
            .then(|| {
                let user: Vec<f64> = state.user_trace.iter().copied().collect();
                let reference: Vec<f64> = state.reference_trace.iter().copied().collect();
                compare_sequences(&user, &reference, true)
            });

        let target = match &self.runtime {
            Some(SyncRuntime::Video { controller, .. }) => controller.exercise().reference_max(),
            _ => state.primary_max_angle,
        };
        let target = if target > 0.0 {
            target
        } else {
            self.config.sync.fallback_max_angle
        };

        let score = self.scorer.complete_rep(target, dtw.as_ref());
        info!(
            "Rep {} scored {:.1} (rom {:.0}, stability {:.0}, flow {:.0})",
            score.rep_number,
            score.total_score,
            score.rom_score,
            score.stability_score,
            score.flow_score
        );
        self.events.push(EngineEvent::RepCompleted {
            rep_number: score.rep_number,
            total_score: score.total_score,
            timestamp_ms,
        });
    }

    fn update_realtime_score(&mut self) {
        let state = &mut self.state;
        let is_free = matches!(self.runtime, Some(SyncRuntime::Free { .. }));

        let frame_score = if is_free {
            let max = state.primary_max_angle;
            Some(if max > 0.0 {
                (state.user_angle / max).min(1.0) * 100.0
            } else {
                50.0
            })
        } else {
            let mut weighted = 0.0;
            let mut total_weight = 0.0;
            for joint in &state.active_joints {
                let (Some(&user), Some(&target)) =
                    (state.user_angles.get(joint), state.target_angles.get(joint))
                else {
                    continue;
                };
                let Some(score) = realtime_joint_score(user, target) else {
                    continue;
                };
                let weight = state
                    .joint_weights
                    .get(joint)
                    .copied()
                    .unwrap_or(DEFAULT_JOINT_WEIGHT);
                state.joint_scores.insert(*joint, score);
                weighted += weight * score;
                total_weight += weight;
            }
            (total_weight > 0.0).then(|| weighted / total_weight)
        };

        let Some(frame_score) = frame_score else {
            return;
        };
        let smoothing = self.config.sync.score_smoothing;
        state.current_score = if state.score_samples == 0 {
            frame_score
        } else {
            smoothing * state.current_score + (1.0 - smoothing) * frame_score
        };
        state.score_total += frame_score;
        state.score_samples += 1;
        state.average_score = state.score_total / state.score_samples as f64;
    }

    fn sync_payload(
        &self,
        status: SyncPhaseStatus,
        playback: Option<PlaybackStatus>,
    ) -> SyncOutput {
        let state = &self.state;
        let error = (state.user_angle - state.target_angle).abs();

        let joint_errors = state
            .active_joints
            .iter()
            .filter_map(|&joint| {
                let user = *state.user_angles.get(&joint)?;
                let target = *state.target_angles.get(&joint)?;
                if target <= 0.0 {
                    return None;
                }
                let error = (user - target).abs();
                Some(JointError {
                    joint,
                    joint_name: joint.display_name().to_string(),
                    user_angle: user,
                    target_angle: target,
                    error,
                    error_percent: error / target * 100.0,
                    score: realtime_joint_score(user, target).unwrap_or(0.0),
                    direction_hint: direction_hint(user, target),
                    weight: state
                        .joint_weights
                        .get(&joint)
                        .copied()
                        .unwrap_or(DEFAULT_JOINT_WEIGHT),
                })
            })
            .collect();

        let video_paused = state.is_paused
            || playback
                .as_ref()
                .map_or(false, |p| p.state == PlaybackState::Paused);

        SyncOutput {
            status,
            user_angle: state.user_angle,
            target_angle: state.target_angle,
            error,
            motion_phase: state.motion_phase,
            sync_status: state.last_sync_status,
            rep_count: state.rep_count,
            current_score: state.current_score,
            average_score: state.average_score,
            video_progress: playback.as_ref().map_or(0.0, |p| p.progress),
            video_paused,
            is_free_training: matches!(self.runtime, Some(SyncRuntime::Free { .. })),
            pain_level: state.pain_level,
            pain_score: state.pain_score,
            fatigue_level: state.fatigue_level,
            feedback_text: feedback_text(error, state.target_angle).to_string(),
            direction_hint: direction_hint(state.user_angle, state.target_angle),
            joint_errors,
            active_joints_count: state.active_joints.len(),
            warning: state.warning.clone(),
        }
    }
}

fn push_bounded(trace: &mut VecDeque<f64>, value: f64, limit: usize) {
    while trace.len() >= limit {
        trace.pop_front();
    }
    trace.push_back(value);
}
