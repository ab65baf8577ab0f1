use super::orchestrator::SessionEngine;
use super::state::CalibrationStage;
use super::types::{
    AppPhase, CalibrationOutput, CalibrationStatus, EngineOutput, JointCalibrationStatus,
    JointProgress,
};
use crate::calibration::UserProfile;
use crate::events::EngineEvent;
use crate::kinematics::calculate_joint_angle;
use crate::landmarks::LandmarkSet;
use tracing::{debug, info, warn};

impl SessionEngine {
    /// Measure each queued joint's safe maximum, then hand over to sync
    pub(super) fn process_calibration(
        &mut self,
        landmarks: &LandmarkSet,
        face_landmarks: Option<&LandmarkSet>,
        timestamp_ms: u64,
    ) -> EngineOutput {
        self.collect_face_baseline(face_landmarks);

        let stage = match self.state.calibration_stage {
            Some(stage) => stage,
            None => self.begin_next_joint(timestamp_ms),
        };

        let mut output = EngineOutput::new(AppPhase::Calibration);
        let mut countdown_remaining = None;
        let mut warning = None;

        let status = match stage {
            CalibrationStage::Countdown { started_ms } => {
                let countdown_ms = (self.config.calibration.countdown_s * 1000.0) as u64;
                let elapsed = timestamp_ms.saturating_sub(started_ms);
                if elapsed >= countdown_ms {
                    if let Some(joint) = self.state.current_joint() {
                        self.calibrator.start(joint, Some(timestamp_ms));
                        self.state.calibration_stage = Some(CalibrationStage::Collecting);
                    }
                    let (status, message) = self.collect_sample(landmarks, timestamp_ms);
                    warning = message;
                    status
                } else {
                    countdown_remaining = Some((countdown_ms - elapsed) as f64 / 1000.0);
                    CalibrationStatus::Preparing
                }
            }
            CalibrationStage::Collecting => {
                let (status, message) = self.collect_sample(landmarks, timestamp_ms);
                warning = message;
                status
            }
            CalibrationStage::AllComplete { since_ms } => {
                let delay_ms = (self.config.calibration.complete_delay_s * 1000.0) as u64;
                if timestamp_ms.saturating_sub(since_ms) >= delay_ms {
                    self.enter_sync(timestamp_ms);
                    output.transition = Some(self.transition_to(
                        AppPhase::Sync,
                        timestamp_ms,
                        "Calibration complete, starting exercise",
                    ));
                }
                CalibrationStatus::AllComplete
            }
        };

        output.calibration = Some(self.calibration_payload(status, countdown_remaining, &warning));
        output.warning = warning;
        output
    }

    /// Countdown for the current queue entry, or finish when the queue is exhausted
    fn begin_next_joint(&mut self, timestamp_ms: u64) -> CalibrationStage {
        let stage = match self.state.current_joint() {
            Some(joint) => {
                debug!("Preparing calibration of {}", joint.display_name());
                CalibrationStage::Countdown {
                    started_ms: timestamp_ms,
                }
            }
            None => {
                self.finish_calibration(timestamp_ms);
                CalibrationStage::AllComplete {
                    since_ms: timestamp_ms,
                }
            }
        };
        self.state.calibration_stage = Some(stage);
        stage
    }

    fn collect_sample(
        &mut self,
        landmarks: &LandmarkSet,
        timestamp_ms: u64,
    ) -> (CalibrationStatus, Option<String>) {
        let Some(joint) = self.state.current_joint() else {
            self.begin_next_joint(timestamp_ms);
            return (CalibrationStatus::AllComplete, None);
        };

        let done = match calculate_joint_angle(landmarks, joint, self.config.sync.use_3d) {
            Ok(angle) => {
                self.state.current_angle = angle;
                self.calibrator.add_sample(angle, timestamp_ms)
            }
            Err(e) => {
                debug!("No {} angle this frame: {}", joint.display_name(), e);
                self.calibrator.check_timeout(timestamp_ms)
            }
        };
        if !done {
            return (CalibrationStatus::Collecting, None);
        }

        match self.calibrator.finish() {
            Ok(result) => {
                self.state.calibrated_joints.insert(joint, result.max_angle);
                self.events.push(EngineEvent::JointCalibrated {
                    joint,
                    max_angle: result.max_angle,
                    confidence: result.confidence,
                    timestamp_ms,
                });
                self.state.calibration_results.push(result);
                (self.advance_queue(timestamp_ms), None)
            }
            Err(e) => {
                let attempt = {
                    let retries = self.state.retries.entry(joint).or_insert(0);
                    *retries += 1;
                    *retries
                };
                let max_retries = self.config.calibration.max_retries;

                if attempt <= max_retries {
                    warn!(
                        "Calibration of {} failed ({}), retry {}/{}",
                        joint.display_name(),
                        e,
                        attempt,
                        max_retries
                    );
                    self.events.push(EngineEvent::CalibrationRetry {
                        joint,
                        attempt,
                        reason: e.to_string(),
                        timestamp_ms,
                    });
                    self.calibrator.reset();
                    self.state.calibration_stage = Some(CalibrationStage::Countdown {
                        started_ms: timestamp_ms,
                    });
                    let message = format!(
                        "Not enough movement detected for {}. Let's try again.",
                        joint.display_name()
                    );
                    (CalibrationStatus::Retrying, Some(message))
                } else {
                    warn!(
                        "Skipping {} after {} failed attempts: {}",
                        joint.display_name(),
                        attempt,
                        e
                    );
                    self.state.skipped_joints.insert(joint);
                    self.events.push(EngineEvent::JointSkipped {
                        joint,
                        reason: e.to_string(),
                        timestamp_ms,
                    });
                    let message = format!("{} skipped", joint.display_name());
                    (self.advance_queue(timestamp_ms), Some(message))
                }
            }
        }
    }

    fn advance_queue(&mut self, timestamp_ms: u64) -> CalibrationStatus {
        self.state.calibration_index += 1;
        self.calibrator.reset();
        match self.begin_next_joint(timestamp_ms) {
            CalibrationStage::AllComplete { .. } => CalibrationStatus::AllComplete,
            _ => CalibrationStatus::Complete,
        }
    }

    fn finish_calibration(&mut self, timestamp_ms: u64) {
        let profile = UserProfile::from_results(
            self.user_id.clone(),
            self.state.calibration_results.iter(),
        );
        info!(
            "Calibration finished: {} joints calibrated, {} skipped",
            self.state.calibrated_joints.len(),
            self.state.skipped_joints.len()
        );
        self.events.push(EngineEvent::ProfileReady {
            profile: profile.clone(),
            timestamp_ms,
        });
        self.profile = Some(profile);
    }

    /// Neutral face frames for the pain baseline, taken while the user calibrates
    fn collect_face_baseline(&mut self, face_landmarks: Option<&LandmarkSet>) {
        if let Some(face) = face_landmarks {
            if face.has_face() && self.face_baseline.len() < self.config.pain.baseline_frames {
                self.face_baseline.push(face.clone());
            }
        }
    }

    fn calibration_payload(
        &self,
        status: CalibrationStatus,
        countdown_remaining: Option<f64>,
        warning: &Option<String>,
    ) -> CalibrationOutput {
        let state = &self.state;
        let joint = state.current_joint();
        let collecting = state.calibration_stage == Some(CalibrationStage::Collecting);

        let progress = match status {
            CalibrationStatus::Collecting => self.calibrator.progress(),
            CalibrationStatus::Complete | CalibrationStatus::AllComplete => 1.0,
            _ => 0.0,
        };

        let joints_status = state
            .calibration_queue
            .iter()
            .enumerate()
            .map(|(i, &queued)| {
                let max_angle = state.calibrated_joints.get(&queued).copied();
                let progress = if max_angle.is_some() {
                    JointProgress::Complete
                } else if state.skipped_joints.contains(&queued) {
                    JointProgress::Skipped
                } else if i == state.calibration_index && collecting {
                    JointProgress::Collecting
                } else {
                    JointProgress::Pending
                };
                JointCalibrationStatus {
                    joint: queued,
                    joint_name: queued.display_name().to_string(),
                    max_angle,
                    status: progress,
                }
            })
            .collect();

        let message = match (status, joint) {
            (CalibrationStatus::Retrying, _) => warning.clone().unwrap_or_default(),
            (CalibrationStatus::Preparing, Some(joint)) => format!(
                "Get ready to calibrate {} in {}...",
                joint.display_name(),
                countdown_remaining.unwrap_or(0.0).ceil()
            ),
            (CalibrationStatus::Collecting, Some(joint)) => joint.position_instruction().to_string(),
            (CalibrationStatus::Complete, _) => {
                let done = state
                    .calibration_index
                    .checked_sub(1)
                    .and_then(|i| state.calibration_queue.get(i));
                match done {
                    Some(done) => format!("{} done", done.display_name()),
                    None => "Joint done".to_string(),
                }
            }
            (CalibrationStatus::AllComplete, _) => {
                "Calibration complete! Starting the exercise...".to_string()
            }
            _ => String::new(),
        };

        CalibrationOutput {
            status,
            current_joint: joint,
            current_joint_name: joint.map(|j| j.display_name().to_string()),
            countdown_remaining,
            progress,
            current_angle: state.current_angle,
            user_max_angle: state
                .calibration_results
                .last()
                .map(|r| r.max_angle)
                .unwrap_or(0.0),
            queue_index: state.calibration_index,
            total_joints: state.calibration_queue.len(),
            overall_progress: state.calibration_progress(),
            position_instruction: joint
                .map(|j| j.position_instruction().to_string())
                .unwrap_or_default(),
            joints_status,
            message,
        }
    }
}
