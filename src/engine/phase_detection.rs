use super::orchestrator::SessionEngine;
use super::types::{AppPhase, DetectionOutput, DetectionStatus, EngineOutput};
use crate::landmarks::LandmarkSet;
use tracing::debug;

impl SessionEngine {
    /// Wait for a stable pose, then count down into calibration
    pub(super) fn process_detection(
        &mut self,
        landmarks: &LandmarkSet,
        timestamp_ms: u64,
    ) -> EngineOutput {
        let stable_frames = self.config.detection.stable_frames.max(1);
        let countdown_ms = (self.config.detection.countdown_s * 1000.0) as u64;
        let pose_detected = landmarks.has_pose(self.config.detection.min_visibility);

        let mut output = EngineOutput::new(AppPhase::Detection);
        let mut detection = DetectionOutput {
            pose_detected,
            ..Default::default()
        };

        if !pose_detected {
            if self.state.stable_count > 0 {
                debug!("Pose lost after {} stable frames", self.state.stable_count);
            }
            self.state.stable_count = 0;
            self.state.detection_countdown_ms = None;
            detection.status = DetectionStatus::Idle;
            detection.message = "No person detected. Please step into the frame.".to_string();
            output.detection = Some(detection);
            return output;
        }

        self.state.stable_count = self.state.stable_count.saturating_add(1);
        let stable_count = self.state.stable_count;
        detection.stable_count = stable_count;
        detection.progress = (stable_count as f64 / stable_frames as f64).min(1.0);

        if stable_count < stable_frames {
            detection.status = DetectionStatus::Detecting;
            detection.message = "Person detected. Please hold still...".to_string();
        } else {
            let started = *self
                .state
                .detection_countdown_ms
                .get_or_insert(timestamp_ms);
            let elapsed = timestamp_ms.saturating_sub(started);

            if elapsed >= countdown_ms {
                detection.status = DetectionStatus::Transitioning;
                detection.countdown_remaining = Some(0.0);
                detection.message = "Starting calibration...".to_string();
                output.transition = Some(self.transition_to(
                    AppPhase::Calibration,
                    timestamp_ms,
                    "Pose stable, starting calibration",
                ));
            } else {
                let remaining = (countdown_ms - elapsed) as f64 / 1000.0;
                detection.status = DetectionStatus::Countdown;
                detection.countdown_remaining = Some(remaining);
                detection.message = format!("Get ready! Starting in {}...", remaining.ceil());
            }
        }

        output.detection = Some(detection);
        output
    }
}
