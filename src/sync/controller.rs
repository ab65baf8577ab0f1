use super::exercise::{ExerciseDefinition, MotionPhase};
use crate::config::SyncConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What the reference video should do after this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Play,
    Pause,
    Loop,
    Skip,
    Complete,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Play => "play",
            SyncStatus::Pause => "pause",
            SyncStatus::Loop => "loop",
            SyncStatus::Skip => "skip",
            SyncStatus::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub current_phase: MotionPhase,
    pub sync_status: SyncStatus,
    pub user_angle: f64,
    pub target_angle: f64,
    pub error: f64,
    pub rep_count: u32,
    pub wait_time_ms: u64,
    pub checkpoint_index: usize,
    pub checkpoints_reached: usize,
    pub checkpoints_skipped: usize,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            current_phase: MotionPhase::Idle,
            sync_status: SyncStatus::Play,
            user_angle: 0.0,
            target_angle: 0.0,
            error: 0.0,
            rep_count: 0,
            wait_time_ms: 0,
            checkpoint_index: 0,
            checkpoints_reached: 0,
            checkpoints_skipped: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    RepCompleted {
        rep_number: u32,
        timestamp_ms: u64,
    },
    CheckpointReached {
        index: usize,
        frame_index: u32,
        timestamp_ms: u64,
    },
    CheckpointSkipped {
        index: usize,
        frame_index: u32,
        message: String,
        timestamp_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Pending,
    Reached,
    Skipped,
}

/// Gates reference playback on the user reaching each checkpoint
pub struct MotionSyncController {
    exercise: ExerciseDefinition,
    user_max_angle: f64,
    max_wait_ms: u64,
    loop_after_ms: u64,
    resolutions: Vec<Resolution>,
    arrived: Vec<bool>,
    wait_started_ms: Option<u64>,
    previous_phase: MotionPhase,
    last_counted_checkpoint: Option<usize>,
    state: SyncState,
    events: Vec<SyncEvent>,
}

impl MotionSyncController {
    pub fn new(exercise: &ExerciseDefinition, user_max_angle: f64, config: &SyncConfig) -> Self {
        let exercise = exercise.rescaled(user_max_angle);
        let count = exercise.checkpoints.len();
        debug!(
            "Sync controller for {} with {} checkpoints (user max {:.1})",
            exercise.name, count, user_max_angle
        );

        Self {
            exercise,
            user_max_angle,
            max_wait_ms: (config.max_wait_s * 1000.0) as u64,
            loop_after_ms: (config.loop_after_s * 1000.0) as u64,
            resolutions: vec![Resolution::Pending; count],
            arrived: vec![false; count],
            wait_started_ms: None,
            previous_phase: MotionPhase::Idle,
            last_counted_checkpoint: None,
            state: SyncState::default(),
            events: Vec::new(),
        }
    }

    pub fn update(&mut self, user_angle: f64, ref_frame: u32, timestamp_ms: u64) -> SyncState {
        let phase = self.exercise.phase_at(ref_frame);
        self.count_rep(phase, ref_frame, timestamp_ms);

        let mut status = SyncStatus::Play;
        let mut target_angle = self.exercise.target_at(ref_frame);
        let mut wait_time_ms = 0;

        while let Some(index) = self.cursor() {
            let checkpoint = &self.exercise.checkpoints[index];
            if checkpoint.frame_index > ref_frame && !self.arrived[index] {
                break;
            }
            self.arrived[index] = true;

            if checkpoint.is_satisfied_by(user_angle) {
                self.resolutions[index] = Resolution::Reached;
                self.wait_started_ms = None;
                self.events.push(SyncEvent::CheckpointReached {
                    index,
                    frame_index: checkpoint.frame_index,
                    timestamp_ms,
                });
                debug!("Checkpoint {} reached at {:.1} deg", index, user_angle);
                continue;
            }

            target_angle = checkpoint.target_angle;
            let started = *self.wait_started_ms.get_or_insert(timestamp_ms);
            wait_time_ms = timestamp_ms.saturating_sub(started);

            status = if wait_time_ms > self.max_wait_ms {
                self.resolutions[index] = Resolution::Skipped;
                self.wait_started_ms = None;
                info!(
                    "Checkpoint {} skipped after {} ms (target {:.1}, user {:.1})",
                    index, wait_time_ms, checkpoint.target_angle, user_angle
                );
                self.events.push(SyncEvent::CheckpointSkipped {
                    index,
                    frame_index: checkpoint.frame_index,
                    message: checkpoint.message.clone(),
                    timestamp_ms,
                });
                SyncStatus::Skip
            } else if wait_time_ms >= self.loop_after_ms {
                SyncStatus::Loop
            } else {
                SyncStatus::Pause
            };
            break;
        }

        if status == SyncStatus::Play && self.cursor().is_none() {
            let past_last = self
                .exercise
                .checkpoints
                .last()
                .map_or(true, |cp| ref_frame > cp.frame_index);
            if past_last {
                status = SyncStatus::Complete;
            }
        }

        self.state = SyncState {
            current_phase: phase,
            sync_status: status,
            user_angle,
            target_angle,
            error: user_angle - target_angle,
            rep_count: self.state.rep_count,
            wait_time_ms,
            checkpoint_index: self.cursor().unwrap_or(self.resolutions.len()),
            checkpoints_reached: self.count(Resolution::Reached),
            checkpoints_skipped: self.count(Resolution::Skipped),
        };
        self.state.clone()
    }

    fn count_rep(&mut self, phase: MotionPhase, ref_frame: u32, timestamp_ms: u64) {
        let phase_checkpoint = self
            .exercise
            .checkpoints
            .iter()
            .rposition(|cp| cp.frame_index <= ref_frame);

        // A looped segment replays frames already seen; each Idle checkpoint counts once
        if self.previous_phase == MotionPhase::Concentric
            && phase == MotionPhase::Idle
            && phase_checkpoint > self.last_counted_checkpoint
        {
            self.state.rep_count += 1;
            self.last_counted_checkpoint = phase_checkpoint;
            info!("Rep {} completed", self.state.rep_count);
            self.events.push(SyncEvent::RepCompleted {
                rep_number: self.state.rep_count,
                timestamp_ms,
            });
        }
        self.previous_phase = phase;
    }

    fn cursor(&self) -> Option<usize> {
        self.resolutions
            .iter()
            .position(|r| *r == Resolution::Pending)
    }

    fn count(&self, resolution: Resolution) -> usize {
        self.resolutions.iter().filter(|r| **r == resolution).count()
    }

    /// Frame range to replay while waiting at the pending checkpoint
    pub fn loop_segment(&self) -> Option<(u32, u32)> {
        let index = self.cursor()?;
        let end = self.exercise.checkpoints[index].frame_index.checked_sub(1)?;
        let start = index
            .checked_sub(1)
            .map(|prev| self.exercise.checkpoints[prev].frame_index)
            .unwrap_or(0);
        (start <= end).then_some((start, end))
    }

    /// Rescaled target at `frame`
    pub fn target_at(&self, frame: u32) -> f64 {
        self.exercise.target_at(frame)
    }

    pub fn exercise(&self) -> &ExerciseDefinition {
        &self.exercise
    }

    pub fn user_max_angle(&self) -> f64 {
        self.user_max_angle
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn reset(&mut self) {
        let count = self.exercise.checkpoints.len();
        self.resolutions = vec![Resolution::Pending; count];
        self.arrived = vec![false; count];
        self.wait_started_ms = None;
        self.previous_phase = MotionPhase::Idle;
        self.last_counted_checkpoint = None;
        self.state = SyncState::default();
        self.events.clear();
    }
}
