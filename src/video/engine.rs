use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Message reported for checkpoints registered without one
const DEFAULT_CHECKPOINT_MESSAGE: &str = "Checkpoint reached";

/// Length and rate of the reference video
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub total_frames: u32,
    pub fps: f64,
}

impl VideoInfo {
    pub fn new(total_frames: u32, fps: f64) -> Self {
        Self {
            total_frames: total_frames.max(1),
            fps: if fps > 0.0 { fps } else { 30.0 },
        }
    }

    pub fn last_frame(&self) -> u32 {
        self.total_frames.saturating_sub(1)
    }

    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.fps
    }

    pub fn duration_ms(&self) -> u64 {
        (self.total_frames as f64 * self.frame_interval_ms()) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    Looping,
    Seeking,
    Finished,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Looping => "looping",
            PlaybackState::Seeking => "seeking",
            PlaybackState::Finished => "finished",
        }
    }

    fn advances(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Looping)
    }
}

/// Transport snapshot returned by every `get_frame`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub current_frame: u32,
    pub current_time_ms: u64,
    pub progress: f64,
    pub is_at_checkpoint: bool,
    pub checkpoint_message: String,
    pub loop_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoEvent {
    CheckpointReached { frame: u32, message: String },
    LoopCompleted { count: u32 },
    Finished,
}

enum Step {
    Continue,
    Checkpoint(String),
    Halt,
}

/// Frame clock for a reference video; decoding is left to the caller
pub struct VideoEngine {
    info: VideoInfo,
    state: PlaybackState,
    current_frame: u32,
    speed: f64,
    /// Time the last frame step was due, `None` until playback is (re)started
    clock_ms: Option<f64>,

    checkpoints: Vec<u32>,
    checkpoint_messages: BTreeMap<u32, String>,
    next_checkpoint: usize,

    loop_start: u32,
    loop_end: u32,
    loop_count: u32,
    max_loops: u32,

    events: Vec<VideoEvent>,
}

impl VideoEngine {
    pub fn new(info: VideoInfo) -> Self {
        let info = VideoInfo::new(info.total_frames, info.fps);
        debug!(
            "Video engine ready: {} frames at {:.1} fps",
            info.total_frames, info.fps
        );
        Self {
            info,
            state: PlaybackState::Stopped,
            current_frame: 0,
            speed: 1.0,
            clock_ms: None,
            checkpoints: Vec::new(),
            checkpoint_messages: BTreeMap::new(),
            next_checkpoint: 0,
            loop_start: 0,
            loop_end: 0,
            loop_count: 0,
            max_loops: 3,
            events: Vec::new(),
        }
    }

    pub fn info(&self) -> VideoInfo {
        self.info
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn set_checkpoints(&mut self, frames: &[u32], messages: BTreeMap<u32, String>) {
        let mut frames = frames.to_vec();
        frames.sort_unstable();
        frames.dedup();
        self.checkpoints = frames;
        self.checkpoint_messages = messages;
        self.sync_checkpoint_index();
    }

    /// Playback rate multiplier, clamped to `[0.1, 3.0]`
    pub fn set_speed(&mut self, factor: f64) {
        self.speed = if factor.is_finite() {
            factor.clamp(0.1, 3.0)
        } else {
            1.0
        };
    }

    pub fn play(&mut self, now_ms: u64) {
        if self.state == PlaybackState::Finished {
            self.seek(0);
        }
        self.state = PlaybackState::Playing;
        self.clock_ms = Some(now_ms as f64);
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Finished {
            self.state = PlaybackState::Paused;
        }
        self.clock_ms = None;
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.current_frame = 0;
        self.loop_count = 0;
        self.clock_ms = None;
        self.sync_checkpoint_index();
    }

    /// Jump to `frame` (clamped); playback settles in `Paused`
    pub fn seek(&mut self, frame: u32) -> u32 {
        self.state = PlaybackState::Seeking;
        self.move_to(frame);
        self.state = PlaybackState::Paused;
        self.clock_ms = None;
        self.current_frame
    }

    pub fn seek_time(&mut self, time_ms: u64) -> u32 {
        let frame = (time_ms as f64 / self.info.frame_interval_ms()) as u32;
        self.seek(frame)
    }

    /// Replay `start..=end` up to `max_loops` times before resuming normal playback
    pub fn start_loop(&mut self, start: u32, end: u32, max_loops: u32) {
        let last = self.info.last_frame();
        self.loop_start = start.min(last);
        self.loop_end = end.min(last).max(self.loop_start);
        self.loop_count = 0;
        self.max_loops = max_loops.max(1);
        self.move_to(self.loop_start);
        self.state = PlaybackState::Looping;
        self.clock_ms = None;
        info!(
            "Looping frames {}..={} (max {} loops)",
            self.loop_start, self.loop_end, self.max_loops
        );
    }

    pub fn stop_loop(&mut self) {
        if self.state == PlaybackState::Looping {
            self.state = PlaybackState::Playing;
        }
        self.loop_count = 0;
    }

    /// Advance by however many frames are due at `now_ms`, stopping early at a checkpoint
    pub fn get_frame(&mut self, now_ms: u64) -> PlaybackStatus {
        if !self.state.advances() {
            return self.status();
        }

        let now = now_ms as f64;
        let Some(mut due) = self.clock_ms else {
            self.clock_ms = Some(now);
            return self.status();
        };

        let interval = self.info.frame_interval_ms() / self.speed;
        let mut checkpoint = None;
        while now - due >= interval {
            due += interval;
            match self.step() {
                Step::Continue => {}
                Step::Checkpoint(message) => {
                    checkpoint = Some(message);
                    due = now;
                    break;
                }
                Step::Halt => {
                    due = now;
                    break;
                }
            }
        }
        if self.state.advances() {
            self.clock_ms = Some(due);
        }

        let mut status = self.status();
        if let Some(message) = checkpoint {
            status.is_at_checkpoint = true;
            status.checkpoint_message = message;
        }
        status
    }

    fn step(&mut self) -> Step {
        if self.current_frame >= self.info.last_frame() {
            self.finish();
            return Step::Halt;
        }
        self.current_frame += 1;

        if self.state == PlaybackState::Looping && self.current_frame >= self.loop_end {
            self.loop_count += 1;
            self.events.push(VideoEvent::LoopCompleted {
                count: self.loop_count,
            });
            if self.loop_count >= self.max_loops {
                debug!("Loop limit {} reached, resuming playback", self.max_loops);
                self.state = PlaybackState::Playing;
            } else {
                self.move_to(self.loop_start);
                return Step::Continue;
            }
        }

        if let Some(message) = self.check_checkpoint() {
            return Step::Checkpoint(message);
        }

        if self.current_frame >= self.info.last_frame() {
            self.finish();
            return Step::Halt;
        }
        Step::Continue
    }

    fn finish(&mut self) {
        if self.state != PlaybackState::Finished {
            self.state = PlaybackState::Finished;
            self.clock_ms = None;
            self.events.push(VideoEvent::Finished);
            info!("Reference video finished at frame {}", self.current_frame);
        }
    }

    fn check_checkpoint(&mut self) -> Option<String> {
        let frame = *self.checkpoints.get(self.next_checkpoint)?;
        if self.current_frame < frame {
            return None;
        }
        self.next_checkpoint += 1;
        let message = self
            .checkpoint_messages
            .get(&frame)
            .cloned()
            .unwrap_or_else(|| DEFAULT_CHECKPOINT_MESSAGE.to_string());
        debug!("Video checkpoint at frame {}", frame);
        self.events.push(VideoEvent::CheckpointReached {
            frame,
            message: message.clone(),
        });
        Some(message)
    }

    fn move_to(&mut self, frame: u32) {
        self.current_frame = frame.min(self.info.last_frame());
        self.sync_checkpoint_index();
    }

    fn sync_checkpoint_index(&mut self) {
        // Checkpoints at or before the current frame count as passed
        self.next_checkpoint = self
            .checkpoints
            .iter()
            .take_while(|&&cp| cp <= self.current_frame)
            .count();
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            current_frame: self.current_frame,
            current_time_ms: (self.current_frame as f64 * self.info.frame_interval_ms()) as u64,
            progress: self.current_frame as f64 / self.info.total_frames as f64,
            is_at_checkpoint: false,
            checkpoint_message: String::new(),
            loop_count: self.loop_count,
        }
    }

    pub fn drain_events(&mut self) -> Vec<VideoEvent> {
        std::mem::take(&mut self.events)
    }
}
