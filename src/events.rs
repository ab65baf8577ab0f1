use crate::calibration::UserProfile;
use crate::engine::AppPhase;
use crate::kinematics::JointType;
use crate::pain::PainLevel;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Events raised by a session engine, drained by the caller after each frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The engine moved to a new protocol phase
    PhaseChanged {
        from: AppPhase,
        to: AppPhase,
        timestamp_ms: u64,
    },
    /// A joint finished safe-max calibration
    JointCalibrated {
        joint: JointType,
        max_angle: f64,
        confidence: f64,
        timestamp_ms: u64,
    },
    /// A joint did not collect enough samples and is measured again
    CalibrationRetry {
        joint: JointType,
        attempt: u32,
        reason: String,
        timestamp_ms: u64,
    },
    /// A joint ran out of retries and was left uncalibrated
    JointSkipped {
        joint: JointType,
        reason: String,
        timestamp_ms: u64,
    },
    /// All calibration results are available as a profile
    ProfileReady {
        profile: UserProfile,
        timestamp_ms: u64,
    },
    /// A repetition finished and was scored
    RepCompleted {
        rep_number: u32,
        total_score: f64,
        timestamp_ms: u64,
    },
    /// The user did not reach a checkpoint in time
    CheckpointSkipped {
        frame_index: u32,
        message: String,
        timestamp_ms: u64,
    },
    /// Sustained pain was confirmed
    PainDetected {
        level: PainLevel,
        score: f64,
        timestamp_ms: u64,
    },
    /// The final report was produced
    SessionCompleted {
        total_score: f64,
        total_reps: u32,
        timestamp_ms: u64,
    },
}

impl EngineEvent {
    /// Frame time at which the event was raised
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            EngineEvent::PhaseChanged { timestamp_ms, .. }
            | EngineEvent::JointCalibrated { timestamp_ms, .. }
            | EngineEvent::CalibrationRetry { timestamp_ms, .. }
            | EngineEvent::JointSkipped { timestamp_ms, .. }
            | EngineEvent::ProfileReady { timestamp_ms, .. }
            | EngineEvent::RepCompleted { timestamp_ms, .. }
            | EngineEvent::CheckpointSkipped { timestamp_ms, .. }
            | EngineEvent::PainDetected { timestamp_ms, .. }
            | EngineEvent::SessionCompleted { timestamp_ms, .. } => *timestamp_ms,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            EngineEvent::PhaseChanged { from, to, .. } => {
                format!("Phase changed: {} -> {}", from.name(), to.name())
            }
            EngineEvent::JointCalibrated {
                joint,
                max_angle,
                confidence,
                ..
            } => {
                format!(
                    "{} calibrated: max {:.1} deg (confidence {:.2})",
                    joint.display_name(),
                    max_angle,
                    confidence
                )
            }
            EngineEvent::CalibrationRetry {
                joint,
                attempt,
                reason,
                ..
            } => {
                format!(
                    "{} calibration retry {}: {}",
                    joint.display_name(),
                    attempt,
                    reason
                )
            }
            EngineEvent::JointSkipped { joint, reason, .. } => {
                format!("{} skipped: {}", joint.display_name(), reason)
            }
            EngineEvent::ProfileReady { profile, .. } => {
                format!(
                    "Profile ready for {} ({} joints)",
                    profile.user_id,
                    profile.calibrated_joints.len()
                )
            }
            EngineEvent::RepCompleted {
                rep_number,
                total_score,
                ..
            } => {
                format!("Rep {} completed: {:.1}", rep_number, total_score)
            }
            EngineEvent::CheckpointSkipped {
                frame_index,
                message,
                ..
            } => {
                format!("Checkpoint at frame {} skipped ({})", frame_index, message)
            }
            EngineEvent::PainDetected { level, score, .. } => {
                format!("Pain detected: {} ({:.1})", level.as_str(), score)
            }
            EngineEvent::SessionCompleted {
                total_score,
                total_reps,
                ..
            } => {
                format!(
                    "Session completed: {} reps, score {:.1}",
                    total_reps, total_score
                )
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::PhaseChanged { .. } => "phase_changed",
            EngineEvent::JointCalibrated { .. } => "joint_calibrated",
            EngineEvent::CalibrationRetry { .. } => "calibration_retry",
            EngineEvent::JointSkipped { .. } => "joint_skipped",
            EngineEvent::ProfileReady { .. } => "profile_ready",
            EngineEvent::RepCompleted { .. } => "rep_completed",
            EngineEvent::CheckpointSkipped { .. } => "checkpoint_skipped",
            EngineEvent::PainDetected { .. } => "pain_detected",
            EngineEvent::SessionCompleted { .. } => "session_completed",
        }
    }
}

/// Bounded FIFO of engine events; the oldest entry is dropped when full
#[derive(Debug, Clone)]
pub struct EventQueue {
    events: VecDeque<EngineEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: EngineEvent) {
        match &event {
            EngineEvent::PhaseChanged { .. }
            | EngineEvent::ProfileReady { .. }
            | EngineEvent::SessionCompleted { .. } => info!("{}", event.description()),
            EngineEvent::CalibrationRetry { .. }
            | EngineEvent::JointSkipped { .. }
            | EngineEvent::PainDetected { .. } => warn!("{}", event.description()),
            _ => debug!("Event: {}", event.description()),
        }

        if self.events.len() >= self.capacity {
            if let Some(oldest) = self.events.pop_front() {
                self.dropped += 1;
                warn!(
                    "Event queue full ({}), dropping oldest event: {}",
                    self.capacity,
                    oldest.event_type()
                );
            }
        }
        self.events.push_back(event);
    }

    /// Take every queued event in arrival order
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events raised at or after the given frame time
    Since(u64),
    /// Custom filter function
    Custom(fn(&EngineEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &EngineEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Since(ts) => event.timestamp_ms() >= *ts,
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }

    pub fn apply(&self, events: Vec<EngineEvent>) -> Vec<EngineEvent> {
        events.into_iter().filter(|e| self.matches(e)).collect()
    }
}
