use super::orchestrator::SessionEngine;
use super::types::AppPhase;
use crate::calibration::CalibrationResult;
use crate::kinematics::JointType;
use crate::pain::PainLevel;
use crate::scoring::FatigueLevel;
use crate::sync::{MotionPhase, SyncStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Where calibration of the current queue entry stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStage {
    Countdown { started_ms: u64 },
    Collecting,
    AllComplete { since_ms: u64 },
}

/// Mutable per-session data; replaced wholesale on restart
#[derive(Debug, Clone)]
pub struct EngineState {
    pub current_phase: AppPhase,
    pub session_id: String,
    pub started_ms: Option<u64>,
    pub last_frame_ms: Option<u64>,
    pub is_paused: bool,

    // Detection
    pub stable_count: u32,
    pub detection_countdown_ms: Option<u64>,

    // Calibration
    pub calibration_queue: Vec<JointType>,
    pub calibration_index: usize,
    pub calibration_stage: Option<CalibrationStage>,
    pub calibration_results: Vec<CalibrationResult>,
    pub calibrated_joints: BTreeMap<JointType, f64>,
    pub skipped_joints: BTreeSet<JointType>,
    pub retries: BTreeMap<JointType, u32>,
    pub current_angle: f64,

    // Sync
    pub primary_joint: JointType,
    pub primary_max_angle: f64,
    pub exercise_name: String,
    pub active_joints: Vec<JointType>,
    pub joint_weights: BTreeMap<JointType, f64>,
    pub user_angles: BTreeMap<JointType, f64>,
    pub target_angles: BTreeMap<JointType, f64>,
    pub joint_scores: BTreeMap<JointType, f64>,
    pub user_angle: f64,
    pub target_angle: f64,
    pub motion_phase: MotionPhase,
    pub last_sync_status: Option<SyncStatus>,
    pub rep_count: u32,
    pub current_score: f64,
    pub average_score: f64,
    pub score_total: f64,
    pub score_samples: u64,
    pub user_trace: VecDeque<f64>,
    pub reference_trace: VecDeque<f64>,
    pub geometry_failures: u32,

    // Health
    pub pain_level: PainLevel,
    pub pain_score: f64,
    pub fatigue_level: FatigueLevel,
    pub warning: Option<String>,
}

impl EngineState {
    pub fn new(session_id: String, calibration_queue: Vec<JointType>) -> Self {
        let primary_joint = calibration_queue
            .first()
            .copied()
            .unwrap_or(JointType::LeftShoulder);
        Self {
            current_phase: AppPhase::Detection,
            session_id,
            started_ms: None,
            last_frame_ms: None,
            is_paused: false,
            stable_count: 0,
            detection_countdown_ms: None,
            calibration_queue,
            calibration_index: 0,
            calibration_stage: None,
            calibration_results: Vec::new(),
            calibrated_joints: BTreeMap::new(),
            skipped_joints: BTreeSet::new(),
            retries: BTreeMap::new(),
            current_angle: 0.0,
            primary_joint,
            primary_max_angle: 0.0,
            exercise_name: String::new(),
            active_joints: Vec::new(),
            joint_weights: BTreeMap::new(),
            user_angles: BTreeMap::new(),
            target_angles: BTreeMap::new(),
            joint_scores: BTreeMap::new(),
            user_angle: 0.0,
            target_angle: 0.0,
            motion_phase: MotionPhase::Idle,
            last_sync_status: None,
            rep_count: 0,
            current_score: 0.0,
            average_score: 0.0,
            score_total: 0.0,
            score_samples: 0,
            user_trace: VecDeque::new(),
            reference_trace: VecDeque::new(),
            geometry_failures: 0,
            pain_level: PainLevel::None,
            pain_score: 0.0,
            fatigue_level: FatigueLevel::Fresh,
            warning: None,
        }
    }

    pub fn current_joint(&self) -> Option<JointType> {
        self.calibration_queue.get(self.calibration_index).copied()
    }

    /// Share of the queue that has been measured or given up on
    pub fn calibration_progress(&self) -> f64 {
        if self.calibration_queue.is_empty() {
            return 1.0;
        }
        let done = self.calibrated_joints.len() + self.skipped_joints.len();
        (done as f64 / self.calibration_queue.len() as f64).min(1.0)
    }

    pub fn elapsed_ms(&self) -> u64 {
        match (self.started_ms, self.last_frame_ms) {
            (Some(start), Some(last)) => last.saturating_sub(start),
            _ => 0,
        }
    }
}

/// Monitoring view of a session, safe to serialize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub instance_id: String,
    pub session_id: String,
    pub current_phase: u8,
    pub phase_name: String,
    pub initialized: bool,
    pub is_paused: bool,
    pub pose_detected: bool,
    pub calibration_progress: f64,
    pub calibrated_joints: BTreeMap<JointType, f64>,
    pub rep_count: u32,
    pub average_score: f64,
    pub session_duration_seconds: u64,
    pub pending_events: usize,
}

impl SessionEngine {
    pub fn state_snapshot(&self) -> StateSnapshot {
        let state = &self.state;
        StateSnapshot {
            instance_id: self.instance_id.clone(),
            session_id: state.session_id.clone(),
            current_phase: state.current_phase.number(),
            phase_name: state.current_phase.name().to_string(),
            initialized: self.is_initialized(),
            is_paused: state.is_paused,
            pose_detected: state.stable_count >= self.config.detection.stable_frames,
            calibration_progress: state.calibration_progress(),
            calibrated_joints: state.calibrated_joints.clone(),
            rep_count: state.rep_count,
            average_score: state.average_score,
            session_duration_seconds: state.elapsed_ms() / 1000,
            pending_events: self.events.len(),
        }
    }
}
