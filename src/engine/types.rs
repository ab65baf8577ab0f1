use crate::error::EngineError;
use crate::kinematics::JointType;
use crate::pain::{PainEvent, PainLevel, PainSummary};
use crate::scoring::{FatigueLevel, FatigueTrend, RepScore};
use crate::sync::{MotionPhase, SyncStatus};
use serde::{Deserialize, Serialize};

/// Protocol phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppPhase {
    Detection,
    Calibration,
    Sync,
    Scoring,
    Completed,
}

impl AppPhase {
    /// Phase number reported to clients; `Completed` shares 4 with `Scoring`
    pub fn number(&self) -> u8 {
        match self {
            AppPhase::Detection => 1,
            AppPhase::Calibration => 2,
            AppPhase::Sync => 3,
            AppPhase::Scoring | AppPhase::Completed => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AppPhase::Detection => "detection",
            AppPhase::Calibration => "calibration",
            AppPhase::Sync => "sync",
            AppPhase::Scoring => "scoring",
            AppPhase::Completed => "completed",
        }
    }

    pub fn from_number(number: u8) -> Result<Self, EngineError> {
        match number {
            1 => Ok(AppPhase::Detection),
            2 => Ok(AppPhase::Calibration),
            3 => Ok(AppPhase::Sync),
            4 => Ok(AppPhase::Scoring),
            other => Err(EngineError::InvalidPhase(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    #[default]
    Idle,
    Detecting,
    Countdown,
    Transitioning,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutput {
    pub status: DetectionStatus,
    pub stable_count: u32,
    pub progress: f64,
    pub pose_detected: bool,
    pub countdown_remaining: Option<f64>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    #[default]
    Preparing,
    Collecting,
    Complete,
    Retrying,
    AllComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointProgress {
    Pending,
    Collecting,
    Complete,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointCalibrationStatus {
    pub joint: JointType,
    pub joint_name: String,
    pub max_angle: Option<f64>,
    pub status: JointProgress,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutput {
    pub status: CalibrationStatus,
    pub current_joint: Option<JointType>,
    pub current_joint_name: Option<String>,
    pub countdown_remaining: Option<f64>,
    pub progress: f64,
    pub current_angle: f64,
    pub user_max_angle: f64,
    pub queue_index: usize,
    pub total_joints: usize,
    pub overall_progress: f64,
    pub position_instruction: String,
    pub joints_status: Vec<JointCalibrationStatus>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionHint {
    Raise,
    Lower,
    #[default]
    Ok,
}

/// Which way the user should move to reach `target_angle`
pub fn direction_hint(user_angle: f64, target_angle: f64) -> DirectionHint {
    let diff = user_angle - target_angle;
    if diff.abs() <= 10.0 {
        DirectionHint::Ok
    } else if diff < 0.0 {
        DirectionHint::Raise
    } else {
        DirectionHint::Lower
    }
}

/// Short praise for the relative error; empty without a target
pub fn feedback_text(error: f64, target_angle: f64) -> &'static str {
    if target_angle <= 0.0 {
        return "";
    }
    let percent = error / target_angle * 100.0;
    if percent < 10.0 {
        "Excellent!"
    } else if percent < 20.0 {
        "Good!"
    } else if percent < 30.0 {
        "Fair"
    } else {
        "Adjust!"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointError {
    pub joint: JointType,
    pub joint_name: String,
    pub user_angle: f64,
    pub target_angle: f64,
    pub error: f64,
    pub error_percent: f64,
    pub score: f64,
    pub direction_hint: DirectionHint,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhaseStatus {
    #[default]
    Syncing,
    Paused,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutput {
    pub status: SyncPhaseStatus,
    pub user_angle: f64,
    pub target_angle: f64,
    pub error: f64,
    pub motion_phase: MotionPhase,
    pub sync_status: Option<SyncStatus>,
    pub rep_count: u32,
    pub current_score: f64,
    pub average_score: f64,
    pub video_progress: f64,
    pub video_paused: bool,
    pub is_free_training: bool,
    pub pain_level: PainLevel,
    pub pain_score: f64,
    pub fatigue_level: FatigueLevel,
    pub feedback_text: String,
    pub direction_hint: DirectionHint,
    pub joint_errors: Vec<JointError>,
    pub active_joints_count: usize,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedJoint {
    pub joint: JointType,
    pub joint_name: String,
    pub max_angle: f64,
}

/// End-of-session summary shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub session_id: String,
    pub exercise_name: String,
    pub duration_seconds: u64,
    pub total_score: f64,
    pub rom_score: f64,
    pub stability_score: f64,
    pub flow_score: f64,
    pub symmetry_score: f64,
    pub compensation_score: f64,
    pub grade: String,
    pub grade_color: String,
    pub total_reps: u32,
    pub fatigue_level: FatigueLevel,
    pub fatigue_trend: FatigueTrend,
    pub calibrated_joints: Vec<CalibratedJoint>,
    pub primary_joint: JointType,
    pub primary_max_angle: f64,
    pub rep_scores: Vec<RepScore>,
    pub pain_events: Vec<PainEvent>,
    pub pain_summary: PainSummary,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from_phase: u8,
    pub to_phase: u8,
    pub message: String,
}

/// Result of one `process_frame` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub phase: u8,
    pub phase_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_report: Option<FinalReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

impl EngineOutput {
    pub fn new(phase: AppPhase) -> Self {
        // Completed keeps reporting as the scoring phase
        let phase = match phase {
            AppPhase::Completed => AppPhase::Scoring,
            other => other,
        };
        Self {
            phase: phase.number(),
            phase_name: phase.name().to_string(),
            detection: None,
            calibration: None,
            sync: None,
            final_report: None,
            warning: None,
            error: None,
            transition: None,
        }
    }

    pub fn failure(phase: AppPhase, error: &EngineError) -> Self {
        let mut output = Self::new(phase);
        output.error = Some(error.to_string());
        output
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
