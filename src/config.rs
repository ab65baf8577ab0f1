use crate::kinematics::JointType;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MemotionConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub free_training: FreeTrainingConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub pain: PainConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Consecutive frames with a pose required before the countdown starts
    #[serde(default = "default_stable_frames")]
    pub stable_frames: u32,

    /// Countdown before calibration begins (seconds)
    #[serde(default = "default_detection_countdown")]
    pub countdown_s: f64,

    /// Minimum shoulder visibility for a frame to count as a detected pose
    #[serde(default = "default_min_visibility")]
    pub min_visibility: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CalibrationConfig {
    /// Collection window per joint (milliseconds)
    #[serde(default = "default_calibration_duration")]
    pub duration_ms: u64,

    /// Minimum samples left after filtering
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Hard cap on collected samples per joint
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Sliding median window
    #[serde(default = "default_median_window")]
    pub median_window: usize,

    /// Outlier cut-off in standard deviations
    #[serde(default = "default_outlier_std")]
    pub outlier_std: f64,

    /// Percentile used as the safe maximum
    #[serde(default = "default_max_percentile")]
    pub max_percentile: f64,

    /// Percentile used as the safe minimum
    #[serde(default = "default_min_percentile")]
    pub min_percentile: f64,

    /// Standard deviation (degrees) at which confidence reaches zero
    #[serde(default = "default_confidence_scale")]
    pub confidence_scale: f64,

    /// Countdown before each joint is measured (seconds)
    #[serde(default = "default_calibration_countdown")]
    pub countdown_s: f64,

    /// Settle delay after the last joint (seconds)
    #[serde(default = "default_complete_delay")]
    pub complete_delay_s: f64,

    /// Explicit restarts allowed for a joint that failed calibration
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Calibration queue, measured in order
    #[serde(default = "default_calibration_joints")]
    pub joints: Vec<JointType>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SyncConfig {
    /// Longest wait at an unmet checkpoint before it is skipped (seconds)
    #[serde(default = "default_max_wait")]
    pub max_wait_s: f64,

    /// Wait after which the segment before the checkpoint is replayed (seconds)
    #[serde(default = "default_loop_after")]
    pub loop_after_s: f64,

    /// Replays of a segment before playback continues
    #[serde(default = "default_max_loops")]
    pub max_loops: u32,

    /// Reference video playback speed factor
    #[serde(default = "default_video_speed")]
    pub video_speed: f64,

    /// Safe maximum assumed for a joint without calibration data
    #[serde(default = "default_fallback_max_angle")]
    pub fallback_max_angle: f64,

    /// Weight of the previous value in the realtime score smoothing
    #[serde(default = "default_score_smoothing")]
    pub score_smoothing: f64,

    /// Minimum user and reference samples before DTW is computed
    #[serde(default = "default_dtw_min_samples")]
    pub dtw_min_samples: usize,

    /// Number of trailing samples compared with DTW
    #[serde(default = "default_dtw_window")]
    pub dtw_window: usize,

    /// Measure angles in 3D instead of the image plane
    #[serde(default = "default_use_3d")]
    pub use_3d: bool,

    /// Reference video; free-training mode when absent
    #[serde(default)]
    pub reference: Option<ReferenceConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReferenceConfig {
    #[serde(default = "default_reference_frames")]
    pub total_frames: u32,

    #[serde(default = "default_reference_fps")]
    pub fps: f64,

    /// Exercise repetitions demonstrated in the video
    #[serde(default = "default_reference_cycles")]
    pub cycles: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FreeTrainingConfig {
    /// Fraction of the safe max below which the limb is at rest
    #[serde(default = "default_low_ratio")]
    pub low_ratio: f64,

    /// Fraction of the safe max that counts as reaching the top
    #[serde(default = "default_high_ratio")]
    pub high_ratio: f64,

    /// Drop (degrees) that turns a rising movement into a lowering one
    #[serde(default = "default_eccentric_drop")]
    pub eccentric_drop: f64,

    /// Drop from the peak (degrees) that ends a hold
    #[serde(default = "default_hold_drop")]
    pub hold_drop: f64,

    /// Reps after which the session moves to scoring (0 = unlimited)
    #[serde(default)]
    pub target_reps: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoreWeights,

    /// Samples a rep needs before it is scored
    #[serde(default = "default_min_rep_samples")]
    pub min_rep_samples: usize,

    /// Samples kept per rep; older samples are discarded
    #[serde(default = "default_max_rep_samples")]
    pub max_rep_samples: usize,

    #[serde(default)]
    pub fatigue: FatigueThresholds,
}

/// Weights of the five sub-scores in the total
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub rom: f64,
    pub stability: f64,
    pub flow: f64,
    pub symmetry: f64,
    pub compensation: f64,
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.rom + self.stability + self.flow + self.symmetry + self.compensation
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            rom: 0.30,
            stability: 0.20,
            flow: 0.20,
            symmetry: 0.15,
            compensation: 0.15,
        }
    }
}

/// Jerk ratios (current / baseline) for each fatigue level
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct FatigueThresholds {
    pub light: f64,
    pub moderate: f64,
    pub heavy: f64,
}

impl Default for FatigueThresholds {
    fn default() -> Self {
        Self {
            light: 1.5,
            moderate: 2.0,
            heavy: 3.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PainConfig {
    /// Scores averaged for smoothing
    #[serde(default = "default_pain_history")]
    pub history_size: usize,

    /// Sustained duration before pain is reported (milliseconds)
    #[serde(default = "default_pain_min_duration")]
    pub min_duration_ms: u64,

    #[serde(default = "default_pain_mild")]
    pub mild: f64,

    #[serde(default = "default_pain_moderate")]
    pub moderate: f64,

    #[serde(default = "default_pain_severe")]
    pub severe: f64,

    /// Frames used for baseline calibration
    #[serde(default = "default_baseline_frames")]
    pub baseline_frames: usize,

    #[serde(default = "ActionUnitTable::default_thresholds")]
    pub au_thresholds: ActionUnitTable,

    #[serde(default = "ActionUnitTable::default_weights")]
    pub au_weights: ActionUnitTable,
}

/// One value per facial action unit
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct ActionUnitTable {
    pub au4: f64,
    pub au6: f64,
    pub au7: f64,
    pub au9: f64,
    pub au10: f64,
    pub au43: f64,
}

impl ActionUnitTable {
    pub fn default_thresholds() -> Self {
        Self {
            au4: 0.15,
            au6: 0.12,
            au7: 0.15,
            au9: 0.10,
            au10: 0.12,
            au43: 0.40,
        }
    }

    pub fn default_weights() -> Self {
        Self {
            au4: 0.25,
            au6: 0.15,
            au7: 0.20,
            au9: 0.10,
            au10: 0.10,
            au43: 0.20,
        }
    }

    pub fn values(&self) -> [f64; 6] {
        [self.au4, self.au6, self.au7, self.au9, self.au10, self.au43]
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SessionConfig {
    /// Idle time after which the registry evicts a session (seconds)
    #[serde(default = "default_session_timeout")]
    pub timeout_s: u64,

    /// Interval between registry sweeps (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_s: u64,

    /// Engine events kept before the oldest are dropped
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    /// Directory for calibration profiles written by the CLI
    #[serde(default = "default_profile_dir")]
    pub profile_dir: String,
}

impl MemotionConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("memotion.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&MemotionConfig::default())?)
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // MEMOTION_SYNC__MAX_WAIT_S=15 -> sync.max_wait_s
            .add_source(
                Environment::with_prefix("MEMOTION")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: MemotionConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detection.stable_frames == 0 {
            return Err(ConfigError::Message(
                "Detection stable_frames must be greater than 0".to_string(),
            ));
        }

        if self.detection.countdown_s < 0.0 || self.calibration.countdown_s < 0.0 {
            return Err(ConfigError::Message(
                "Countdown durations must not be negative".to_string(),
            ));
        }

        // Calibration window and statistics
        if self.calibration.duration_ms == 0 {
            return Err(ConfigError::Message(
                "Calibration duration_ms must be greater than 0".to_string(),
            ));
        }

        if self.calibration.min_samples == 0
            || self.calibration.max_samples < self.calibration.min_samples
        {
            return Err(ConfigError::Message(
                "Calibration sample limits are inconsistent".to_string(),
            ));
        }

        let (lo, hi) = (self.calibration.min_percentile, self.calibration.max_percentile);
        if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo >= hi {
            return Err(ConfigError::Message(format!(
                "Calibration percentiles must satisfy 0 <= min < max <= 100 (got {} / {})",
                lo, hi
            )));
        }

        if self.calibration.joints.is_empty() {
            return Err(ConfigError::Message(
                "Calibration joint queue must not be empty".to_string(),
            ));
        }

        // Synchronizer and playback
        if self.sync.max_wait_s <= 0.0 {
            return Err(ConfigError::Message(
                "Sync max_wait_s must be greater than 0".to_string(),
            ));
        }

        if !(0.1..=3.0).contains(&self.sync.video_speed) {
            return Err(ConfigError::Message(format!(
                "Video speed must be between 0.1 and 3.0 (got {})",
                self.sync.video_speed
            )));
        }

        if !(0.0..1.0).contains(&self.sync.score_smoothing) {
            return Err(ConfigError::Message(
                "Score smoothing must be in [0, 1)".to_string(),
            ));
        }

        if let Some(reference) = &self.sync.reference {
            if reference.total_frames == 0 || reference.fps <= 0.0 || reference.cycles == 0 {
                return Err(ConfigError::Message(
                    "Reference video needs frames, fps and at least one cycle".to_string(),
                ));
            }
        }

        if self.free_training.low_ratio >= self.free_training.high_ratio {
            return Err(ConfigError::Message(
                "Free training low_ratio must be below high_ratio".to_string(),
            ));
        }

        // Scoring
        if (self.scoring.weights.sum() - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Message(format!(
                "Score weights must sum to 1.0 (got {:.4})",
                self.scoring.weights.sum()
            )));
        }

        let fatigue = &self.scoring.fatigue;
        if !(fatigue.light < fatigue.moderate && fatigue.moderate < fatigue.heavy) {
            return Err(ConfigError::Message(
                "Fatigue thresholds must increase from light to heavy".to_string(),
            ));
        }

        // Pain
        if self.pain.history_size == 0 {
            return Err(ConfigError::Message(
                "Pain history_size must be greater than 0".to_string(),
            ));
        }

        if !(self.pain.mild < self.pain.moderate && self.pain.moderate < self.pain.severe) {
            return Err(ConfigError::Message(
                "Pain level thresholds must increase from mild to severe".to_string(),
            ));
        }

        if self.session.event_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Event queue capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Default configuration rendered as TOML
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&MemotionConfig::default())
    }
}

impl Default for MemotionConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            calibration: CalibrationConfig::default(),
            sync: SyncConfig::default(),
            free_training: FreeTrainingConfig::default(),
            scoring: ScoringConfig::default(),
            pain: PainConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            stable_frames: default_stable_frames(),
            countdown_s: default_detection_countdown(),
            min_visibility: default_min_visibility(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_calibration_duration(),
            min_samples: default_min_samples(),
            max_samples: default_max_samples(),
            median_window: default_median_window(),
            outlier_std: default_outlier_std(),
            max_percentile: default_max_percentile(),
            min_percentile: default_min_percentile(),
            confidence_scale: default_confidence_scale(),
            countdown_s: default_calibration_countdown(),
            complete_delay_s: default_complete_delay(),
            max_retries: default_max_retries(),
            joints: default_calibration_joints(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_wait_s: default_max_wait(),
            loop_after_s: default_loop_after(),
            max_loops: default_max_loops(),
            video_speed: default_video_speed(),
            fallback_max_angle: default_fallback_max_angle(),
            score_smoothing: default_score_smoothing(),
            dtw_min_samples: default_dtw_min_samples(),
            dtw_window: default_dtw_window(),
            use_3d: default_use_3d(),
            reference: None,
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            total_frames: default_reference_frames(),
            fps: default_reference_fps(),
            cycles: default_reference_cycles(),
        }
    }
}

impl Default for FreeTrainingConfig {
    fn default() -> Self {
        Self {
            low_ratio: default_low_ratio(),
            high_ratio: default_high_ratio(),
            eccentric_drop: default_eccentric_drop(),
            hold_drop: default_hold_drop(),
            target_reps: 0,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            min_rep_samples: default_min_rep_samples(),
            max_rep_samples: default_max_rep_samples(),
            fatigue: FatigueThresholds::default(),
        }
    }
}

impl Default for PainConfig {
    fn default() -> Self {
        Self {
            history_size: default_pain_history(),
            min_duration_ms: default_pain_min_duration(),
            mild: default_pain_mild(),
            moderate: default_pain_moderate(),
            severe: default_pain_severe(),
            baseline_frames: default_baseline_frames(),
            au_thresholds: ActionUnitTable::default_thresholds(),
            au_weights: ActionUnitTable::default_weights(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_s: default_session_timeout(),
            sweep_interval_s: default_sweep_interval(),
            event_queue_capacity: default_event_queue_capacity(),
            profile_dir: default_profile_dir(),
        }
    }
}

// Default value functions
fn default_stable_frames() -> u32 {
    30
}
fn default_detection_countdown() -> f64 {
    3.0
}
fn default_min_visibility() -> f64 {
    0.5
}

fn default_calibration_duration() -> u64 {
    5000
}
fn default_min_samples() -> usize {
    30
}
fn default_max_samples() -> usize {
    900
}
fn default_median_window() -> usize {
    5
}
fn default_outlier_std() -> f64 {
    2.0
}
fn default_max_percentile() -> f64 {
    95.0
}
fn default_min_percentile() -> f64 {
    5.0
}
fn default_confidence_scale() -> f64 {
    30.0
}
fn default_calibration_countdown() -> f64 {
    5.0
}
fn default_complete_delay() -> f64 {
    2.0
}
fn default_max_retries() -> u32 {
    2
}
fn default_calibration_joints() -> Vec<JointType> {
    vec![
        JointType::LeftShoulder,
        JointType::RightShoulder,
        JointType::LeftElbow,
        JointType::RightElbow,
        JointType::LeftKnee,
        JointType::RightKnee,
    ]
}

fn default_max_wait() -> f64 {
    10.0
}
fn default_loop_after() -> f64 {
    4.0
}
fn default_max_loops() -> u32 {
    3
}
fn default_video_speed() -> f64 {
    0.7
}
fn default_fallback_max_angle() -> f64 {
    150.0
}
fn default_score_smoothing() -> f64 {
    0.7
}
fn default_dtw_min_samples() -> usize {
    20
}
fn default_dtw_window() -> usize {
    50
}
fn default_use_3d() -> bool {
    true
}
fn default_reference_frames() -> u32 {
    300
}
fn default_reference_fps() -> f64 {
    30.0
}
fn default_reference_cycles() -> u32 {
    1
}

fn default_low_ratio() -> f64 {
    0.2
}
fn default_high_ratio() -> f64 {
    0.7
}
fn default_eccentric_drop() -> f64 {
    5.0
}
fn default_hold_drop() -> f64 {
    10.0
}

fn default_min_rep_samples() -> usize {
    10
}
fn default_max_rep_samples() -> usize {
    3000
}

fn default_pain_history() -> usize {
    30
}
fn default_pain_min_duration() -> u64 {
    500
}
fn default_pain_mild() -> f64 {
    20.0
}
fn default_pain_moderate() -> f64 {
    45.0
}
fn default_pain_severe() -> f64 {
    70.0
}
fn default_baseline_frames() -> usize {
    90
}

fn default_session_timeout() -> u64 {
    3600
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_event_queue_capacity() -> usize {
    256
}
fn default_profile_dir() -> String {
    "./data/user_profiles".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MemotionConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.detection.stable_frames, 30);
        assert_eq!(config.calibration.duration_ms, 5000);
        assert_eq!(config.calibration.joints.len(), 6);
        assert_eq!(config.sync.max_wait_s, 10.0);
        assert!(config.sync.reference.is_none());
        assert_eq!(config.session.timeout_s, 3600);
    }

    #[test]
    fn test_config_validation() {
        let mut config = MemotionConfig::default();
        config.scoring.weights.rom = 0.5;

        // Weights no longer sum to one
        assert!(config.validate().is_err());

        config.scoring.weights.rom = 0.30;
        assert!(config.validate().is_ok());

        config.sync.video_speed = 5.0;
        assert!(config.validate().is_err());
        config.sync.video_speed = 0.7;

        config.pain.moderate = 10.0;
        assert!(config.validate().is_err());
        config.pain.moderate = 45.0;

        config.calibration.min_percentile = 99.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[detection]
stable_frames = 10

[calibration]
joints = ["left_elbow"]

[sync.reference]
total_frames = 600
"#
        )
        .unwrap();

        let config = MemotionConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.detection.stable_frames, 10);
        assert_eq!(config.calibration.joints, vec![JointType::LeftElbow]);
        let reference = config.sync.reference.unwrap();
        assert_eq!(reference.total_frames, 600);
        assert_eq!(reference.fps, 30.0);
        // Untouched sections keep their defaults
        assert_eq!(config.pain.min_duration_ms, 500);
    }

    #[test]
    fn test_environment_variable_override() {
        env::set_var("MEMOTION_PAIN__HISTORY_SIZE", "12");

        let config = MemotionConfig::load_from_file("does-not-exist.toml").unwrap();
        assert_eq!(config.pain.history_size, 12);

        env::remove_var("MEMOTION_PAIN__HISTORY_SIZE");
    }

    #[test]
    fn test_default_toml_round_trip() {
        let rendered = MemotionConfig::default_toml().unwrap();
        let parsed: MemotionConfig = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed, MemotionConfig::default());
    }
}
