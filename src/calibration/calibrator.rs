use crate::config::CalibrationConfig;
use crate::error::CalibrationError;
use crate::kinematics::JointType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationState {
    Idle,
    Collecting,
    Processing,
    Completed,
    Error,
}

impl CalibrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CalibrationState::Completed | CalibrationState::Error)
    }
}

/// Safe range measured for one joint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub joint: JointType,
    pub max_angle: f64,
    pub min_angle: f64,
    pub mean_angle: f64,
    pub std_angle: f64,
    pub confidence: f64,
    pub sample_count: usize,
    pub raw_sample_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Collects angle samples for one joint at a time and derives its safe range
pub trait Calibrator: Send {
    /// Begin collecting for `joint`; without a start time the first sample anchors the clock
    fn start(&mut self, joint: JointType, timestamp_ms: Option<u64>);

    /// Record a sample; returns true once the calibrator reached a terminal state
    fn add_sample(&mut self, angle: f64, timestamp_ms: u64) -> bool;

    /// Finish on elapsed time alone; returns true once terminal
    fn check_timeout(&mut self, timestamp_ms: u64) -> bool;

    fn finish(&mut self) -> Result<CalibrationResult, CalibrationError>;

    fn state(&self) -> CalibrationState;

    fn progress(&self) -> f64;

    fn joint(&self) -> Option<JointType>;

    fn reset(&mut self);
}

/// Percentile-based safe maximum with median smoothing and outlier rejection
pub struct SafeMaxCalibrator {
    config: CalibrationConfig,
    state: CalibrationState,
    joint: Option<JointType>,
    samples: Vec<f64>,
    start_ms: Option<u64>,
    last_ms: Option<u64>,
    outcome: Option<Result<CalibrationResult, CalibrationError>>,
}

impl SafeMaxCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            state: CalibrationState::Idle,
            joint: None,
            samples: Vec::new(),
            start_ms: None,
            last_ms: None,
            outcome: None,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn elapsed_ms(&self, timestamp_ms: u64) -> u64 {
        self.start_ms
            .map(|start| timestamp_ms.saturating_sub(start))
            .unwrap_or(0)
    }

    fn process(&self, joint: JointType) -> Result<CalibrationResult, CalibrationError> {
        let required = self.config.min_samples;
        let raw_sample_count = self.samples.len();
        if raw_sample_count < required {
            return Err(CalibrationError::InsufficientSamples {
                required,
                actual: raw_sample_count,
            });
        }

        let smoothed = median_filter(&self.samples, self.config.median_window);
        let cleaned = remove_outliers(&smoothed, self.config.outlier_std);
        if cleaned.len() < required {
            return Err(CalibrationError::InsufficientSamples {
                required,
                actual: cleaned.len(),
            });
        }

        let max_angle = percentile(&cleaned, self.config.max_percentile);
        let min_angle = percentile(&cleaned, self.config.min_percentile);
        let (mean_angle, std_angle) = mean_std(&cleaned);
        let confidence = (1.0 - std_angle / self.config.confidence_scale).max(0.0);

        Ok(CalibrationResult {
            joint,
            max_angle,
            min_angle,
            mean_angle,
            std_angle,
            confidence,
            sample_count: cleaned.len(),
            raw_sample_count,
            timestamp: Utc::now(),
        })
    }

    fn complete(&mut self) -> Result<CalibrationResult, CalibrationError> {
        let joint = match self.joint {
            Some(joint) => joint,
            None => return Err(CalibrationError::NotStarted),
        };

        self.state = CalibrationState::Processing;
        let outcome = self.process(joint);
        match &outcome {
            Ok(result) => {
                info!(
                    "Calibrated {}: max {:.1}, min {:.1}, confidence {:.2} ({} of {} samples)",
                    joint.display_name(),
                    result.max_angle,
                    result.min_angle,
                    result.confidence,
                    result.sample_count,
                    result.raw_sample_count
                );
                self.state = CalibrationState::Completed;
            }
            Err(e) => {
                debug!("Calibration of {} failed: {}", joint.display_name(), e);
                self.state = CalibrationState::Error;
            }
        }
        self.outcome = Some(outcome.clone());
        outcome
    }

    fn should_finish(&self, timestamp_ms: u64) -> bool {
        (self.start_ms.is_some() && self.elapsed_ms(timestamp_ms) >= self.config.duration_ms)
            || self.samples.len() >= self.config.max_samples
    }
}

impl Calibrator for SafeMaxCalibrator {
    fn start(&mut self, joint: JointType, timestamp_ms: Option<u64>) {
        self.reset();
        self.joint = Some(joint);
        self.start_ms = timestamp_ms;
        self.last_ms = timestamp_ms;
        self.state = CalibrationState::Collecting;
        debug!("Calibration started for {}", joint.display_name());
    }

    fn add_sample(&mut self, angle: f64, timestamp_ms: u64) -> bool {
        if self.state != CalibrationState::Collecting {
            return self.state.is_terminal();
        }

        if self.start_ms.is_none() {
            self.start_ms = Some(timestamp_ms);
        }
        self.last_ms = Some(timestamp_ms);

        if angle.is_finite() {
            self.samples.push(angle);
        }

        if self.should_finish(timestamp_ms) {
            let _ = self.complete();
            return true;
        }
        false
    }

    fn check_timeout(&mut self, timestamp_ms: u64) -> bool {
        if self.state != CalibrationState::Collecting {
            return self.state.is_terminal();
        }

        if self.start_ms.is_none() {
            self.start_ms = Some(timestamp_ms);
        }
        self.last_ms = Some(timestamp_ms);

        if self.should_finish(timestamp_ms) {
            let _ = self.complete();
            return true;
        }
        false
    }

    fn finish(&mut self) -> Result<CalibrationResult, CalibrationError> {
        match (&self.outcome, self.state) {
            (Some(outcome), state) if state.is_terminal() => outcome.clone(),
            (_, CalibrationState::Idle) => Err(CalibrationError::NotStarted),
            _ => self.complete(),
        }
    }

    fn state(&self) -> CalibrationState {
        self.state
    }

    fn progress(&self) -> f64 {
        match self.state {
            CalibrationState::Idle => 0.0,
            CalibrationState::Collecting => {
                let by_time = self
                    .last_ms
                    .map(|ts| self.elapsed_ms(ts) as f64 / self.config.duration_ms.max(1) as f64)
                    .unwrap_or(0.0);
                let by_count = self.samples.len() as f64 / self.config.max_samples.max(1) as f64;
                by_time.max(by_count).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }

    fn joint(&self) -> Option<JointType> {
        self.joint
    }

    fn reset(&mut self) {
        self.state = CalibrationState::Idle;
        self.joint = None;
        self.samples.clear();
        self.start_ms = None;
        self.last_ms = None;
        self.outcome = None;
    }
}

/// Sliding median with the window truncated at both edges
pub fn median_filter(values: &[f64], window: usize) -> Vec<f64> {
    if window < 2 || values.len() < window {
        return values.to_vec();
    }

    let half = window / 2;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(values.len());
            median(&values[lo..hi])
        })
        .collect()
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Keep values within `mean ± n_std·σ`; everything survives when σ is zero
pub fn remove_outliers(values: &[f64], n_std: f64) -> Vec<f64> {
    let (mean, std) = mean_std(values);
    if std < 1e-10 {
        return values.to_vec();
    }
    values
        .iter()
        .copied()
        .filter(|v| (v - mean).abs() <= n_std * std)
        .collect()
}

/// Linear interpolation between closest ranks
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Mean and population standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
