use super::dimensions::{
    estimate_flow_score, rom_score, stability_score, symmetry_score, CompensationTracker,
};
use super::fatigue::{analyze_trend, calculate_jerk, classify_fatigue, FatigueAnalysis, FatigueLevel};
use super::report::{generate_recommendations, DimensionAverages, SessionReport};
use crate::config::ScoringConfig;
use crate::kinematics::DtwResult;
use crate::landmarks::LandmarkSet;
use crate::pain::PainEvent;
use crate::sync::MotionPhase;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One frame of the primary joint, as seen by the scorer
#[derive(Debug, Clone, Copy)]
pub struct FrameSample<'a> {
    pub angle: f64,
    pub timestamp_ms: u64,
    pub phase: MotionPhase,
    pub left_angle: Option<f64>,
    pub right_angle: Option<f64>,
    pub landmarks: Option<&'a LandmarkSet>,
}

impl<'a> FrameSample<'a> {
    pub fn new(angle: f64, timestamp_ms: u64, phase: MotionPhase) -> Self {
        Self {
            angle,
            timestamp_ms,
            phase,
            left_angle: None,
            right_angle: None,
            landmarks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepScore {
    pub rep_number: u32,
    pub rom_score: f64,
    pub stability_score: f64,
    pub flow_score: f64,
    pub symmetry_score: f64,
    pub compensation_score: f64,
    pub total_score: f64,
    pub jerk_value: f64,
    pub duration_ms: u64,
    pub compensation_detected: Vec<String>,
    pub notes: String,
}

impl RepScore {
    fn insufficient(rep_number: u32) -> Self {
        Self {
            rep_number,
            rom_score: 0.0,
            stability_score: 0.0,
            flow_score: 0.0,
            symmetry_score: 0.0,
            compensation_score: 0.0,
            total_score: 0.0,
            jerk_value: 0.0,
            duration_ms: 0,
            compensation_detected: Vec::new(),
            notes: "insufficient data".to_string(),
        }
    }
}

/// Realtime summary for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerStatus {
    pub rep_count: u32,
    pub last_score: f64,
    pub average_score: f64,
    pub fatigue_level: FatigueLevel,
}

/// Repetition scoring and session reporting
pub trait Scorer: Send {
    fn start_session(&mut self, exercise_name: &str, session_id: &str);

    fn add_frame(&mut self, sample: FrameSample<'_>);

    fn complete_rep(&mut self, target_angle: f64, dtw: Option<&DtwResult>) -> RepScore;

    fn add_pain_event(&mut self, event: PainEvent);

    fn compute_session_report(&self) -> SessionReport;

    fn current_status(&self) -> ScorerStatus;
}

/// Five-dimension rep scorer with jerk-based fatigue tracking
pub struct HealthScorer {
    config: ScoringConfig,
    session_id: String,
    exercise_name: String,
    rep_scores: Vec<RepScore>,
    rep_number: u32,

    angles: Vec<f64>,
    timestamps_ms: Vec<u64>,
    phases: Vec<MotionPhase>,
    left_angles: Vec<f64>,
    right_angles: Vec<f64>,
    compensation: CompensationTracker,

    jerk_values: Vec<f64>,
    baseline_jerk: Option<f64>,
    pain_events: Vec<PainEvent>,
}

impl HealthScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            session_id: String::new(),
            exercise_name: String::new(),
            rep_scores: Vec::new(),
            rep_number: 0,
            angles: Vec::new(),
            timestamps_ms: Vec::new(),
            phases: Vec::new(),
            left_angles: Vec::new(),
            right_angles: Vec::new(),
            compensation: CompensationTracker::default(),
            jerk_values: Vec::new(),
            baseline_jerk: None,
            pain_events: Vec::new(),
        }
    }

    /// Samples buffered for the rep in progress
    pub fn pending_samples(&self) -> usize {
        self.angles.len()
    }

    pub fn rep_scores(&self) -> &[RepScore] {
        &self.rep_scores
    }

    fn reset_rep(&mut self) {
        self.angles.clear();
        self.timestamps_ms.clear();
        self.phases.clear();
        self.left_angles.clear();
        self.right_angles.clear();
        self.compensation.clear();
    }

    fn fatigue_level(&self) -> FatigueLevel {
        let baseline = match self.baseline_jerk {
            Some(b) if b > 1e-6 => b,
            _ => return FatigueLevel::Fresh,
        };
        match self.jerk_values.last() {
            Some(current) if self.jerk_values.len() >= 2 => {
                classify_fatigue(current / baseline, &self.config.fatigue)
            }
            _ => FatigueLevel::Fresh,
        }
    }

    fn fatigue_analysis(&self) -> FatigueAnalysis {
        let (trend, jerk_increase_percent) = analyze_trend(&self.jerk_values);
        FatigueAnalysis {
            trend,
            fatigue_level: self.fatigue_level(),
            jerk_increase_percent,
            jerk_values: self.jerk_values.clone(),
        }
    }
}

impl Scorer for HealthScorer {
    fn start_session(&mut self, exercise_name: &str, session_id: &str) {
        self.session_id = session_id.to_string();
        self.exercise_name = exercise_name.to_string();
        self.rep_scores.clear();
        self.rep_number = 0;
        self.jerk_values.clear();
        self.baseline_jerk = None;
        self.pain_events.clear();
        self.reset_rep();
        info!("Scoring session {} started ({})", session_id, exercise_name);
    }

    fn add_frame(&mut self, sample: FrameSample<'_>) {
        if self.angles.len() >= self.config.max_rep_samples.max(1) {
            self.angles.remove(0);
            self.timestamps_ms.remove(0);
            self.phases.remove(0);
        }
        self.angles.push(sample.angle);
        self.timestamps_ms.push(sample.timestamp_ms);
        self.phases.push(sample.phase);

        let cap = self.config.max_rep_samples.max(1);
        for (side, angle) in [
            (&mut self.left_angles, sample.left_angle),
            (&mut self.right_angles, sample.right_angle),
        ] {
            if let Some(angle) = angle {
                if side.len() >= cap {
                    side.remove(0);
                }
                side.push(angle);
            }
        }
        if let Some(landmarks) = sample.landmarks {
            self.compensation.observe(landmarks);
        }
    }

    fn complete_rep(&mut self, target_angle: f64, dtw: Option<&DtwResult>) -> RepScore {
        self.rep_number += 1;

        if self.angles.len() < self.config.min_rep_samples {
            debug!(
                "Rep {} has only {} samples",
                self.rep_number,
                self.angles.len()
            );
            let score = RepScore::insufficient(self.rep_number);
            self.rep_scores.push(score.clone());
            self.reset_rep();
            return score;
        }

        let rom = rom_score(&self.angles, target_angle);
        let stability = stability_score(&self.angles, &self.phases);
        let flow = match dtw {
            Some(result) => result.similarity_score.clamp(0.0, 100.0),
            None => estimate_flow_score(&self.angles, &self.timestamps_ms),
        };
        let symmetry = symmetry_score(&self.left_angles, &self.right_angles);
        let (compensation, compensation_detected) = self.compensation.score();

        let jerk = calculate_jerk(&self.angles, &self.timestamps_ms);
        self.jerk_values.push(jerk);
        if self.baseline_jerk.is_none() && jerk > 0.0 {
            self.baseline_jerk = Some(jerk);
        }

        let w = &self.config.weights;
        let total = (w.rom * rom
            + w.stability * stability
            + w.flow * flow
            + w.symmetry * symmetry
            + w.compensation * compensation)
            .clamp(0.0, 100.0);

        let duration_ms = match (self.timestamps_ms.first(), self.timestamps_ms.last()) {
            (Some(first), Some(last)) => last.saturating_sub(*first),
            _ => 0,
        };

        let fatigue = self.fatigue_level();
        let notes = if fatigue != FatigueLevel::Fresh {
            format!("fatigue: {}", fatigue.as_str())
        } else {
            String::new()
        };

        let score = RepScore {
            rep_number: self.rep_number,
            rom_score: rom,
            stability_score: stability,
            flow_score: flow,
            symmetry_score: symmetry,
            compensation_score: compensation,
            total_score: total,
            jerk_value: jerk,
            duration_ms,
            compensation_detected,
            notes,
        };

        info!(
            "Rep {} scored {:.1} (rom {:.0}, stability {:.0}, flow {:.0}, symmetry {:.0}, compensation {:.0})",
            score.rep_number, total, rom, stability, flow, symmetry, compensation
        );

        self.rep_scores.push(score.clone());
        self.reset_rep();
        score
    }

    fn add_pain_event(&mut self, event: PainEvent) {
        self.pain_events.push(event);
    }

    fn compute_session_report(&self) -> SessionReport {
        let averages = DimensionAverages::from_reps(&self.rep_scores);
        let fatigue = self.fatigue_analysis();

        let issues: Vec<String> = self
            .rep_scores
            .iter()
            .flat_map(|r| r.compensation_detected.iter().cloned())
            .collect();

        let recommendations = generate_recommendations(
            averages.as_ref(),
            &issues,
            fatigue.fatigue_level,
            !self.pain_events.is_empty(),
        );

        SessionReport {
            session_id: self.session_id.clone(),
            exercise_name: self.exercise_name.clone(),
            total_reps: self.rep_scores.len() as u32,
            rep_scores: self.rep_scores.clone(),
            average_scores: averages.unwrap_or_default(),
            fatigue,
            pain_events: self.pain_events.clone(),
            recommendations,
        }
    }

    fn current_status(&self) -> ScorerStatus {
        let last_score = self.rep_scores.last().map_or(0.0, |r| r.total_score);
        let average_score = DimensionAverages::from_reps(&self.rep_scores).map_or(0.0, |a| a.total);
        ScorerStatus {
            rep_count: self.rep_scores.len() as u32,
            last_score,
            average_score,
            fatigue_level: self.fatigue_level(),
        }
    }
}
