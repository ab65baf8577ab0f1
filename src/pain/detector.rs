use super::face::FaceRatios;
use crate::calibration::median;
use crate::config::{ActionUnitTable, PainConfig};
use crate::landmarks::LandmarkSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

/// Facial action units associated with pain expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionUnit {
    /// Brow lowerer
    #[serde(rename = "AU4")]
    Au4,
    /// Cheek raiser
    #[serde(rename = "AU6")]
    Au6,
    /// Lid tightener
    #[serde(rename = "AU7")]
    Au7,
    /// Nose wrinkler
    #[serde(rename = "AU9")]
    Au9,
    /// Upper lip raiser
    #[serde(rename = "AU10")]
    Au10,
    /// Eyes closed
    #[serde(rename = "AU43")]
    Au43,
}

impl ActionUnit {
    pub const ALL: [ActionUnit; 6] = [
        ActionUnit::Au4,
        ActionUnit::Au6,
        ActionUnit::Au7,
        ActionUnit::Au9,
        ActionUnit::Au10,
        ActionUnit::Au43,
    ];

    pub fn lookup(&self, table: &ActionUnitTable) -> f64 {
        match self {
            ActionUnit::Au4 => table.au4,
            ActionUnit::Au6 => table.au6,
            ActionUnit::Au7 => table.au7,
            ActionUnit::Au9 => table.au9,
            ActionUnit::Au10 => table.au10,
            ActionUnit::Au43 => table.au43,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PainLevel {
    None,
    Mild,
    Moderate,
    Severe,
}

impl PainLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PainLevel::None => "none",
            PainLevel::Mild => "mild",
            PainLevel::Moderate => "moderate",
            PainLevel::Severe => "severe",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PainLevel::None => "",
            PainLevel::Mild => "You look a little strained. Take a short break if you need one.",
            PainLevel::Moderate => "Let's ease off this exercise a bit. Don't push too hard!",
            PainLevel::Severe => "Please stop and rest. Your health comes first.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PainResult {
    pub pain_level: PainLevel,
    /// Smoothed score in `[0, 100]`
    pub pain_score: f64,
    pub raw_score: f64,
    pub au_scores: BTreeMap<ActionUnit, f64>,
    pub is_pain_detected: bool,
    /// True on the frame the sustained episode was first confirmed
    pub newly_detected: bool,
    pub confidence: f64,
    pub message: String,
    /// Episode closed by this frame, if any
    pub ended_event: Option<PainEvent>,
}

impl PainResult {
    fn empty() -> Self {
        Self {
            pain_level: PainLevel::None,
            pain_score: 0.0,
            raw_score: 0.0,
            au_scores: BTreeMap::new(),
            is_pain_detected: false,
            newly_detected: false,
            confidence: 0.0,
            message: String::new(),
            ended_event: None,
        }
    }
}

/// A sustained pain episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PainEvent {
    pub start_ms: u64,
    pub level: PainLevel,
    pub peak_score: f64,
    pub duration_ms: u64,
    pub au_scores: BTreeMap<ActionUnit, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PainSummary {
    pub total_events: usize,
    pub max_level: PainLevel,
    pub total_duration_ms: u64,
}

/// Facial pain estimation behind a swappable interface
pub trait PainAnalyzer: Send {
    fn analyze(&mut self, face: &LandmarkSet, timestamp_ms: u64) -> PainResult;

    /// Derive the neutral baseline from relaxed frames; false when none were usable
    fn calibrate_baseline(&mut self, frames: &[LandmarkSet]) -> bool;

    /// Close an episode still open at the end of a session
    fn close_episode(&mut self, timestamp_ms: u64) -> Option<PainEvent>;

    fn events(&self) -> &[PainEvent];

    fn summary(&self) -> PainSummary;

    fn reset(&mut self);
}

#[derive(Debug, Clone)]
struct Episode {
    start_ms: u64,
    peak_level: PainLevel,
    peak_score: f64,
    peak_aus: BTreeMap<ActionUnit, f64>,
    confirmed: bool,
}

/// Action-unit pain detector with moving-average smoothing and duration debounce
pub struct PainDetector {
    config: PainConfig,
    baseline: FaceRatios,
    baseline_calibrated: bool,
    history: VecDeque<f64>,
    episode: Option<Episode>,
    events: Vec<PainEvent>,
}

impl PainDetector {
    pub fn new(config: PainConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_size),
            config,
            baseline: FaceRatios::NEUTRAL,
            baseline_calibrated: false,
            episode: None,
            events: Vec::new(),
        }
    }

    pub fn baseline(&self) -> FaceRatios {
        self.baseline
    }

    pub fn is_baseline_calibrated(&self) -> bool {
        self.baseline_calibrated
    }

    /// Use a single relaxed frame as the baseline
    pub fn set_baseline(&mut self, face: &LandmarkSet) -> bool {
        match FaceRatios::measure(face) {
            Some(ratios) => {
                self.baseline = ratios;
                self.baseline_calibrated = true;
                true
            }
            None => false,
        }
    }

    /// Activation of each action unit relative to the baseline
    pub fn activations(&self, current: &FaceRatios) -> BTreeMap<ActionUnit, f64> {
        let base = &self.baseline;
        let relative_drop = |base: f64, now: f64| {
            if base > 1e-6 {
                ((base - now) / base).clamp(0.0, 1.0)
            } else {
                0.0
            }
        };

        let eye_change = relative_drop(base.ear, current.ear);
        let nose = if base.nose > 1e-6 {
            ((current.nose - base.nose).abs() / base.nose).clamp(0.0, 1.0)
        } else {
            0.0
        };

        BTreeMap::from([
            (ActionUnit::Au4, relative_drop(base.brow, current.brow)),
            (ActionUnit::Au6, (0.8 * eye_change).min(1.0)),
            (ActionUnit::Au7, eye_change),
            (ActionUnit::Au9, nose),
            (ActionUnit::Au10, relative_drop(base.lip, current.lip)),
            (ActionUnit::Au43, eye_change),
        ])
    }

    /// Weighted sum of the activations above their thresholds
    pub fn score(&self, activations: &BTreeMap<ActionUnit, f64>) -> f64 {
        let thresholds = &self.config.au_thresholds;
        let weights = &self.config.au_weights;

        let total_weight: f64 = weights.values().iter().sum();
        if total_weight <= 0.0 {
            return 0.0;
        }

        let weighted: f64 = activations
            .iter()
            .filter_map(|(au, &activation)| {
                let threshold = au.lookup(thresholds);
                (activation > threshold && threshold < 1.0).then(|| {
                    (activation - threshold) / (1.0 - threshold) * au.lookup(weights) * 100.0
                })
            })
            .sum();

        (weighted / total_weight).clamp(0.0, 100.0)
    }

    pub fn classify(&self, score: f64) -> PainLevel {
        if score >= self.config.severe {
            PainLevel::Severe
        } else if score >= self.config.moderate {
            PainLevel::Moderate
        } else if score >= self.config.mild {
            PainLevel::Mild
        } else {
            PainLevel::None
        }
    }

    fn close(&mut self, episode: Episode, timestamp_ms: u64) -> Option<PainEvent> {
        let duration_ms = timestamp_ms.saturating_sub(episode.start_ms);
        if duration_ms < self.config.min_duration_ms {
            debug!("Discarding pain blip of {} ms", duration_ms);
            return None;
        }

        let event = PainEvent {
            start_ms: episode.start_ms,
            level: episode.peak_level,
            peak_score: episode.peak_score,
            duration_ms,
            au_scores: episode.peak_aus,
        };
        info!(
            "Pain episode recorded: {} for {} ms (peak {:.1})",
            event.level.as_str(),
            event.duration_ms,
            event.peak_score
        );
        self.events.push(event.clone());
        Some(event)
    }
}

impl PainAnalyzer for PainDetector {
    fn analyze(&mut self, face: &LandmarkSet, timestamp_ms: u64) -> PainResult {
        let current = match FaceRatios::measure(face) {
            Some(ratios) => ratios,
            None => return PainResult::empty(),
        };

        let au_scores = self.activations(&current);
        let raw_score = self.score(&au_scores);

        if self.history.len() >= self.config.history_size.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(raw_score);
        let pain_score = self.history.iter().sum::<f64>() / self.history.len() as f64;
        let pain_level = self.classify(pain_score);

        let mut newly_detected = false;
        let mut ended_event = None;
        if pain_level == PainLevel::None {
            if let Some(episode) = self.episode.take() {
                ended_event = self.close(episode, timestamp_ms);
            }
        } else {
            let min_duration = self.config.min_duration_ms;
            let episode = self.episode.get_or_insert_with(|| Episode {
                start_ms: timestamp_ms,
                peak_level: pain_level,
                peak_score: pain_score,
                peak_aus: au_scores.clone(),
                confirmed: false,
            });
            if pain_level > episode.peak_level {
                episode.peak_level = pain_level;
            }
            if pain_score > episode.peak_score {
                episode.peak_score = pain_score;
                episode.peak_aus = au_scores.clone();
            }
            if !episode.confirmed && timestamp_ms.saturating_sub(episode.start_ms) >= min_duration
            {
                episode.confirmed = true;
                newly_detected = true;
            }
        }

        let is_pain_detected = self.episode.as_ref().map_or(false, |e| e.confirmed);

        let active = au_scores.values().filter(|&&a| a > 0.1).count() as f64;
        let strongest = au_scores.values().copied().fold(0.0, f64::max);
        let confidence = (active / 3.0 * strongest).min(1.0);

        PainResult {
            pain_level,
            pain_score,
            raw_score,
            au_scores,
            is_pain_detected,
            newly_detected,
            confidence,
            message: if is_pain_detected {
                pain_level.message().to_string()
            } else {
                String::new()
            },
            ended_event,
        }
    }

    fn calibrate_baseline(&mut self, frames: &[LandmarkSet]) -> bool {
        let measured: Vec<FaceRatios> = frames
            .iter()
            .take(self.config.baseline_frames)
            .filter_map(FaceRatios::measure)
            .collect();
        if measured.is_empty() {
            return false;
        }

        let pick = |f: fn(&FaceRatios) -> f64| median(&measured.iter().map(f).collect::<Vec<_>>());
        self.baseline = FaceRatios {
            ear: pick(|r| r.ear),
            brow: pick(|r| r.brow),
            nose: pick(|r| r.nose),
            lip: pick(|r| r.lip),
            mar: pick(|r| r.mar),
        };
        self.baseline_calibrated = true;
        info!(
            "Pain baseline calibrated from {} frames (EAR {:.3})",
            measured.len(),
            self.baseline.ear
        );
        true
    }

    fn close_episode(&mut self, timestamp_ms: u64) -> Option<PainEvent> {
        let episode = self.episode.take()?;
        self.close(episode, timestamp_ms)
    }

    fn events(&self) -> &[PainEvent] {
        &self.events
    }

    fn summary(&self) -> PainSummary {
        PainSummary {
            total_events: self.events.len(),
            max_level: self
                .events
                .iter()
                .map(|e| e.level)
                .max()
                .unwrap_or(PainLevel::None),
            total_duration_ms: self.events.iter().map(|e| e.duration_ms).sum(),
        }
    }

    fn reset(&mut self) {
        self.history.clear();
        self.episode = None;
        self.events.clear();
    }
}
