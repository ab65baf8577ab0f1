use super::fatigue::{FatigueAnalysis, FatigueLevel};
use super::scorer::RepScore;
use crate::pain::PainEvent;
use serde::{Deserialize, Serialize};

/// Mean of each dimension over all scored reps
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionAverages {
    pub rom: f64,
    pub stability: f64,
    pub flow: f64,
    pub symmetry: f64,
    pub compensation: f64,
    pub total: f64,
}

impl DimensionAverages {
    pub fn from_reps(reps: &[RepScore]) -> Option<Self> {
        if reps.is_empty() {
            return None;
        }
        let n = reps.len() as f64;
        let avg = |f: fn(&RepScore) -> f64| reps.iter().map(f).sum::<f64>() / n;
        Some(Self {
            rom: avg(|r| r.rom_score),
            stability: avg(|r| r.stability_score),
            flow: avg(|r| r.flow_score),
            symmetry: avg(|r| r.symmetry_score),
            compensation: avg(|r| r.compensation_score),
            total: avg(|r| r.total_score),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub exercise_name: String,
    pub total_reps: u32,
    pub rep_scores: Vec<RepScore>,
    pub average_scores: DimensionAverages,
    pub fatigue: FatigueAnalysis,
    pub pain_events: Vec<PainEvent>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Excellent,
    Good,
    NeedsImprovement,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Grade::Excellent
        } else if score >= 60.0 {
            Grade::Good
        } else {
            Grade::NeedsImprovement
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::Excellent => "Excellent",
            Grade::Good => "Good",
            Grade::NeedsImprovement => "Needs improvement",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Grade::Excellent => "green",
            Grade::Good => "yellow",
            Grade::NeedsImprovement => "red",
        }
    }
}

/// Advice derived from the session averages, fatigue and pain
pub fn generate_recommendations(
    averages: Option<&DimensionAverages>,
    compensation_issues: &[String],
    fatigue_level: FatigueLevel,
    had_pain: bool,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if let Some(avg) = averages {
        if avg.rom < 70.0 {
            recommendations.push(
                "You haven't quite reached the target angle yet. Push a little further, \
                 but never through pain."
                    .to_string(),
            );
        } else if avg.rom >= 95.0 {
            recommendations.push("Great job! You reached the target angle very well.".to_string());
        }

        if avg.stability < 60.0 {
            recommendations.push(
                "Try to keep still while holding the position. Breathe evenly and focus."
                    .to_string(),
            );
        }

        if avg.compensation < 70.0 {
            let mentions = |needle: &str| compensation_issues.iter().any(|i| i.contains(needle));
            if mentions("shoulder") {
                recommendations
                    .push("Keep your shoulders relaxed and level; avoid shrugging.".to_string());
            }
            if mentions("trunk") {
                recommendations.push(
                    "Keep your back straight and avoid leaning to the side.".to_string(),
                );
            }
            if mentions("hip") {
                recommendations
                    .push("Keep your weight even on both legs and your hips level.".to_string());
            }
        } else if avg.compensation < 85.0 {
            recommendations.push("Pay a little more attention to your posture.".to_string());
        }
    }

    match fatigue_level {
        FatigueLevel::Heavy => recommendations
            .push("You are quite tired. Please rest and drink some water.".to_string()),
        FatigueLevel::Moderate => recommendations
            .push("You seem a bit tired. Take a short break before continuing.".to_string()),
        _ => {}
    }

    if had_pain {
        recommendations.push(
            "Signs of discomfort were noticed during the session. \
             Tell your doctor if the pain continues after resting."
                .to_string(),
        );
    }

    if recommendations.is_empty() {
        recommendations.push("Good session! See you next time.".to_string());
    }

    recommendations
}
