use crate::config::FatigueThresholds;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueLevel {
    Fresh,
    Light,
    Moderate,
    Heavy,
}

impl FatigueLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatigueLevel::Fresh => "fresh",
            FatigueLevel::Light => "light",
            FatigueLevel::Moderate => "moderate",
            FatigueLevel::Heavy => "heavy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueTrend {
    Stable,
    Increasing,
    IncreasingFast,
    Improving,
}

impl FatigueTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatigueTrend::Stable => "stable",
            FatigueTrend::Increasing => "increasing",
            FatigueTrend::IncreasingFast => "increasing_fast",
            FatigueTrend::Improving => "improving",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueAnalysis {
    pub trend: FatigueTrend,
    pub fatigue_level: FatigueLevel,
    pub jerk_increase_percent: f64,
    pub jerk_values: Vec<f64>,
}

/// Map a current/baseline jerk ratio to a fatigue level
pub fn classify_fatigue(ratio: f64, thresholds: &FatigueThresholds) -> FatigueLevel {
    if ratio >= thresholds.heavy {
        FatigueLevel::Heavy
    } else if ratio >= thresholds.moderate {
        FatigueLevel::Moderate
    } else if ratio >= thresholds.light {
        FatigueLevel::Light
    } else {
        FatigueLevel::Fresh
    }
}

/// Time-normalized squared jerk of an angle trace (timestamps in milliseconds)
pub fn calculate_jerk(angles: &[f64], timestamps_ms: &[u64]) -> f64 {
    let n = angles.len().min(timestamps_ms.len());
    if n < 4 {
        return 0.0;
    }

    let dt: Vec<f64> = timestamps_ms[..n]
        .windows(2)
        .map(|w| (w[1].saturating_sub(w[0]) as f64 / 1000.0).max(1e-6))
        .collect();

    let derive = |values: &[f64]| -> Vec<f64> {
        values
            .windows(2)
            .zip(&dt)
            .map(|(w, t)| (w[1] - w[0]) / t)
            .collect()
    };

    let velocity = derive(&angles[..n]);
    let acceleration = derive(&velocity);
    let jerk = derive(&acceleration);

    let total_time = timestamps_ms[n - 1].saturating_sub(timestamps_ms[0]) as f64 / 1000.0;
    if jerk.is_empty() || total_time < 1e-6 {
        return 0.0;
    }

    jerk.iter().map(|j| j * j).sum::<f64>() / total_time
}

/// Compare the first and second half of the jerk history
pub fn analyze_trend(jerk_values: &[f64]) -> (FatigueTrend, f64) {
    if jerk_values.len() < 2 {
        return (FatigueTrend::Stable, 0.0);
    }

    let (first, second) = jerk_values.split_at(jerk_values.len() / 2);
    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    let (first_mean, second_mean) = (mean(first), mean(second));

    let increase_percent = if first_mean > 1e-6 {
        (second_mean - first_mean) / first_mean * 100.0
    } else {
        0.0
    };

    let trend = if increase_percent > 100.0 {
        FatigueTrend::IncreasingFast
    } else if increase_percent > 30.0 {
        FatigueTrend::Increasing
    } else if increase_percent < -20.0 {
        FatigueTrend::Improving
    } else {
        FatigueTrend::Stable
    };

    (trend, (increase_percent * 10.0).round() / 10.0)
}
