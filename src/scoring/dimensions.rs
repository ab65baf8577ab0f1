//! Per-repetition sub-scores, each in `[0, 100]`.

use crate::calibration::mean_std;
use crate::landmarks::{pose, LandmarkSet};
use crate::sync::MotionPhase;

/// Landmarks needed before posture geometry is tracked
pub const MIN_COMPENSATION_LANDMARKS: usize = 25;

/// Per-frame angle change treated as a tracking jump (degrees)
const JUMP_THRESHOLD: f64 = 15.0;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn diffs(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Frame intervals in seconds, floored to avoid division by zero
fn intervals_s(timestamps_ms: &[u64]) -> Vec<f64> {
    timestamps_ms
        .windows(2)
        .map(|w| (w[1].saturating_sub(w[0]) as f64 / 1000.0).max(1e-6))
        .collect()
}

/// How far and how long the user got toward the target
pub fn rom_score(angles: &[f64], target: f64) -> f64 {
    if target <= 0.0 {
        return 100.0;
    }
    let n = angles.len();
    if n < 5 {
        return 0.0;
    }

    let (peak_index, peak) = angles
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, a)| if a > best.1 { (i, a) } else { best });
    let peak_part = (peak / target * 100.0).min(100.0);

    let near_target = angles.iter().filter(|&&a| a >= 0.8 * target).count() as f64;
    let hold_part = (near_target / (0.1 * n as f64).max(3.0)).min(1.0) * 100.0;

    let radius = (n / 10).max(3);
    let region = &angles[peak_index.saturating_sub(radius)..(peak_index + radius + 1).min(n)];
    let quality = if region.len() < 3 {
        50.0
    } else {
        (100.0 - 5.0 * mean_std(region).1).max(0.0)
    };

    (0.4 * peak_part + 0.3 * hold_part + 0.3 * quality).clamp(0.0, 100.0)
}

/// Steadiness of the hold, falling back to frame-to-frame jitter
pub fn stability_score(angles: &[f64], phases: &[MotionPhase]) -> f64 {
    let hold: Vec<f64> = angles
        .iter()
        .zip(phases)
        .filter(|(_, phase)| **phase == MotionPhase::Hold)
        .map(|(angle, _)| *angle)
        .collect();

    if hold.len() < 5 {
        if angles.len() >= 5 {
            let jitter = mean_std(&diffs(angles)).1;
            return (100.0 - 5.0 * jitter).clamp(0.0, 100.0);
        }
        return 80.0;
    }

    let n = hold.len();
    let (mu, sigma) = mean_std(&hold);
    let sigma_part = (100.0 - 10.0 * sigma).max(0.0);

    let wobbles = hold.iter().filter(|&&x| (x - mu).abs() > 3.0).count() as f64;
    let oscillation = (1.0 - (wobbles / (0.2 * n as f64).max(1.0)).min(1.0)) * 100.0;

    let (first, second) = hold.split_at(n / 2);
    let drift = (mean(first) - mean(second)).max(0.0);
    let penalty = (drift / 5.0).min(1.0);

    (0.5 * sigma_part + 0.3 * oscillation + 0.2 * (1.0 - penalty) * 100.0).clamp(0.0, 100.0)
}

/// Smoothness estimate used when no reference comparison is available
pub fn estimate_flow_score(angles: &[f64], timestamps_ms: &[u64]) -> f64 {
    let n = angles.len();
    if n < 5 || timestamps_ms.len() != n {
        return 70.0;
    }

    let dt = intervals_s(timestamps_ms);
    let steps = diffs(angles);
    let velocity: Vec<f64> = steps.iter().zip(&dt).map(|(d, t)| d / t).collect();

    let smoothness = if velocity.len() < 3 {
        70.0
    } else {
        let accel: Vec<f64> = diffs(&velocity)
            .iter()
            .zip(&dt)
            .map(|(dv, t)| dv / t)
            .collect();
        (100.0 - 0.2 * mean_std(&accel).1).max(0.0)
    };

    let jumps = steps.iter().filter(|d| d.abs() > JUMP_THRESHOLD).count() as f64;
    let continuity = (1.0 - (5.0 * jumps / n as f64).min(1.0)) * 100.0;

    let direction = if velocity.len() < 5 {
        70.0
    } else {
        let reversals = velocity.windows(2).filter(|w| w[0] * w[1] < 0.0).count() as f64;
        (1.0 - (reversals / (0.3 * n as f64).max(1.0)).min(1.0)) * 100.0
    };

    (0.4 * smoothness + 0.3 * continuity + 0.3 * direction).clamp(0.0, 100.0)
}

/// Left/right agreement of the mirrored joint pair
pub fn symmetry_score(left: &[f64], right: &[f64]) -> f64 {
    if left.len() < 5 || right.len() < 5 {
        return 85.0;
    }
    let len = left.len().min(right.len());
    let mean_diff = left[..len]
        .iter()
        .zip(&right[..len])
        .map(|(l, r)| (l - r).abs())
        .sum::<f64>()
        / len as f64;

    (100.0 - 4.0 * mean_diff).clamp(0.0, 100.0)
}

/// Posture geometry collected during one rep
#[derive(Debug, Clone, Default)]
pub struct CompensationTracker {
    shoulder_diffs: Vec<f64>,
    torso_tilts: Vec<f64>,
    hip_diffs: Vec<f64>,
}

impl CompensationTracker {
    pub fn observe(&mut self, landmarks: &LandmarkSet) {
        if landmarks.len() < MIN_COMPENSATION_LANDMARKS {
            return;
        }
        let points = landmarks.points();
        let (ls, rs) = (points[pose::LEFT_SHOULDER], points[pose::RIGHT_SHOULDER]);
        let (lh, rh) = (points[pose::LEFT_HIP], points[pose::RIGHT_HIP]);

        self.shoulder_diffs.push((ls.y - rs.y).abs());
        self.hip_diffs.push((lh.y - rh.y).abs());

        let (shoulder_x, shoulder_y) = ((ls.x + rs.x) / 2.0, (ls.y + rs.y) / 2.0);
        let (hip_x, hip_y) = ((lh.x + rh.x) / 2.0, (lh.y + rh.y) / 2.0);
        let (dx, dy) = (shoulder_x - hip_x, hip_y - shoulder_y);
        if dy.abs() > 1e-6 {
            self.torso_tilts.push(dx.atan2(dy).to_degrees());
        }
    }

    pub fn clear(&mut self) {
        self.shoulder_diffs.clear();
        self.torso_tilts.clear();
        self.hip_diffs.clear();
    }

    pub fn len(&self) -> usize {
        self.shoulder_diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shoulder_diffs.is_empty()
    }

    /// Score with the list of detected compensation patterns
    pub fn score(&self) -> (f64, Vec<String>) {
        let mut score: f64 = 100.0;
        let mut issues = Vec::new();
        let mut flag = |penalty: f64, issue: &str| {
            score -= penalty;
            issues.push(issue.to_string());
        };

        if self.shoulder_diffs.len() >= 5 {
            let max = self.shoulder_diffs.iter().copied().fold(0.0, f64::max);
            if max > 0.08 {
                flag(40.0, "shoulder hiking (severe)");
            } else if max > 0.05 {
                flag(20.0, "shoulder hiking");
            } else if mean(&self.shoulder_diffs) > 0.03 {
                flag(10.0, "uneven shoulders");
            }
        }

        if self.torso_tilts.len() >= 5 {
            let max_abs = self.torso_tilts.iter().map(|t| t.abs()).fold(0.0, f64::max);
            let lo = self.torso_tilts.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = self.torso_tilts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = hi - lo;
            let mean_abs = self.torso_tilts.iter().map(|t| t.abs()).sum::<f64>()
                / self.torso_tilts.len() as f64;

            if max_abs > 20.0 || range > 25.0 {
                flag(35.0, "trunk lean (severe)");
            } else if max_abs > 15.0 || range > 15.0 {
                flag(20.0, "trunk lean");
            } else if mean_abs > 10.0 {
                flag(10.0, "slight trunk lean");
            }
        }

        if self.hip_diffs.len() >= 5 {
            let max = self.hip_diffs.iter().copied().fold(0.0, f64::max);
            if max > 0.08 {
                flag(25.0, "hip imbalance");
            } else if max > 0.05 {
                flag(15.0, "slight hip imbalance");
            }
        }

        (score.clamp(0.0, 100.0), issues)
    }
}

/// Realtime score of one joint from its relative error
pub fn realtime_joint_score(user_angle: f64, target_angle: f64) -> Option<f64> {
    if target_angle <= 0.0 {
        return None;
    }
    let e = (user_angle - target_angle).abs() / target_angle * 100.0;
    let score = if e < 5.0 {
        100.0
    } else if e < 10.0 {
        95.0 - (e - 5.0)
    } else if e < 15.0 {
        90.0 - 2.0 * (e - 10.0)
    } else if e < 25.0 {
        80.0 - 1.5 * (e - 15.0)
    } else if e < 40.0 {
        65.0 - (e - 25.0)
    } else {
        50.0 - 0.5 * (e - 40.0)
    };
    Some(score.clamp(0.0, 100.0))
}
