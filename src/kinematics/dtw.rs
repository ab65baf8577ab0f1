use serde::{Deserialize, Serialize};

/// Smoothing window applied before comparing sequences
const SMOOTH_WINDOW: usize = 5;

/// How closely a user's rhythm followed the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhythmQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    Unknown,
}

impl RhythmQuality {
    pub fn from_similarity(similarity: f64) -> Self {
        if similarity >= 85.0 {
            RhythmQuality::Excellent
        } else if similarity >= 70.0 {
            RhythmQuality::Good
        } else if similarity >= 50.0 {
            RhythmQuality::Fair
        } else {
            RhythmQuality::Poor
        }
    }

    pub fn feedback(&self, similarity: f64) -> String {
        match self {
            RhythmQuality::Excellent => format!("Excellent! Very smooth rhythm ({:.0}%)", similarity),
            RhythmQuality::Good => format!("Good job! Steady rhythm ({:.0}%)", similarity),
            RhythmQuality::Fair => format!("Not bad, try to keep an even pace ({:.0}%)", similarity),
            RhythmQuality::Poor => format!("Take it slowly, it gets easier with practice ({:.0}%)", similarity),
            RhythmQuality::Unknown => "Analyzing...".to_string(),
        }
    }
}

/// Outcome of comparing a user angle sequence against a reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtwResult {
    pub distance: f64,
    pub normalized_distance: f64,
    pub similarity_score: f64,
    pub rhythm_quality: RhythmQuality,
    pub path_length: usize,
}

/// Classic dynamic-time-warping distance with absolute-difference cost.
///
/// Returns `+inf` when either sequence is empty.
pub fn dtw_distance(a: &[f64], b: &[f64]) -> f64 {
    accumulated_cost(a, b)
        .map(|matrix| matrix[a.len()][b.len()])
        .unwrap_or(f64::INFINITY)
}

/// DTW distance together with the optimal alignment path
pub fn dtw_path(a: &[f64], b: &[f64]) -> (f64, Vec<(usize, usize)>) {
    let matrix = match accumulated_cost(a, b) {
        Some(matrix) => matrix,
        None => return (f64::INFINITY, Vec::new()),
    };

    let mut path = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (a.len(), b.len());
    while i > 0 && j > 0 {
        path.push((i - 1, j - 1));
        let diagonal = matrix[i - 1][j - 1];
        let up = matrix[i - 1][j];
        let left = matrix[i][j - 1];

        if diagonal <= up && diagonal <= left {
            i -= 1;
            j -= 1;
        } else if up <= left {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    path.reverse();

    (matrix[a.len()][b.len()], path)
}

fn accumulated_cost(a: &[f64], b: &[f64]) -> Option<Vec<Vec<f64>>> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let (n, m) = (a.len(), b.len());
    let mut matrix = vec![vec![f64::INFINITY; m + 1]; n + 1];
    matrix[0][0] = 0.0;

    for i in 1..=n {
        for j in 1..=m {
            let cost = (a[i - 1] - b[j - 1]).abs();
            let best = matrix[i - 1][j].min(matrix[i][j - 1]).min(matrix[i - 1][j - 1]);
            matrix[i][j] = cost + best;
        }
    }

    Some(matrix)
}

/// Moving-average smoothing (edge values repeated) followed by min-max normalization
pub fn preprocess_sequence(sequence: &[f64]) -> Vec<f64> {
    if sequence.is_empty() {
        return Vec::new();
    }

    let smoothed: Vec<f64> = if sequence.len() >= SMOOTH_WINDOW {
        let half = (SMOOTH_WINDOW / 2) as isize;
        let last = sequence.len() as isize - 1;
        (0..sequence.len() as isize)
            .map(|i| {
                let sum: f64 = (-half..=half)
                    .map(|k| sequence[(i + k).clamp(0, last) as usize])
                    .sum();
                sum / SMOOTH_WINDOW as f64
            })
            .collect()
    } else {
        sequence.to_vec()
    };

    let min = smoothed.iter().copied().fold(f64::INFINITY, f64::min);
    let max = smoothed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max - min > 1e-6 {
        smoothed.iter().map(|v| (v - min) / (max - min)).collect()
    } else {
        smoothed
    }
}

/// Compare a user sequence against a reference and convert the distance to a 0-100 similarity
pub fn compare_sequences(user: &[f64], reference: &[f64], preprocess: bool) -> DtwResult {
    if user.is_empty() || reference.is_empty() {
        return DtwResult {
            distance: 0.0,
            normalized_distance: 0.0,
            similarity_score: 100.0,
            rhythm_quality: RhythmQuality::Unknown,
            path_length: 0,
        };
    }

    let (user_seq, ref_seq) = if preprocess {
        (preprocess_sequence(user), preprocess_sequence(reference))
    } else {
        (user.to_vec(), reference.to_vec())
    };

    let (distance, path) = dtw_path(&user_seq, &ref_seq);
    let normalized_distance = distance / user.len().max(reference.len()) as f64;
    let similarity_score = (100.0 * (-normalized_distance * 3.0).exp()).clamp(0.0, 100.0);

    DtwResult {
        distance,
        normalized_distance,
        similarity_score,
        rhythm_quality: RhythmQuality::from_similarity(similarity_score),
        path_length: path.len(),
    }
}
