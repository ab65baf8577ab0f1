//! Repetition quality scoring, fatigue tracking and the session report.

mod dimensions;
mod fatigue;
mod report;
mod scorer;


pub use dimensions::{
    estimate_flow_score, realtime_joint_score, rom_score, stability_score, symmetry_score,
    CompensationTracker, MIN_COMPENSATION_LANDMARKS,
};
pub use fatigue::{
    analyze_trend, calculate_jerk, classify_fatigue, FatigueAnalysis, FatigueLevel, FatigueTrend,
};
pub use report::{generate_recommendations, DimensionAverages, Grade, SessionReport};
pub use scorer::{FrameSample, HealthScorer, RepScore, Scorer, ScorerStatus};
