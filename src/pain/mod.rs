//! Pain estimation from facial action units.

mod detector;
mod face;


pub use detector::{
    ActionUnit, PainAnalyzer, PainDetector, PainEvent, PainLevel, PainResult, PainSummary,
};
pub use face::{index, FaceRatios};
