//! One-time safe-range calibration and the resulting user profile.

mod calibrator;
mod profile;


pub use calibrator::{
    mean_std, median, median_filter, percentile, remove_outliers, CalibrationResult,
    CalibrationState, Calibrator, SafeMaxCalibrator,
};
pub use profile::{UserProfile, DEFAULT_SAFE_MAX_ANGLE};
