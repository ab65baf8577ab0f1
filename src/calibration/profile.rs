use super::CalibrationResult;
use crate::error::Result;
use crate::kinematics::JointType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Safe maximum used for joints that were never calibrated
pub const DEFAULT_SAFE_MAX_ANGLE: f64 = 90.0;

/// Per-user calibration record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    /// Safe maximum angle per calibrated joint (degrees)
    #[serde(default)]
    pub calibrated_joints: BTreeMap<JointType, f64>,
}

impl UserProfile {
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            name: String::new(),
            created_at: now,
            updated_at: now,
            calibrated_joints: BTreeMap::new(),
        }
    }

    pub fn from_results<'a, S, I>(user_id: S, results: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = &'a CalibrationResult>,
    {
        let mut profile = Self::new(user_id);
        for result in results {
            profile.set_safe_max_angle(result.joint, result.max_angle);
        }
        profile
    }

    pub fn set_safe_max_angle(&mut self, joint: JointType, angle: f64) {
        self.calibrated_joints.insert(joint, angle);
        self.updated_at = Utc::now();
    }

    /// Calibrated maximum, or the default when the joint was not measured
    pub fn safe_max_angle(&self, joint: JointType) -> f64 {
        self.calibrated_joints
            .get(&joint)
            .copied()
            .unwrap_or(DEFAULT_SAFE_MAX_ANGLE)
    }

    pub fn is_calibrated(&self, joint: JointType) -> bool {
        self.calibrated_joints.contains_key(&joint)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write `<dir>/<user_id>.json`, creating the directory if needed
    pub fn save_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let path = dir.join(format!("{}.json", self.user_id));
        fs::write(&path, self.to_json()?)?;

        info!("Saved profile for {} to {}", self.user_id, path.display());
        Ok(path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading profile from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}
