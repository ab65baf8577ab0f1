use crate::landmarks::{Landmark, LandmarkSet, FACE_LANDMARK_COUNT};
use serde::{Deserialize, Serialize};

/// Face-mesh indices used for action-unit geometry
pub mod index {
    pub const LEFT_BROW: usize = 66;
    pub const RIGHT_BROW: usize = 296;
    pub const LEFT_EYE_TOP: usize = 159;
    pub const LEFT_EYE_BOTTOM: usize = 145;
    pub const LEFT_EYE_INNER: usize = 133;
    pub const LEFT_EYE_OUTER: usize = 33;
    pub const RIGHT_EYE_TOP: usize = 386;
    pub const RIGHT_EYE_BOTTOM: usize = 374;
    pub const RIGHT_EYE_INNER: usize = 362;
    pub const RIGHT_EYE_OUTER: usize = 263;
    pub const NOSE_TIP: usize = 1;
    pub const NOSE_BRIDGE: usize = 6;
    pub const UPPER_LIP: usize = 0;
    pub const INNER_LIP_TOP: usize = 13;
    pub const INNER_LIP_BOTTOM: usize = 14;
    pub const MOUTH_LEFT: usize = 61;
    pub const MOUTH_RIGHT: usize = 291;
    pub const FACE_TOP: usize = 10;
    pub const FACE_BOTTOM: usize = 152;
}

/// Normalized facial-geometry ratios for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRatios {
    /// Eye aspect ratio, averaged over both eyes
    pub ear: f64,
    /// Brow-to-eye distance over face height
    pub brow: f64,
    /// Nose bridge-to-tip distance over face height
    pub nose: f64,
    /// Upper lip-to-nose distance over face height
    pub lip: f64,
    /// Mouth aspect ratio
    pub mar: f64,
}

impl FaceRatios {
    /// Relaxed-face reference used until a baseline is calibrated
    pub const NEUTRAL: FaceRatios = FaceRatios {
        ear: 0.28,
        brow: 0.08,
        nose: 0.12,
        lip: 0.10,
        mar: 0.15,
    };

    /// Measure a full face mesh; `None` for incomplete sets
    pub fn measure(face: &LandmarkSet) -> Option<Self> {
        if face.len() < FACE_LANDMARK_COUNT {
            return None;
        }
        let p = face.points();
        let dist = |a: usize, b: usize| distance_2d(&p[a], &p[b]);

        let face_height = match dist(index::FACE_TOP, index::FACE_BOTTOM) {
            h if h < 1e-6 => 0.1,
            h => h,
        };

        let eye_ratio = |top, bottom, inner, outer| {
            let horizontal = dist(inner, outer);
            if horizontal < 1e-6 {
                0.3
            } else {
                dist(top, bottom) / horizontal
            }
        };
        let ear = (eye_ratio(
            index::LEFT_EYE_TOP,
            index::LEFT_EYE_BOTTOM,
            index::LEFT_EYE_INNER,
            index::LEFT_EYE_OUTER,
        ) + eye_ratio(
            index::RIGHT_EYE_TOP,
            index::RIGHT_EYE_BOTTOM,
            index::RIGHT_EYE_INNER,
            index::RIGHT_EYE_OUTER,
        )) / 2.0;

        let brow = (dist(index::LEFT_BROW, index::LEFT_EYE_TOP)
            + dist(index::RIGHT_BROW, index::RIGHT_EYE_TOP))
            / 2.0
            / face_height;
        let nose = dist(index::NOSE_TIP, index::NOSE_BRIDGE) / face_height;
        let lip = dist(index::UPPER_LIP, index::NOSE_TIP) / face_height;

        let mouth_width = dist(index::MOUTH_LEFT, index::MOUTH_RIGHT);
        let mar = if mouth_width < 1e-6 {
            0.2
        } else {
            dist(index::INNER_LIP_TOP, index::INNER_LIP_BOTTOM) / mouth_width
        };

        Some(Self {
            ear,
            brow,
            nose,
            lip,
            mar,
        })
    }
}

impl Default for FaceRatios {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

fn distance_2d(a: &Landmark, b: &Landmark) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}
