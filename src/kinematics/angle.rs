use super::JointType;
use crate::error::KinematicsError;
use crate::landmarks::{Landmark, LandmarkSet};

/// Vectors shorter than this are treated as degenerate
const MIN_VECTOR_NORM: f64 = 1e-10;

/// Plain 3D point used for angle math
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn sub(&self, other: &Point3) -> Point3 {
        Point3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    fn dot(&self, other: &Point3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Projection onto the image plane
    pub fn flatten(&self) -> Point3 {
        Point3::new(self.x, self.y, 0.0)
    }
}

impl From<&Landmark> for Point3 {
    fn from(landmark: &Landmark) -> Self {
        Point3::new(landmark.x, landmark.y, landmark.z)
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(v: [f64; 3]) -> Self {
        Point3::new(v[0], v[1], v[2])
    }
}

/// Angle in degrees at `vertex` between the rays towards `p1` and `p2`.
///
/// The cosine is clamped to `[-1, 1]` before `acos` so floating-point drift on
/// (anti)parallel vectors never yields NaN.
pub fn joint_angle(p1: Point3, vertex: Point3, p2: Point3) -> Result<f64, KinematicsError> {
    let v1 = p1.sub(&vertex);
    let v2 = p2.sub(&vertex);

    let n1 = v1.norm();
    let n2 = v2.norm();
    if n1 < MIN_VECTOR_NORM || n2 < MIN_VECTOR_NORM {
        return Err(KinematicsError::invalid_geometry(format!(
            "zero-length segment at vertex ({:.4}, {:.4}, {:.4})",
            vertex.x, vertex.y, vertex.z
        )));
    }

    if !n1.is_finite() || !n2.is_finite() {
        return Err(KinematicsError::invalid_geometry(
            "non-finite landmark coordinates",
        ));
    }

    let cos = v1.dot(&v2) / (n1 * n2);
    if !cos.is_finite() {
        return Err(KinematicsError::invalid_geometry(
            "non-finite cosine between segments",
        ));
    }
    Ok(cos.clamp(-1.0, 1.0).acos().to_degrees())
}

/// Same as [`joint_angle`] on the xy projection
pub fn joint_angle_2d(p1: Point3, vertex: Point3, p2: Point3) -> Result<f64, KinematicsError> {
    joint_angle(p1.flatten(), vertex.flatten(), p2.flatten())
}

/// Angle of `joint` taken from a pose landmark set
pub fn calculate_joint_angle(
    landmarks: &LandmarkSet,
    joint: JointType,
    use_3d: bool,
) -> Result<f64, KinematicsError> {
    let (a, b, c) = joint.landmark_indices();
    let fetch = |index: usize| {
        landmarks
            .get(index)
            .map(Point3::from)
            .ok_or(KinematicsError::MissingLandmark {
                index,
                available: landmarks.len(),
            })
    };

    let (p1, vertex, p2) = (fetch(a)?, fetch(b)?, fetch(c)?);
    if use_3d {
        joint_angle(p1, vertex, p2)
    } else {
        joint_angle_2d(p1, vertex, p2)
    }
}
