// src/angles.rs - Joint angles and left/right symmetry from a position map
use crate::landmarks::{round_to, LandmarkName, PositionMap};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An angle in degrees, already rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Degrees(pub f64);

impl Degrees {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Degrees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AngleName {
    #[serde(rename = "codo_izquierdo")]
    LeftElbow,
    #[serde(rename = "codo_derecho")]
    RightElbow,
    #[serde(rename = "hombro_derecho")]
    RightShoulder,
    #[serde(rename = "hombro_izquierdo")]
    LeftShoulder,
    #[serde(rename = "brazo_derecho")]
    RightArm,
    #[serde(rename = "brazo_izquierdo")]
    LeftArm,
}

impl AngleName {
    pub const ALL: [AngleName; 6] = [
        AngleName::LeftElbow,
        AngleName::RightElbow,
        AngleName::RightShoulder,
        AngleName::LeftShoulder,
        AngleName::RightArm,
        AngleName::LeftArm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftElbow => "codo_izquierdo",
            Self::RightElbow => "codo_derecho",
            Self::RightShoulder => "hombro_derecho",
            Self::LeftShoulder => "hombro_izquierdo",
            Self::RightArm => "brazo_derecho",
            Self::LeftArm => "brazo_izquierdo",
        }
    }

    /// `(first, vertex, third)` keypoints of this angle.
    pub fn joints(&self) -> (LandmarkName, LandmarkName, LandmarkName) {
        use LandmarkName::*;
        match self {
            Self::LeftElbow => (LeftShoulder, LeftElbow, LeftWrist),
            Self::RightElbow => (RightShoulder, RightElbow, RightWrist),
            Self::RightShoulder => (RightHip, RightShoulder, RightElbow),
            Self::LeftShoulder => (LeftHip, LeftShoulder, LeftElbow),
            Self::RightArm => (RightHip, RightShoulder, RightWrist),
            Self::LeftArm => (LeftHip, LeftShoulder, LeftWrist),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymmetryName {
    #[serde(rename = "simetria_hombros")]
    Shoulders,
    #[serde(rename = "simetria_codos")]
    Elbows,
    #[serde(rename = "simetria_cadera")]
    Hips,
    #[serde(rename = "simetria_munecas")]
    Wrists,
}

impl SymmetryName {
    pub const ALL: [SymmetryName; 4] = [
        SymmetryName::Shoulders,
        SymmetryName::Elbows,
        SymmetryName::Hips,
        SymmetryName::Wrists,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shoulders => "simetria_hombros",
            Self::Elbows => "simetria_codos",
            Self::Hips => "simetria_cadera",
            Self::Wrists => "simetria_munecas",
        }
    }

    /// `(left, right)` keypoints of the pair.
    pub fn pair(&self) -> (LandmarkName, LandmarkName) {
        use LandmarkName::*;
        match self {
            Self::Shoulders => (LeftShoulder, RightShoulder),
            Self::Elbows => (LeftElbow, RightElbow),
            Self::Hips => (LeftHip, RightHip),
            Self::Wrists => (LeftWrist, RightWrist),
        }
    }
}

/// Joint angles of one frame. A missing key means the angle could not be
/// computed, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AngleSnapshot(BTreeMap<AngleName, Degrees>);

impl AngleSnapshot {
    pub fn get(&self, name: AngleName) -> Option<Degrees> {
        self.0.get(&name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AngleName, Degrees)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SymmetrySnapshot(BTreeMap<SymmetryName, Degrees>);

impl SymmetrySnapshot {
    pub fn get(&self, name: SymmetryName) -> Option<Degrees> {
        self.0.get(&name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymmetryName, Degrees)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Angle at `vertex` between the segments to `p1` and `p3`, in [0, 180].
/// `None` when either segment has zero length.
pub fn three_point_angle(p1: Point2<f64>, vertex: Point2<f64>, p3: Point2<f64>) -> Option<Degrees> {
    let v1: Vector2<f64> = p1 - vertex;
    let v2: Vector2<f64> = p3 - vertex;

    let mag1 = v1.norm();
    let mag2 = v2.norm();
    if mag1 == 0.0 || mag2 == 0.0 {
        return None;
    }

    let cos_angle = v1.dot(&v2) / (mag1 * mag2);
    if !cos_angle.is_finite() {
        return None;
    }

    let angle = cos_angle.clamp(-1.0, 1.0).acos().to_degrees();
    Some(Degrees(round_to(angle, 1)))
}

/// Orientation of the line through a left/right pair, folded into [0, 180].
/// A level pair reads 0.
pub fn symmetry_angle(left: Point2<f64>, right: Point2<f64>) -> Option<Degrees> {
    let delta: Vector2<f64> = left - right;

    let mut angle = delta.y.atan2(delta.x).to_degrees().abs();
    if !angle.is_finite() {
        return None;
    }
    if angle > 180.0 {
        angle = 360.0 - angle;
    }

    Some(Degrees(round_to(angle, 1)))
}

/// Computes every angle and symmetry whose keypoints are all present.
pub fn compute(positions: &PositionMap) -> (AngleSnapshot, SymmetrySnapshot) {
    let mut angles = AngleSnapshot::default();
    let mut symmetries = SymmetrySnapshot::default();

    for name in AngleName::ALL {
        let (a, vertex, c) = name.joints();
        let (Some(a), Some(vertex), Some(c)) =
            (positions.get(a), positions.get(vertex), positions.get(c))
        else {
            continue;
        };
        if let Some(value) = three_point_angle(a.position(), vertex.position(), c.position()) {
            angles.0.insert(name, value);
        }
    }

    for name in SymmetryName::ALL {
        let (left, right) = name.pair();
        let (Some(left), Some(right)) = (positions.get(left), positions.get(right)) else {
            continue;
        };
        if let Some(value) = symmetry_angle(left.position(), right.position()) {
            symmetries.0.insert(name, value);
        }
    }

    (angles, symmetries)
}
