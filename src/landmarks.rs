// src/landmarks.rs
use chrono::{DateTime, Utc};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.5;

/// The upper-body keypoints the coach works with. Anything else the pose
/// model reports is dropped by the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LandmarkName {
    RightShoulder,
    RightElbow,
    RightWrist,
    RightHip,
    LeftShoulder,
    LeftElbow,
    LeftWrist,
    LeftHip,
}

impl LandmarkName {
    pub const ALL: [LandmarkName; 8] = [
        LandmarkName::RightShoulder,
        LandmarkName::RightElbow,
        LandmarkName::RightWrist,
        LandmarkName::RightHip,
        LandmarkName::LeftShoulder,
        LandmarkName::LeftElbow,
        LandmarkName::LeftWrist,
        LandmarkName::LeftHip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RightShoulder => "RIGHT_SHOULDER",
            Self::RightElbow => "RIGHT_ELBOW",
            Self::RightWrist => "RIGHT_WRIST",
            Self::RightHip => "RIGHT_HIP",
            Self::LeftShoulder => "LEFT_SHOULDER",
            Self::LeftElbow => "LEFT_ELBOW",
            Self::LeftWrist => "LEFT_WRIST",
            Self::LeftHip => "LEFT_HIP",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|n| n.as_str() == name)
    }

    /// Position of this keypoint in the 33-point MediaPipe pose topology.
    pub fn mediapipe_index(&self) -> usize {
        match self {
            Self::LeftShoulder => 11,
            Self::RightShoulder => 12,
            Self::LeftElbow => 13,
            Self::RightElbow => 14,
            Self::LeftWrist => 15,
            Self::RightWrist => 16,
            Self::LeftHip => 23,
            Self::RightHip => 24,
        }
    }

    pub fn from_mediapipe_index(index: usize) -> Option<Self> {
        Self::ALL.iter().copied().find(|n| n.mediapipe_index() == index)
    }
}

/// One keypoint as reported by the pose model. `x` and `y` are normalized
/// to the image size, `z` is the model's relative depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLandmark {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub visibility: f64,
}

impl RawLandmark {
    pub fn new(name: impl Into<String>, x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            z,
            visibility,
        }
    }
}

/// A whitelisted, visible keypoint in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Landmark {
    pub x_px: f64,
    pub y_px: f64,
    /// Model-relative depth proxy, not a distance.
    pub depth: f64,
    pub visibility: f64,
    pub captured_at: DateTime<Utc>,
}

impl Landmark {
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x_px, self.y_px)
    }
}

/// Per-frame map of the visible whitelisted keypoints. Only built by
/// [`LandmarkFilter`], so it never holds an entry below the threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PositionMap {
    landmarks: BTreeMap<LandmarkName, Landmark>,
}

impl PositionMap {
    pub fn get(&self, name: LandmarkName) -> Option<&Landmark> {
        self.landmarks.get(&name)
    }

    pub fn contains(&self, name: LandmarkName) -> bool {
        self.landmarks.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LandmarkName, &Landmark)> {
        self.landmarks.iter()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LandmarkFilter {
    pub visibility_threshold: f64,
}

impl Default for LandmarkFilter {
    fn default() -> Self {
        Self {
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
        }
    }
}

impl LandmarkFilter {
    pub fn new(visibility_threshold: f64) -> Self {
        Self { visibility_threshold }
    }

    pub fn filter(
        &self,
        raw: &[RawLandmark],
        image_width: u32,
        image_height: u32,
        captured_at: DateTime<Utc>,
    ) -> PositionMap {
        let mut map = PositionMap::default();

        for lm in raw {
            // NaN visibility fails this comparison too
            if !(lm.visibility >= self.visibility_threshold) {
                continue;
            }
            let Some(name) = LandmarkName::from_name(&lm.name) else {
                continue;
            };

            map.landmarks.insert(
                name,
                Landmark {
                    x_px: round_to(lm.x * image_width as f64, 2),
                    y_px: round_to(lm.y * image_height as f64, 2),
                    depth: round_to(lm.z, 4),
                    visibility: round_to(lm.visibility, 4),
                    captured_at,
                },
            );
        }

        tracing::trace!("kept {} of {} landmarks", map.len(), raw.len());
        map
    }
}

pub fn filter_landmarks(
    raw: &[RawLandmark],
    image_width: u32,
    image_height: u32,
    captured_at: DateTime<Utc>,
) -> PositionMap {
    LandmarkFilter::default().filter(raw, image_width, image_height, captured_at)
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(name: &str, x: f64, y: f64, visibility: f64) -> RawLandmark {
        RawLandmark::new(name, x, y, -0.123456, visibility)
    }

    #[test]
    fn test_drops_low_visibility() {
        let raw = vec![
            lm("LEFT_SHOULDER", 0.5, 0.5, 0.49),
            lm("LEFT_ELBOW", 0.5, 0.5, 0.5),
        ];
        let map = filter_landmarks(&raw, 640, 480, Utc::now());
        assert!(!map.contains(LandmarkName::LeftShoulder));
        assert!(map.contains(LandmarkName::LeftElbow));
    }

    #[test]
    fn test_drops_names_outside_whitelist() {
        let raw = vec![
            lm("NOSE", 0.5, 0.2, 0.99),
            lm("LEFT_KNEE", 0.4, 0.8, 0.99),
            lm("RIGHT_HIP", 0.6, 0.6, 0.99),
        ];
        let map = filter_landmarks(&raw, 640, 480, Utc::now());
        assert_eq!(map.len(), 1);
        assert!(map.contains(LandmarkName::RightHip));
    }

    #[test]
    fn test_converts_to_pixels_and_rounds() {
        let raw = vec![RawLandmark::new("RIGHT_WRIST", 0.123456, 0.654321, 0.987654321, 0.876543)];
        let map = filter_landmarks(&raw, 640, 480, Utc::now());
        let wrist = map.get(LandmarkName::RightWrist).unwrap();
        assert_eq!(wrist.x_px, 79.01);
        assert_eq!(wrist.y_px, 314.07);
        assert_eq!(wrist.depth, 0.9877);
        assert_eq!(wrist.visibility, 0.8765);
    }

    #[test]
    fn test_no_detection_is_empty_map() {
        let map = filter_landmarks(&[], 640, 480, Utc::now());
        assert!(map.is_empty());
    }

    #[test]
    fn test_nan_visibility_is_dropped() {
        let raw = vec![lm("LEFT_HIP", 0.5, 0.5, f64::NAN)];
        assert!(filter_landmarks(&raw, 640, 480, Utc::now()).is_empty());
    }

    #[test]
    fn test_custom_threshold() {
        let raw = vec![lm("LEFT_HIP", 0.5, 0.5, 0.7)];
        let strict = LandmarkFilter::new(0.8).filter(&raw, 10, 10, Utc::now());
        assert!(strict.is_empty());
    }

    #[test]
    fn test_mediapipe_index_mapping() {
        assert_eq!(LandmarkName::from_mediapipe_index(11), Some(LandmarkName::LeftShoulder));
        assert_eq!(LandmarkName::from_mediapipe_index(24), Some(LandmarkName::RightHip));
        assert_eq!(LandmarkName::from_mediapipe_index(0), None);
        for name in LandmarkName::ALL {
            assert_eq!(LandmarkName::from_mediapipe_index(name.mediapipe_index()), Some(name));
            assert_eq!(LandmarkName::from_name(name.as_str()), Some(name));
        }
    }
}
