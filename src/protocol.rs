// src/protocol.rs - JSON messages exchanged with the client
use crate::coach::CoachingResponse;
use crate::error::Result;
use crate::landmarks::{LandmarkName, RawLandmark};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Encoded image (JPEG, PNG) of one video frame.
    Image(Vec<u8>),
    /// Keypoints an upstream model already produced, normalized to the
    /// given image size.
    Landmarks {
        width: u32,
        height: u32,
        points: Vec<RawLandmark>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    ExerciseUpdate(String),
    RecordingUpdate(bool),
    FrameUpdate(Frame),
    Unknown,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default, alias = "ejercicio")]
    exercise: Option<String>,
    #[serde(default)]
    recording: Option<bool>,
    #[serde(default)]
    frame: Option<String>,
    #[serde(default)]
    landmarks: Option<WireLandmarkFrame>,
}

#[derive(Debug, Deserialize)]
struct WireLandmarkFrame {
    width: u32,
    height: u32,
    points: Vec<WirePoint>,
}

#[derive(Debug, Deserialize)]
struct WirePoint {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    index: Option<usize>,
    x: f64,
    y: f64,
    #[serde(default)]
    z: f64,
    visibility: f64,
}

impl WirePoint {
    fn into_raw(self) -> Option<RawLandmark> {
        let name = match (self.name, self.index) {
            (Some(name), _) => name,
            (None, Some(index)) => LandmarkName::from_mediapipe_index(index)?.as_str().to_string(),
            (None, None) => return None,
        };
        Some(RawLandmark::new(name, self.x, self.y, self.z, self.visibility))
    }
}

impl InboundMessage {
    /// Splits one client message into the updates it carries, exercise and
    /// recording changes first. A message with nothing usable decodes to a
    /// single `Unknown`.
    pub fn decode(text: &str) -> Vec<InboundMessage> {
        let wire: WireMessage = match serde_json::from_str(text) {
            Ok(wire) => wire,
            Err(err) => {
                tracing::warn!("ignoring undecodable message: {err}");
                return vec![InboundMessage::Unknown];
            }
        };

        let mut messages = Vec::new();

        if let Some(exercise) = wire.exercise {
            messages.push(InboundMessage::ExerciseUpdate(exercise));
        }
        if let Some(recording) = wire.recording {
            messages.push(InboundMessage::RecordingUpdate(recording));
        }
        if let Some(payload) = wire.frame {
            match decode_image_payload(&payload) {
                Ok(bytes) => messages.push(InboundMessage::FrameUpdate(Frame::Image(bytes))),
                Err(err) => tracing::warn!("dropping frame: {err}"),
            }
        }
        if let Some(frame) = wire.landmarks {
            messages.push(InboundMessage::FrameUpdate(Frame::Landmarks {
                width: frame.width,
                height: frame.height,
                points: frame.points.into_iter().filter_map(WirePoint::into_raw).collect(),
            }));
        }

        if messages.is_empty() {
            messages.push(InboundMessage::Unknown);
        }
        messages
    }
}

/// Accepts raw base64 or a `data:image/...;base64,` URL.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>> {
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => payload,
    };
    Ok(STANDARD.decode(encoded.trim())?)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    pub session: String,
    pub exercise: String,
    pub text: String,
    /// Base64 encoded audio, empty when no speech was produced.
    pub audio: String,
}

impl OutboundMessage {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<&CoachingResponse> for OutboundMessage {
    fn from(response: &CoachingResponse) -> Self {
        Self {
            session: response.session.to_string(),
            exercise: response.exercise.clone(),
            text: response.text.clone(),
            audio: STANDARD.encode(&response.audio),
        }
    }
}
