// src/lib.rs
pub mod angles;
pub mod coach;
pub mod collaborators;
pub mod config;
pub mod data;
pub mod error;
pub mod landmarks;
pub mod protocol;
pub mod sampling;
pub mod session;

pub use angles::{compute, AngleSnapshot, Degrees, SymmetrySnapshot};
pub use coach::{Coach, CoachingResponse};
pub use config::CoachConfig;
pub use error::CoachError;
pub use landmarks::{filter_landmarks, LandmarkName, PositionMap, RawLandmark};
pub use protocol::{InboundMessage, OutboundMessage};
pub use session::{Session, SessionState};
