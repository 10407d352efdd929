// src/error.rs
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoachError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("could not decode frame image: {0}")]
    Image(#[from] image::ImageError),

    #[error("could not read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{collaborator} failed: {source}")]
    Collaborator {
        collaborator: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("{collaborator} timed out after {after:?}")]
    Timeout {
        collaborator: &'static str,
        after: Duration,
    },
}

pub type Result<T> = std::result::Result<T, CoachError>;
