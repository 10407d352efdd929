// src/config.rs
use crate::error::{CoachError, Result};
use crate::landmarks::DEFAULT_VISIBILITY_THRESHOLD;
use crate::sampling::SamplingConfig;
use crate::session::WindowConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "POSE_COACH_CONFIG";

/// Runtime settings. Every field falls back to the reference behaviour when
/// missing from the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    pub visibility_threshold: f64,
    pub window_secs: f64,
    pub min_sample_interval_secs: f64,
    /// Initial recording flag of a new session.
    pub recording: bool,
    pub trim_head: usize,
    pub trim_tail: usize,
    pub sample_size: usize,
    pub text_timeout_secs: f64,
    pub speech_timeout_secs: f64,
    /// Where finished windows are exported. `"default"` means the user's
    /// documents folder.
    pub export_dir: Option<PathBuf>,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            window_secs: 15.0,
            min_sample_interval_secs: 0.5,
            recording: true,
            trim_head: 5,
            trim_tail: 6,
            sample_size: 3,
            text_timeout_secs: 45.0,
            speech_timeout_secs: 30.0,
            export_dir: None,
        }
    }
}

impl CoachConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CoachError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content).map_err(|err| match err {
            CoachError::Json(source) => CoachError::ConfigParse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Explicit path first, then `POSE_COACH_CONFIG`, then defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    pub fn window(&self) -> WindowConfig {
        WindowConfig {
            duration: secs(self.window_secs),
            min_sample_interval: secs(self.min_sample_interval_secs),
        }
    }

    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig {
            trim_head: self.trim_head,
            trim_tail: self.trim_tail,
            sample_size: self.sample_size,
        }
    }

    pub fn text_timeout(&self) -> Duration {
        secs(self.text_timeout_secs)
    }

    pub fn speech_timeout(&self) -> Duration {
        secs(self.speech_timeout_secs)
    }

    pub fn export_root(&self) -> Option<PathBuf> {
        let dir = self.export_dir.as_ref()?;
        if dir.as_os_str() == "default" {
            return Some(
                directories::UserDirs::new()
                    .and_then(|dirs| dirs.document_dir().map(|p| p.join("PoseCoach")))
                    .unwrap_or_else(|| PathBuf::from("./output")),
            );
        }
        Some(dir.clone())
    }
}

// Negative or NaN values collapse to zero
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
