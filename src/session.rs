// src/session.rs - Per-session history buffer and window deadline
use crate::angles::{AngleSnapshot, SymmetrySnapshot};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15);
pub const DEFAULT_MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);
pub const UNSPECIFIED_EXERCISE: &str = "unspecified";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowConfig {
    pub duration: Duration,
    pub min_sample_interval: Duration,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_WINDOW,
            min_sample_interval: DEFAULT_MIN_SAMPLE_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accumulating,
    /// Terminal. Nothing is appended once the window is full.
    Ready,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    #[serde(skip)]
    pub at: Instant,
    /// Offset from the session start.
    #[serde(rename = "elapsed_secs", serialize_with = "duration_as_secs")]
    pub elapsed: Duration,
    #[serde(rename = "angulos")]
    pub angles: AngleSnapshot,
    #[serde(rename = "simetrias")]
    pub symmetries: SymmetrySnapshot,
}

fn duration_as_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// State of one coaching interaction. Owned by a single task, so none of
/// this is shared or locked.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    exercise: Option<String>,
    started_at: Instant,
    started_wall: DateTime<Utc>,
    history: Vec<HistoryEntry>,
    recording: bool,
    last_append: Instant,
    state: SessionState,
    config: WindowConfig,
}

impl Session {
    pub fn new(config: WindowConfig, started_at: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            exercise: None,
            started_at,
            started_wall: Utc::now(),
            history: Vec::new(),
            recording: true,
            // the first entry waits one interval after the start
            last_append: started_at,
            state: SessionState::Accumulating,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_wall(&self) -> DateTime<Utc> {
        self.started_wall
    }

    pub fn exercise(&self) -> Option<&str> {
        self.exercise.as_deref()
    }

    pub fn exercise_label(&self) -> &str {
        self.exercise.as_deref().unwrap_or(UNSPECIFIED_EXERCISE)
    }

    /// Sets the exercise the first time a non-blank name arrives. Returns
    /// whether the name was taken.
    pub fn set_exercise(&mut self, name: &str) -> bool {
        let name = name.trim();
        if self.exercise.is_some() || name.is_empty() {
            return false;
        }
        self.exercise = Some(name.to_string());
        true
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn deadline(&self) -> Instant {
        self.started_at + self.config.duration
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn into_history(self) -> Vec<HistoryEntry> {
        self.history
    }

    /// Deadline check without a frame.
    pub fn poll(&mut self, now: Instant) -> SessionState {
        if self.state == SessionState::Accumulating && self.elapsed(now) >= self.config.duration {
            self.state = SessionState::Ready;
            tracing::debug!(
                session = %self.id,
                entries = self.history.len(),
                "window complete"
            );
        }
        self.state
    }

    pub fn on_frame(
        &mut self,
        angles: AngleSnapshot,
        symmetries: SymmetrySnapshot,
        now: Instant,
    ) -> SessionState {
        if self.poll(now) == SessionState::Ready {
            return SessionState::Ready;
        }

        if self.recording
            && now.saturating_duration_since(self.last_append) >= self.config.min_sample_interval
        {
            self.history.push(HistoryEntry {
                at: now,
                elapsed: self.elapsed(now),
                angles,
                symmetries,
            });
            self.last_append = now;
            tracing::trace!(session = %self.id, entries = self.history.len(), "sample stored");
        }

        SessionState::Accumulating
    }
}
