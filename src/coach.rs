// src/coach.rs - One task per coaching session
use crate::angles::compute;
use crate::collaborators::{
    generate_feedback, synthesize_audio, PoseDetector, SpeechSynthesizer, TextGenerator,
};
use crate::config::CoachConfig;
use crate::data::HistoryExporter;
use crate::error::CoachError;
use crate::landmarks::{LandmarkFilter, RawLandmark};
use crate::protocol::{Frame, InboundMessage};
use crate::sampling::summarize;
use crate::session::{Session, SessionState};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct CoachingResponse {
    pub session: Uuid,
    pub exercise: String,
    pub text: String,
    pub audio: Vec<u8>,
}

/// Shared, stateless parts of the pipeline. Sessions never share state;
/// each one lives inside the task that drives it.
pub struct Coach<D, T, S> {
    detector: Arc<D>,
    text: Arc<T>,
    speech: Arc<S>,
    config: Arc<CoachConfig>,
}

impl<D, T, S> Clone for Coach<D, T, S> {
    fn clone(&self) -> Self {
        Self {
            detector: Arc::clone(&self.detector),
            text: Arc::clone(&self.text),
            speech: Arc::clone(&self.speech),
            config: Arc::clone(&self.config),
        }
    }
}

// Follows tokio's clock so paused-time tests drive the window
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl<D, T, S> Coach<D, T, S>
where
    D: PoseDetector + 'static,
    T: TextGenerator + 'static,
    S: SpeechSynthesizer + 'static,
{
    pub fn new(detector: D, text: T, speech: S, config: CoachConfig) -> Self {
        Self {
            detector: Arc::new(detector),
            text: Arc::new(text),
            speech: Arc::new(speech),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &CoachConfig {
        &self.config
    }

    /// Runs one session on its own task.
    pub fn spawn_session(
        &self,
        mut inbound: mpsc::Receiver<InboundMessage>,
    ) -> JoinHandle<Option<CoachingResponse>> {
        let coach = self.clone();
        tokio::spawn(async move { coach.run_session(&mut inbound).await })
    }

    /// Collects one window and turns it into feedback. `None` when the
    /// transport closes before the window is full.
    pub async fn run_session(
        &self,
        inbound: &mut mpsc::Receiver<InboundMessage>,
    ) -> Option<CoachingResponse> {
        let session = self.collect_window(inbound).await?;
        Some(self.summarize_window(session).await)
    }

    /// Starts a session on the first message and feeds it until the window
    /// deadline passes.
    pub async fn collect_window(
        &self,
        inbound: &mut mpsc::Receiver<InboundMessage>,
    ) -> Option<Session> {
        let first = inbound.recv().await?;

        let mut session = Session::new(self.config.window(), now());
        session.set_recording(self.config.recording);
        tracing::info!(session = %session.id(), "session started");

        if self.apply(&mut session, first) == SessionState::Ready {
            return Some(session);
        }

        let deadline = tokio::time::Instant::from_std(session.deadline());
        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => {
                        if self.apply(&mut session, message) == SessionState::Ready {
                            break;
                        }
                    }
                    None => {
                        tracing::info!(
                            session = %session.id(),
                            discarded = session.history().len(),
                            "transport closed before the window completed"
                        );
                        return None;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    if session.poll(now()) == SessionState::Ready {
                        break;
                    }
                }
            }
        }

        Some(session)
    }

    fn apply(&self, session: &mut Session, message: InboundMessage) -> SessionState {
        match message {
            InboundMessage::ExerciseUpdate(name) => {
                if session.set_exercise(&name) {
                    tracing::info!(session = %session.id(), exercise = %name.trim(), "exercise selected");
                } else {
                    tracing::debug!(session = %session.id(), ignored = %name, "exercise already set");
                }
                session.poll(now())
            }
            InboundMessage::RecordingUpdate(recording) => {
                tracing::info!(session = %session.id(), recording, "recording toggled");
                session.set_recording(recording);
                session.poll(now())
            }
            InboundMessage::FrameUpdate(frame) => self.process_frame(session, frame),
            InboundMessage::Unknown => {
                tracing::debug!(session = %session.id(), "message without updates");
                session.poll(now())
            }
        }
    }

    fn process_frame(&self, session: &mut Session, frame: Frame) -> SessionState {
        let (raw, width, height) = match frame {
            Frame::Image(bytes) => match self.detect(&bytes) {
                Some(detected) => detected,
                None => return session.poll(now()),
            },
            Frame::Landmarks {
                width,
                height,
                points,
            } => (points, width, height),
        };

        // nobody in frame: the deadline still counts, nothing is stored
        if raw.is_empty() {
            return session.poll(now());
        }

        let filter = LandmarkFilter::new(self.config.visibility_threshold);
        let positions = filter.filter(&raw, width, height, Utc::now());
        let (angles, symmetries) = compute(&positions);
        tracing::trace!(
            landmarks = positions.len(),
            angles = angles.len(),
            symmetries = symmetries.len(),
            "frame processed"
        );

        session.on_frame(angles, symmetries, now())
    }

    fn detect(&self, bytes: &[u8]) -> Option<(Vec<RawLandmark>, u32, u32)> {
        let detected = image::load_from_memory(bytes)
            .map_err(CoachError::from)
            .and_then(|image| {
                self.detector
                    .detect(&image)
                    .map(|raw| (raw, image.width(), image.height()))
                    .map_err(|source| CoachError::Collaborator {
                        collaborator: "pose detector",
                        source,
                    })
            });

        match detected {
            Ok(detected) => Some(detected),
            Err(err) => {
                tracing::warn!("skipping frame: {err}");
                None
            }
        }
    }

    pub async fn summarize_window(&self, session: Session) -> CoachingResponse {
        let id = session.id();
        let exercise = session.exercise_label().to_string();

        if let Some(root) = self.config.export_root() {
            let exporter = HistoryExporter::new(root, Some(format!("session_{id}")));
            match exporter.export_all(&exercise, session.started_wall(), session.history()) {
                Ok((json, csv)) => tracing::info!(
                    session = %id,
                    json = %json.display(),
                    csv = %csv.display(),
                    "history exported"
                ),
                Err(err) => tracing::warn!(session = %id, "history export failed: {err:#}"),
            }
        }

        let evidence = {
            let mut rng = rand::thread_rng();
            summarize(session.history(), &exercise, &self.config.sampling(), &mut rng)
        };
        tracing::debug!(
            session = %id,
            entries = session.history().len(),
            samples = evidence.samples.len(),
            "window summarized"
        );
        drop(session);

        let text = generate_feedback(&*self.text, &evidence, self.config.text_timeout()).await;
        let audio = synthesize_audio(&*self.speech, &text, self.config.speech_timeout()).await;

        tracing::info!(session = %id, audio_bytes = audio.len(), "session finished");
        CoachingResponse {
            session: id,
            exercise,
            text,
            audio,
        }
    }
}
