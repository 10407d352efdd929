// src/collaborators.rs - Pose model, text generation and speech seams
use crate::angles::{AngleName, SymmetryName};
use crate::error::CoachError;
use crate::landmarks::RawLandmark;
use crate::sampling::Evidence;
use anyhow::Result;
use image::DynamicImage;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Turns one image into keypoints with normalized coordinates. Returns an
/// empty list when nobody is in frame.
pub trait PoseDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawLandmark>>;
}

pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        exercise: &str,
        evidence: &Evidence,
    ) -> impl Future<Output = Result<String>> + Send;
}

pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

pub fn fallback_feedback(exercise: &str) -> String {
    format!("Maintain your form in {exercise}. Keep it up.")
}

pub fn insufficient_data_feedback(exercise: &str) -> String {
    format!("There is not enough data to analyze your {exercise} yet. Stay in frame and try again.")
}

async fn bounded<T, F>(collaborator: &'static str, limit: Duration, fut: F) -> Result<T, CoachError>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(CoachError::Collaborator {
            collaborator,
            source,
        }),
        Err(_) => Err(CoachError::Timeout {
            collaborator,
            after: limit,
        }),
    }
}

/// Feedback text for a finished window. Never fails: empty evidence skips
/// the generator, and errors, timeouts or blank answers become the fallback.
pub async fn generate_feedback<T: TextGenerator>(
    generator: &T,
    evidence: &Evidence,
    limit: Duration,
) -> String {
    if evidence.is_empty() {
        tracing::info!(exercise = %evidence.exercise, "no samples in window");
        return insufficient_data_feedback(&evidence.exercise);
    }

    match bounded("text generator", limit, generator.generate(&evidence.exercise, evidence)).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            tracing::warn!("text generator returned an empty answer");
            fallback_feedback(&evidence.exercise)
        }
        Err(err) => {
            tracing::warn!("{err}");
            fallback_feedback(&evidence.exercise)
        }
    }
}

/// Audio for `text`, or no audio at all if synthesis fails or times out.
pub async fn synthesize_audio<S: SpeechSynthesizer>(
    synthesizer: &S,
    text: &str,
    limit: Duration,
) -> Vec<u8> {
    match bounded("speech synthesizer", limit, synthesizer.synthesize(text)).await {
        Ok(audio) => audio,
        Err(err) => {
            tracing::warn!("{err}");
            Vec::new()
        }
    }
}

/// Detector for deployments without a pose model: every image is a
/// detection gap.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPoseModel;

impl PoseDetector for NoPoseModel {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawLandmark>> {
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            "no pose model configured, skipping image"
        );
        Ok(Vec::new())
    }
}

/// Offline feedback built from the sampled angles.
#[derive(Debug, Clone, Copy)]
pub struct TemplateFeedback {
    /// Tilt of a left/right pair, in degrees, worth a remark.
    pub tilt_tolerance: f64,
}

impl Default for TemplateFeedback {
    fn default() -> Self {
        Self { tilt_tolerance: 10.0 }
    }
}

impl TemplateFeedback {
    pub fn compose(&self, exercise: &str, evidence: &Evidence) -> String {
        let mut angle_sums: BTreeMap<AngleName, (f64, usize)> = BTreeMap::new();
        let mut worst_tilt: Option<(SymmetryName, f64)> = None;

        for sample in &evidence.samples {
            for (name, value) in sample.angles.iter() {
                let slot = angle_sums.entry(name).or_insert((0.0, 0));
                slot.0 += value.value();
                slot.1 += 1;
            }
            for (name, value) in sample.symmetries.iter() {
                // a level pair reads either 0 or 180 depending on facing
                let tilt = value.value().min(180.0 - value.value());
                if worst_tilt.map_or(true, |(_, worst)| tilt > worst) {
                    worst_tilt = Some((name, tilt));
                }
            }
        }

        let mut text = format!("Good work on your {exercise}.");

        let elbows: Vec<String> = [(AngleName::LeftElbow, "left"), (AngleName::RightElbow, "right")]
            .iter()
            .filter_map(|(name, side)| {
                angle_sums
                    .get(name)
                    .map(|(sum, count)| format!("{side} elbow {:.0}°", sum / *count as f64))
            })
            .collect();
        if !elbows.is_empty() {
            text.push_str(&format!(" Average {}.", elbows.join(", ")));
        }

        match worst_tilt {
            Some((name, tilt)) if tilt > self.tilt_tolerance => {
                text.push_str(&format!(
                    " Level your {}: they tilt about {:.0}°.",
                    pair_label(name),
                    tilt
                ));
            }
            Some(_) => text.push_str(" Your left and right sides stay balanced."),
            None => {}
        }

        text.push_str(" Keep it up.");
        text
    }
}

fn pair_label(name: SymmetryName) -> &'static str {
    match name {
        SymmetryName::Shoulders => "shoulders",
        SymmetryName::Elbows => "elbows",
        SymmetryName::Hips => "hips",
        SymmetryName::Wrists => "wrists",
    }
}

impl TextGenerator for TemplateFeedback {
    async fn generate(&self, exercise: &str, evidence: &Evidence) -> Result<String> {
        Ok(self.compose(exercise, evidence))
    }
}

/// Synthesizer that produces no audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSpeech;

impl SpeechSynthesizer for SilentSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angles::compute;
    use crate::landmarks::filter_landmarks;
    use crate::session::HistoryEntry;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    struct Scripted {
        calls: AtomicUsize,
        answer: Option<&'static str>,
        delay: Duration,
    }

    impl Scripted {
        fn answering(answer: Option<&'static str>, delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                answer,
                delay,
            }
        }
    }

    impl TextGenerator for Scripted {
        async fn generate(&self, _exercise: &str, _evidence: &Evidence) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.answer
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("status 503"))
        }
    }

    struct BrokenSpeech;

    impl SpeechSynthesizer for BrokenSpeech {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            anyhow::bail!("quota exceeded")
        }
    }

    fn evidence(points: &[(&str, f64, f64)]) -> Evidence {
        let raw: Vec<RawLandmark> = points
            .iter()
            .map(|(name, x, y)| RawLandmark::new(*name, *x, *y, 0.0, 1.0))
            .collect();
        let (angles, symmetries) = compute(&filter_landmarks(&raw, 1, 1, Utc::now()));
        Evidence {
            exercise: "curl biceps".to_string(),
            samples: vec![HistoryEntry {
                at: Instant::now(),
                elapsed: Duration::from_secs(4),
                angles,
                symmetries,
            }],
        }
    }

    fn elbow_evidence() -> Evidence {
        evidence(&[
            ("LEFT_SHOULDER", 0.0, 0.0),
            ("LEFT_ELBOW", 1.0, 0.0),
            ("LEFT_WRIST", 1.0, 1.0),
            ("RIGHT_SHOULDER", -1.0, 0.0),
        ])
    }

    #[tokio::test]
    async fn test_generator_answer_is_trimmed() {
        let generator = Scripted::answering(Some("  Nice curls!\n"), Duration::ZERO);
        let text = generate_feedback(&generator, &elbow_evidence(), Duration::from_secs(5)).await;
        assert_eq!(text, "Nice curls!");
    }

    #[tokio::test]
    async fn test_generator_error_falls_back() {
        let generator = Scripted::answering(None, Duration::ZERO);
        let text = generate_feedback(&generator, &elbow_evidence(), Duration::from_secs(5)).await;
        assert_eq!(text, fallback_feedback("curl biceps"));
    }

    #[tokio::test]
    async fn test_blank_answer_falls_back() {
        let generator = Scripted::answering(Some("   "), Duration::ZERO);
        let text = generate_feedback(&generator, &elbow_evidence(), Duration::from_secs(5)).await;
        assert_eq!(text, fallback_feedback("curl biceps"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_generator_times_out() {
        let generator = Scripted::answering(Some("too late"), Duration::from_secs(120));
        let text = generate_feedback(&generator, &elbow_evidence(), Duration::from_secs(45)).await;
        assert_eq!(text, fallback_feedback("curl biceps"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_evidence_skips_generator() {
        let generator = Scripted::answering(Some("unused"), Duration::ZERO);
        let empty = Evidence {
            exercise: "squat".to_string(),
            samples: Vec::new(),
        };
        let text = generate_feedback(&generator, &empty, Duration::from_secs(5)).await;
        assert_eq!(text, insufficient_data_feedback("squat"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_speech_failure_yields_no_audio() {
        let audio = synthesize_audio(&BrokenSpeech, "hello", Duration::from_secs(5)).await;
        assert!(audio.is_empty());
    }

    #[test]
    fn test_template_reports_elbows_and_balance() {
        let text = TemplateFeedback::default().compose("curl biceps", &elbow_evidence());
        assert!(text.contains("left elbow 90°"), "{text}");
        assert!(text.contains("balanced"), "{text}");
    }

    #[test]
    fn test_template_flags_tilted_hips() {
        let evidence = evidence(&[("LEFT_HIP", 10.0, 3.0), ("RIGHT_HIP", 0.0, 0.0)]);
        let text = TemplateFeedback::default().compose("squat", &evidence);
        assert!(text.contains("Level your hips"), "{text}");
    }

    #[test]
    fn test_no_pose_model_finds_nobody() {
        let image = DynamicImage::new_rgb8(4, 4);
        assert!(NoPoseModel.detect(&image).unwrap().is_empty());
    }
}
