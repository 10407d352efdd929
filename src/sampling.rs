// src/sampling.rs - Pick representative samples out of a finished window
use crate::session::HistoryEntry;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    /// Warm-up entries skipped at the start of the window.
    pub trim_head: usize,
    /// Cool-down entries skipped at the end of the window.
    pub trim_tail: usize,
    pub sample_size: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            trim_head: 5,
            trim_tail: 6,
            sample_size: 3,
        }
    }
}

/// The samples handed to the text generator, together with the exercise
/// they belong to.
#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    pub exercise: String,
    pub samples: Vec<HistoryEntry>,
}

impl Evidence {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Exercise: {}", self.exercise)?;
        for (i, sample) in self.samples.iter().enumerate() {
            write!(f, "Sample {} at {:.1}s:", i + 1, sample.elapsed.as_secs_f64())?;

            if sample.angles.is_empty() && sample.symmetries.is_empty() {
                writeln!(f, " no joints visible")?;
                continue;
            }

            let angles: Vec<String> = sample
                .angles
                .iter()
                .map(|(name, value)| format!("{} {}", name.as_str(), value))
                .collect();
            let symmetries: Vec<String> = sample
                .symmetries
                .iter()
                .map(|(name, value)| format!("{} {}", name.as_str(), value))
                .collect();

            if !angles.is_empty() {
                write!(f, " angles {}", angles.join(", "))?;
            }
            if !symmetries.is_empty() {
                if !angles.is_empty() {
                    write!(f, ";")?;
                }
                write!(f, " symmetry {}", symmetries.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Chooses `sample_size` entries without replacement from the window minus
/// its warm-up and cool-down. When that remainder is too small the whole
/// history is used instead, and a history shorter than `sample_size` is
/// returned in full.
pub fn summarize<R: Rng + ?Sized>(
    history: &[HistoryEntry],
    exercise: &str,
    config: &SamplingConfig,
    rng: &mut R,
) -> Evidence {
    let trimmed: &[HistoryEntry] = if history.len() > config.trim_head + config.trim_tail {
        &history[config.trim_head..history.len() - config.trim_tail]
    } else {
        &[]
    };

    let pool = if trimmed.len() >= config.sample_size {
        trimmed
    } else {
        tracing::debug!(
            entries = history.len(),
            trimmed = trimmed.len(),
            "window too short to trim, sampling the whole history"
        );
        history
    };

    let mut samples: Vec<HistoryEntry> = pool
        .choose_multiple(rng, config.sample_size.min(pool.len()))
        .cloned()
        .collect();
    samples.sort_by_key(|entry| entry.elapsed);

    Evidence {
        exercise: exercise.to_string(),
        samples,
    }
}

pub fn build_prompt(exercise: &str, evidence: &Evidence) -> String {
    format!(
        "You are a professional sports trainer. Analyze the user's {exercise} from the joint \
         angle samples below and give clear, concise feedback in English in at most 50 words, \
         with a motivating and professional tone.\n\n{evidence}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angles::{compute, AngleSnapshot, SymmetrySnapshot};
    use crate::landmarks::{filter_landmarks, RawLandmark};
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    fn history(len: usize) -> Vec<HistoryEntry> {
        let t0 = Instant::now();
        (0..len)
            .map(|i| {
                let elapsed = Duration::from_millis(500 * (i as u64 + 1));
                HistoryEntry {
                    at: t0 + elapsed,
                    elapsed,
                    angles: AngleSnapshot::default(),
                    symmetries: SymmetrySnapshot::default(),
                }
            })
            .collect()
    }

    fn index_of(entry: &HistoryEntry) -> usize {
        (entry.elapsed.as_millis() / 500) as usize - 1
    }

    #[test]
    fn test_samples_skip_warm_up_and_cool_down() {
        let history = history(20);
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let evidence = summarize(&history, "squat", &SamplingConfig::default(), &mut rng);
            assert_eq!(evidence.samples.len(), 3);

            let picked: HashSet<usize> = evidence.samples.iter().map(index_of).collect();
            assert_eq!(picked.len(), 3);
            assert!(picked.iter().all(|i| (5..14).contains(i)), "{picked:?}");
        }
    }

    #[test]
    fn test_exact_remainder_is_taken_whole() {
        // 5 + 3 + 6 entries leaves exactly the sample size
        let history = history(14);
        let mut rng = StdRng::seed_from_u64(7);
        let evidence = summarize(&history, "squat", &SamplingConfig::default(), &mut rng);
        let picked: Vec<usize> = evidence.samples.iter().map(index_of).collect();
        assert_eq!(picked, vec![5, 6, 7]);
    }

    #[test]
    fn test_short_window_falls_back_to_whole_history() {
        let history = history(12);
        let mut rng = StdRng::seed_from_u64(3);
        let evidence = summarize(&history, "squat", &SamplingConfig::default(), &mut rng);
        assert_eq!(evidence.samples.len(), 3);
        let picked: HashSet<usize> = evidence.samples.iter().map(index_of).collect();
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn test_tiny_and_empty_histories() {
        let mut rng = StdRng::seed_from_u64(1);
        let evidence = summarize(&history(2), "plank", &SamplingConfig::default(), &mut rng);
        assert_eq!(evidence.samples.len(), 2);

        let evidence = summarize(&[], "plank", &SamplingConfig::default(), &mut rng);
        assert!(evidence.is_empty());
        assert_eq!(evidence.exercise, "plank");
    }

    #[test]
    fn test_custom_trim_bounds() {
        let config = SamplingConfig {
            trim_head: 0,
            trim_tail: 0,
            sample_size: 10,
        };
        let mut rng = StdRng::seed_from_u64(9);
        let evidence = summarize(&history(10), "lunge", &config, &mut rng);
        let picked: Vec<usize> = evidence.samples.iter().map(index_of).collect();
        assert_eq!(picked, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_evidence_text_names_angles_and_gaps() {
        let raw = vec![
            RawLandmark::new("LEFT_SHOULDER", 0.0, 0.0, 0.0, 1.0),
            RawLandmark::new("LEFT_ELBOW", 1.0, 0.0, 0.0, 1.0),
            RawLandmark::new("LEFT_WRIST", 1.0, 1.0, 0.0, 1.0),
            RawLandmark::new("RIGHT_SHOULDER", -1.0, 0.0, 0.0, 1.0),
        ];
        let (angles, symmetries) = compute(&filter_landmarks(&raw, 1, 1, Utc::now()));

        let mut entries = history(2);
        entries[0].angles = angles;
        entries[0].symmetries = symmetries;

        let evidence = Evidence {
            exercise: "curl biceps".to_string(),
            samples: entries,
        };
        let text = evidence.to_string();
        assert!(text.starts_with("Exercise: curl biceps\n"));
        assert!(text.contains("Sample 1 at 0.5s: angles codo_izquierdo 90.0°; symmetry simetria_hombros 0.0°"));
        assert!(text.contains("Sample 2 at 1.0s: no joints visible"));

        let prompt = build_prompt("curl biceps", &evidence);
        assert!(prompt.contains("curl biceps"));
        assert!(prompt.contains("50 words"));
        assert!(prompt.ends_with(&text));
    }
}
