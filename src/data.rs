// src/data.rs - Export a finished window to disk
use crate::angles::{AngleName, SymmetryName};
use crate::session::HistoryEntry;
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct HistoryRecord {
    sample: usize,
    elapsed_secs: f64,

    codo_izquierdo: Option<f64>,
    codo_derecho: Option<f64>,
    hombro_izquierdo: Option<f64>,
    hombro_derecho: Option<f64>,
    brazo_izquierdo: Option<f64>,
    brazo_derecho: Option<f64>,

    simetria_hombros: Option<f64>,
    simetria_codos: Option<f64>,
    simetria_cadera: Option<f64>,
    simetria_munecas: Option<f64>,
}

impl HistoryRecord {
    fn from_entry(sample: usize, entry: &HistoryEntry) -> Self {
        let angle = |name| entry.angles.get(name).map(|d| d.value());
        let symmetry = |name| entry.symmetries.get(name).map(|d| d.value());

        Self {
            sample,
            elapsed_secs: entry.elapsed.as_secs_f64(),
            codo_izquierdo: angle(AngleName::LeftElbow),
            codo_derecho: angle(AngleName::RightElbow),
            hombro_izquierdo: angle(AngleName::LeftShoulder),
            hombro_derecho: angle(AngleName::RightShoulder),
            brazo_izquierdo: angle(AngleName::LeftArm),
            brazo_derecho: angle(AngleName::RightArm),
            simetria_hombros: symmetry(SymmetryName::Shoulders),
            simetria_codos: symmetry(SymmetryName::Elbows),
            simetria_cadera: symmetry(SymmetryName::Hips),
            simetria_munecas: symmetry(SymmetryName::Wrists),
        }
    }
}

#[derive(Serialize)]
struct HistoryDocument<'a> {
    exercise: &'a str,
    started_at: DateTime<Utc>,
    entries: &'a [HistoryEntry],
}

pub struct HistoryExporter {
    output_dir: PathBuf,
    session_name: String,
}

impl HistoryExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn export_json(
        &self,
        exercise: &str,
        started_at: DateTime<Utc>,
        history: &[HistoryEntry],
    ) -> Result<PathBuf> {
        let json_path = self.session_dir().join("history.json");
        std::fs::create_dir_all(self.session_dir())?;

        let document = HistoryDocument {
            exercise,
            started_at,
            entries: history,
        };
        let file = File::create(&json_path)?;
        serde_json::to_writer_pretty(file, &document)?;

        Ok(json_path)
    }

    pub fn export_csv(&self, history: &[HistoryEntry]) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("history.csv");
        std::fs::create_dir_all(self.session_dir())?;

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);

        for (i, entry) in history.iter().enumerate() {
            writer.serialize(HistoryRecord::from_entry(i, entry))?;
        }

        writer.flush()?;
        Ok(csv_path)
    }

    pub fn export_all(
        &self,
        exercise: &str,
        started_at: DateTime<Utc>,
        history: &[HistoryEntry],
    ) -> Result<(PathBuf, PathBuf)> {
        let json_path = self.export_json(exercise, started_at, history)?;
        let csv_path = self.export_csv(history)?;
        Ok((json_path, csv_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angles::compute;
    use crate::landmarks::{filter_landmarks, RawLandmark};
    use std::time::{Duration, Instant};

    fn entries() -> Vec<HistoryEntry> {
        let raw = vec![
            RawLandmark::new("LEFT_SHOULDER", 0.0, 0.0, 0.0, 1.0),
            RawLandmark::new("LEFT_ELBOW", 1.0, 0.0, 0.0, 1.0),
            RawLandmark::new("LEFT_WRIST", 1.0, 1.0, 0.0, 1.0),
        ];
        let (angles, symmetries) = compute(&filter_landmarks(&raw, 1, 1, Utc::now()));
        let t0 = Instant::now();
        vec![
            HistoryEntry {
                at: t0,
                elapsed: Duration::from_millis(500),
                angles,
                symmetries,
            },
            HistoryEntry {
                at: t0,
                elapsed: Duration::from_millis(1000),
                angles: Default::default(),
                symmetries: Default::default(),
            },
        ]
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("pose_coach_{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_csv_has_one_row_per_entry() {
        let dir = scratch_dir();
        let exporter = HistoryExporter::new(&dir, Some("run".to_string()));
        let path = exporter.export_csv(&entries()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("sample,elapsed_secs,codo_izquierdo"));
        assert!(lines[1].starts_with("0,0.5,90.0,"));
        assert!(lines[2].starts_with("1,1.0,,"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_json_keeps_coaching_names() {
        let dir = scratch_dir();
        let exporter = HistoryExporter::new(&dir, None);
        let (json_path, csv_path) = exporter.export_all("curl biceps", Utc::now(), &entries()).unwrap();
        assert!(csv_path.exists());
        assert!(exporter.session_dir().starts_with(&dir));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["exercise"], "curl biceps");
        assert_eq!(value["entries"][0]["angulos"]["codo_izquierdo"], 90.0);
        assert_eq!(value["entries"][1]["elapsed_secs"], 1.0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
