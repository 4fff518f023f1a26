// ============================================================
// Layer 4 — Line Loader
// ============================================================
// Reads line images from a JSON Lines file. Feature extraction
// happens upstream; each record is already a float matrix:
//
//   {"image": [[0.0, 0.1, ...], [0.3, ...], ...], "label": 2}
//
// `image` is a list of width-columns, each `line_height` floats.
// `label` is mandatory for training data and optional for lines
// that are only going to be classified.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::domain::line::{LineImage, Sample};

/// One record of a JSON Lines line file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRecord {
    pub image: Vec<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<usize>,
}

pub struct JsonlLoader {
    path: PathBuf,
}

impl JsonlLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Load every line with its optional label.
    pub fn load_lines(&self) -> Result<Vec<(LineImage, Option<usize>)>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open line file '{}'", self.path.display()))?;

        let mut lines = Vec::new();
        for (n, raw) in BufReader::new(file).lines().enumerate() {
            let raw = raw?;
            if raw.trim().is_empty() {
                continue;
            }
            let record: LineRecord = serde_json::from_str(&raw).with_context(|| {
                format!("{}:{}: malformed line record", self.path.display(), n + 1)
            })?;
            let image = LineImage::from_columns(record.image).with_context(|| {
                format!("{}:{}: invalid line image", self.path.display(), n + 1)
            })?;
            lines.push((image, record.label));
        }

        tracing::debug!("Read {} lines from '{}'", lines.len(), self.path.display());
        Ok(lines)
    }

    /// Load labelled samples. Every record must carry a label.
    pub fn load_samples(&self) -> Result<Vec<Sample>> {
        self.load_lines()?
            .into_iter()
            .enumerate()
            .map(|(i, (image, label))| {
                let label = label.with_context(|| {
                    format!("{}: record {} has no label", self.path.display(), i + 1)
                })?;
                Ok(Sample::new(image, label))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("lines.jsonl");
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_samples() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "{\"image\": [[0.0, 1.0], [2.0, 3.0]], \"label\": 1}\n\n\
             {\"image\": [[4.0, 5.0]], \"label\": 3}\n",
        );
        let samples = JsonlLoader::new(&path).load_samples().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label, 1);
        assert_eq!(samples[0].image.width(), 2);
        assert_eq!(samples[1].image.pixels(), &[4.0, 5.0]);
    }

    #[test]
    fn test_missing_label_rejected_for_training() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "{\"image\": [[0.0, 1.0]]}\n");
        let loader = JsonlLoader::new(&path);
        assert_eq!(loader.load_lines().unwrap()[0].1, None);
        assert!(loader.load_samples().is_err());
    }

    #[test]
    fn test_malformed_record_reports_line() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "{\"image\": [[0.0]], \"label\": 0}\nnot json\n");
        let err = JsonlLoader::new(&path).load_lines().unwrap_err();
        assert!(format!("{err:#}").contains(":2:"));
    }
}
