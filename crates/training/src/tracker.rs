//! Experiment metric sinks.

use anyhow::Context;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Receives named scalars and exported images, keyed by step (the epoch).
pub trait MetricsTracker {
    fn log_scalars(&mut self, metrics: &[(String, f32)], step: usize) -> anyhow::Result<()>;

    fn log_image(&mut self, caption: &str, step: usize, path: &Path) -> anyhow::Result<()>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl MetricsTracker for NoopTracker {
    fn log_scalars(&mut self, _metrics: &[(String, f32)], _step: usize) -> anyhow::Result<()> {
        Ok(())
    }

    fn log_image(&mut self, _caption: &str, _step: usize, _path: &Path) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per call to a `.jsonl` file.
pub struct JsonlTracker {
    path: PathBuf,
    file: File,
}

impl JsonlTracker {
    pub fn create(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open metrics file {}", path.display()))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&mut self, record: serde_json::Value) -> anyhow::Result<()> {
        writeln!(self.file, "{record}")
            .with_context(|| format!("failed to write metrics to {}", self.path.display()))
    }
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl MetricsTracker for JsonlTracker {
    fn log_scalars(&mut self, metrics: &[(String, f32)], step: usize) -> anyhow::Result<()> {
        let values: serde_json::Map<String, serde_json::Value> = metrics
            .iter()
            .map(|(name, v)| (name.clone(), serde_json::json!(v)))
            .collect();
        self.write_record(serde_json::json!({
            "kind": "scalars",
            "step": step,
            "metrics": values,
            "timestamp_ms": timestamp_ms(),
        }))
    }

    fn log_image(&mut self, caption: &str, step: usize, path: &Path) -> anyhow::Result<()> {
        self.write_record(serde_json::json!({
            "kind": "image",
            "step": step,
            "caption": caption,
            "path": path.display().to_string(),
            "timestamp_ms": timestamp_ms(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsonl_tracker_appends_one_line_per_call() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("logs").join("metrics.jsonl");
        let mut tracker = JsonlTracker::create(&path).unwrap();
        tracker
            .log_scalars(&[("Train Total loss".to_string(), 0.25)], 3)
            .unwrap();
        tracker
            .log_image("Syn_Val Predicted Normal", 3, Path::new("a.png"))
            .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["step"], 3);
        assert_eq!(lines[0]["metrics"]["Train Total loss"], 0.25);
        assert_eq!(lines[1]["caption"], "Syn_Val Predicted Normal");
    }
}
