use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::viz::Viz;

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("recording I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("recording JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A saved, replayable list of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub name: String,
    pub session_id: String,
    pub vizs: Vec<Viz>,
}

impl Recording {
    pub fn new(name: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            session_id: session_id.into(),
            vizs: Vec::new(),
        }
    }

    pub fn add_viz(&mut self, viz: Viz) {
        self.vizs.push(viz);
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, RecordingError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn load(path: &Path) -> Result<Self, RecordingError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), RecordingError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recording_file_shape() {
        let data = br#"{
            "name": "Test Logger",
            "session_id": "abc",
            "vizs": [
                {"name": "p", "source": null, "widgets": [{"plot_scalar": {"data_x": [[0.0, 0.5]]}}], "range": null}
            ]
        }"#;
        let recording = Recording::from_slice(data).unwrap();
        assert_eq!(recording.name, "Test Logger");
        assert_eq!(recording.vizs.len(), 1);
        assert_eq!(recording.vizs[0].widget_summary(), "plot_scalar");
    }

    #[test]
    fn save_then_load() {
        let mut recording = Recording::new("disk", "s1");
        recording.add_viz(Viz::new("one"));
        let path = std::env::temp_dir().join(format!("vizwire-rec-{}.json", std::process::id()));
        recording.save(&path).unwrap();
        let loaded = Recording::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, recording);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Recording::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, RecordingError::Io(_)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_flush_is_io_error() {
        let mut recording = Recording::new("full", "s2");
        recording.add_viz(Viz::new("one"));
        let err = recording.save(Path::new("/dev/full")).unwrap_err();
        assert!(matches!(err, RecordingError::Io(_)));
    }
}
