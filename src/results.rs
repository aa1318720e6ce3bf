use crate::error::{RoiscanError, Result};
use chrono::{NaiveTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// One accepted, non-empty recognized text entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    pub id: String,
    /// Playback position in seconds at capture time
    pub timestamp: f64,
    /// `timestamp` rendered as HH:MM:SS
    pub formatted_time: String,
    /// Region name at capture time
    pub key: String,
    /// Trimmed recognized text with line breaks folded to spaces
    pub value: String,
}

/// Record fields supplied on append; the log assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub timestamp: f64,
    pub formatted_time: String,
    pub key: String,
    pub value: String,
}

impl RecordDraft {
    /// Build a draft for text captured at `timestamp` seconds
    pub fn captured_at<K: Into<String>, V: Into<String>>(timestamp: f64, key: K, value: V) -> Self {
        Self {
            timestamp,
            formatted_time: format_timestamp(timestamp),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Append-only, time-ordered log of extraction records
pub struct ResultLog {
    records: RwLock<Vec<ExtractionRecord>>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Append a record, assigning it a fresh id
    pub fn append(&self, draft: RecordDraft) -> ExtractionRecord {
        let record = ExtractionRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: draft.timestamp,
            formatted_time: draft.formatted_time,
            key: draft.key,
            value: draft.value,
        };

        self.records.write().push(record.clone());
        record
    }

    pub fn clear(&self) {
        let mut records = self.records.write();
        debug!("Clearing {} extraction records", records.len());
        records.clear();
    }

    /// Snapshot of the log in append order
    pub fn export(&self) -> Vec<ExtractionRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Render the current snapshot as a JSON array
    pub fn export_json(&self, pretty: bool) -> Result<String> {
        let records = self.export();
        let rendered = if pretty {
            serde_json::to_string_pretty(&records)?
        } else {
            serde_json::to_string(&records)?
        };
        Ok(rendered)
    }

    /// Write the current snapshot to `ocr-results-<unix-millis>.json` in `directory`
    pub async fn write_export<P: AsRef<Path>>(&self, directory: P, pretty: bool) -> Result<PathBuf> {
        let json = self.export_json(pretty)?;

        let directory = directory.as_ref();
        fs::create_dir_all(directory).await.map_err(|e| {
            RoiscanError::component(
                "result_log".to_string(),
                format!("Failed to create export directory: {}", e),
            )
        })?;

        let path = directory.join(format!(
            "ocr-results-{}.json",
            Utc::now().timestamp_millis()
        ));
        fs::write(&path, json).await?;

        info!("Exported {} records to {}", self.len(), path.display());
        Ok(path)
    }
}

impl Default for ResultLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a playback position as HH:MM:SS (whole seconds, wrapping at 24h)
pub fn format_timestamp(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        (seconds.floor() as u64 % 86_400) as u32
    } else {
        0
    };

    NaiveTime::from_num_seconds_from_midnight_opt(whole, 0)
        .map(|time| time.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "00:00:00".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00");
        assert_eq!(format_timestamp(3.9), "00:00:03");
        assert_eq!(format_timestamp(3_725.5), "01:02:05");
        assert_eq!(format_timestamp(86_401.0), "00:00:01");
        assert_eq!(format_timestamp(-4.0), "00:00:00");
        assert_eq!(format_timestamp(f64::NAN), "00:00:00");
    }

    #[test]
    fn test_append_then_export_preserves_order() {
        let log = ResultLog::new();
        let first = log.append(RecordDraft::captured_at(1.0, "Speaker", "ALICE"));
        let second = log.append(RecordDraft::captured_at(0.5, "Subtitle", "hello"));
        let third = log.append(RecordDraft::captured_at(2.0, "Speaker", "ALICE"));

        let exported = log.export();
        assert_eq!(exported.len(), 3);
        assert_eq!(exported[0], first);
        assert_eq!(exported[1], second);
        assert_eq!(exported[2], third);
        // Identical text is not merged
        assert_eq!(exported[0].value, exported[2].value);
        assert_ne!(exported[0].id, exported[2].id);
    }

    #[test]
    fn test_clear_then_export_is_empty() {
        let log = ResultLog::new();
        log.append(RecordDraft::captured_at(1.0, "Speaker", "ALICE"));

        log.clear();

        assert!(log.export().is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn test_export_json_uses_camel_case() {
        let log = ResultLog::new();
        log.append(RecordDraft::captured_at(65.0, "Speaker", "ALICE"));

        let json = log.export_json(false).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        let record = &parsed[0];
        assert_eq!(record["formattedTime"], "00:01:05");
        assert_eq!(record["key"], "Speaker");
        assert_eq!(record["value"], "ALICE");
        assert_eq!(record["timestamp"], 65.0);
        assert!(record["id"].is_string());
    }

    #[tokio::test]
    async fn test_write_export() {
        let dir = tempfile::tempdir().unwrap();
        let log = ResultLog::new();
        log.append(RecordDraft::captured_at(1.0, "Speaker", "ALICE"));
        log.append(RecordDraft::captured_at(2.0, "Subtitle", "hi there"));

        let path = log
            .write_export(dir.path().join("nested"), true)
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ocr-results-"));
        assert!(name.ends_with(".json"));

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let records: Vec<ExtractionRecord> = serde_json::from_str(&contents).unwrap();
        assert_eq!(records, log.export());
    }
}
