//! Timeline artifacts
//!
//! Three files are regenerated wholesale on every build: `all.yaml` with the
//! full timeline, `filtered.yaml` with only the instances at or above the
//! configured priority cutoff, and `filtered.csv` with the same rows in
//! tabular form. The playout phase reloads `all.yaml` rather than
//! re-compiling.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::errors::ScheduleError;
use crate::models::{ClipInstance, Timeline};
use crate::utils::time::format_hms;

pub const ALL_YAML_FILE: &str = "all.yaml";
pub const FILTERED_YAML_FILE: &str = "filtered.yaml";
pub const FILTERED_CSV_FILE: &str = "filtered.csv";

/// One frozen timeline row: everything the playout driver needs, nothing the
/// resolver needed. Durations render as `H:MM:SS[.micros]`, instants as
/// ISO-8601; the loop bit only appears when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineRecord {
    pub path: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(with = "crate::utils::time::hms_duration")]
    pub duration: Duration,
    #[serde(with = "crate::utils::time::hms_duration")]
    pub play_duration: Duration,
    #[serde(with = "crate::utils::time::hms_duration")]
    pub cursor_start_at: Duration,
    #[serde(with = "crate::utils::time::hms_duration")]
    pub cursor_end_at: Duration,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default, rename = "loop", skip_serializing_if = "is_false")]
    pub loop_media: bool,
}

fn default_priority() -> i32 {
    100
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl From<&ClipInstance> for TimelineRecord {
    fn from(clip: &ClipInstance) -> Self {
        Self {
            path: clip.path.clone(),
            start_at: clip.start_at,
            end_at: clip.end_at,
            duration: clip.duration,
            play_duration: clip.play_duration,
            cursor_start_at: clip.cursor_start_at,
            cursor_end_at: clip.cursor_end_at,
            priority: clip.priority,
            loop_media: clip.loop_media,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ScheduleDoc {
    schedule: Vec<TimelineRecord>,
}

pub struct TimelinePersistor {
    out_dir: PathBuf,
    out_priority_level: i32,
}

impl TimelinePersistor {
    pub fn new(out_dir: PathBuf, out_priority_level: i32) -> Self {
        Self {
            out_dir,
            out_priority_level,
        }
    }

    /// Write all three artifacts, replacing previous versions.
    pub fn save(&self, timeline: &Timeline) -> Result<(), ScheduleError> {
        std::fs::create_dir_all(&self.out_dir)?;

        let all: Vec<TimelineRecord> = timeline.entries().iter().map(Into::into).collect();
        let filtered: Vec<TimelineRecord> = timeline
            .filtered(self.out_priority_level)
            .map(Into::into)
            .collect();

        let path = self.out_dir.join(ALL_YAML_FILE);
        std::fs::write(&path, to_yaml(ScheduleDoc { schedule: all })?)?;
        info!("Wrote {}", path.display());

        let path = self.out_dir.join(FILTERED_YAML_FILE);
        std::fs::write(
            &path,
            to_yaml(ScheduleDoc {
                schedule: filtered.clone(),
            })?,
        )?;
        info!("Wrote {}", path.display());

        let path = self.out_dir.join(FILTERED_CSV_FILE);
        std::fs::write(&path, render_csv(&filtered))?;
        info!("Wrote {}", path.display());

        Ok(())
    }

    /// Reload the full timeline from `all.yaml`.
    pub fn load(&self) -> Result<Vec<TimelineRecord>, ScheduleError> {
        let path = self.out_dir.join(ALL_YAML_FILE);
        let text = std::fs::read_to_string(&path)?;
        let doc: ScheduleDoc = serde_yaml::from_str(&text)
            .map_err(|e| ScheduleError::bad_plan(path.display().to_string(), e.to_string()))?;
        Ok(doc.schedule)
    }
}

fn to_yaml(doc: ScheduleDoc) -> Result<String, ScheduleError> {
    serde_yaml::to_string(&doc)
        .map_err(|e| ScheduleError::bad_config(format!("cannot serialize timeline: {}", e)))
}

/// Tabular form of the filtered timeline: `start_at,duration,path`.
fn render_csv(records: &[TimelineRecord]) -> String {
    let mut out = String::from("start_at,duration,path\n");
    for record in records {
        out.push_str(&format!(
            "{},{},{}\n",
            record.start_at.to_rfc3339(),
            format_hms(record.duration),
            csv_field(&record.path)
        ));
    }
    out
}

/// Minimal CSV quoting: only fields containing a delimiter, quote or
/// newline are wrapped.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PreemptionPolicy;
    use chrono::TimeZone;

    fn clip(start: i64, play: i64) -> ClipInstance {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        ClipInstance {
            id: 0,
            source_id: 0,
            path: "clips/a.mp4".to_string(),
            priority: 100,
            start_at: base + Duration::seconds(start),
            end_at: base + Duration::seconds(start + play),
            duration: Duration::seconds(play),
            play_duration: Duration::seconds(play),
            cursor_start_at: Duration::zero(),
            cursor_end_at: Duration::seconds(play),
            loop_media: false,
            policy: PreemptionPolicy::Continue,
        }
    }

    #[test]
    fn test_record_round_trip() {
        let record = TimelineRecord::from(&clip(0, 10));
        let yaml = serde_yaml::to_string(&record).unwrap();
        // loop is omitted when false, durations render human-readable
        assert!(!yaml.contains("loop"));
        assert!(yaml.contains("0:00:10"));
        let back: TimelineRecord = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_csv_rendering() {
        let records = vec![TimelineRecord::from(&clip(0, 10))];
        let csv = render_csv(&records);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("start_at,duration,path"));
        assert_eq!(
            lines.next(),
            Some("2024-06-01T00:00:00+00:00,0:00:10,clips/a.mp4")
        );
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain.mp4"), "plain.mp4");
        assert_eq!(csv_field("with,comma.mp4"), "\"with,comma.mp4\"");
        assert_eq!(csv_field("with\"quote.mp4"), "\"with\"\"quote.mp4\"");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut timeline = Timeline::new();
        timeline.push(clip(0, 10));
        let mut strong = clip(10, 10);
        strong.priority = 10;
        timeline.push(strong);

        let persistor = TimelinePersistor::new(dir.path().to_path_buf(), 50);
        persistor.save(&timeline).unwrap();

        let loaded = persistor.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].priority, 100);

        // the filtered artifacts keep only priority <= cutoff
        let filtered = std::fs::read_to_string(dir.path().join(FILTERED_YAML_FILE)).unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&filtered).unwrap();
        assert_eq!(doc["schedule"].as_sequence().unwrap().len(), 1);
        let csv = std::fs::read_to_string(dir.path().join(FILTERED_CSV_FILE)).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }
}
