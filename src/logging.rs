// src/logging.rs
//
// Observability sinks for training runs.
// - EpisodeSink: trait used by the dialogue runner
// - NoopSink:    discards all records
// - FileSink:    one JSON object per line, for offline analysis

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Per-episode record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Phase the episode ran in ("warmup", "train", "eval").
    pub phase: String,
    /// Global episode index (1-based).
    pub episode: u32,
    pub success: bool,
    /// Sum of per-turn rewards.
    pub reward: f64,
    /// Rounds executed.
    pub rounds: u32,
    /// True when the warmup budget forced termination mid-episode; the
    /// success flag then reflects the simulator's last word, not a real
    /// task outcome.
    pub truncated: bool,
}

/// Per-evaluation-window record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRecord {
    /// Train-phase episode index closing the window.
    pub episode: u32,
    /// Window success rate.
    pub succ_rate: f64,
    /// Bound the rate was measured against: max(best so far, threshold).
    pub best_bound: f64,
    /// Whether this window promoted a new best (and flushed memory).
    pub promoted: bool,
}

/// Abstract sink for run telemetry.
pub trait EpisodeSink {
    fn log_episode(&mut self, record: &EpisodeRecord);
    fn log_window(&mut self, record: &WindowRecord);
}

impl<T: EpisodeSink + ?Sized> EpisodeSink for Box<T> {
    fn log_episode(&mut self, record: &EpisodeRecord) {
        (**self).log_episode(record);
    }

    fn log_window(&mut self, record: &WindowRecord) {
        (**self).log_window(record);
    }
}

/// Sink that discards all records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EpisodeSink for NoopSink {
    fn log_episode(&mut self, _record: &EpisodeRecord) {}
    fn log_window(&mut self, _record: &WindowRecord) {}
}

/// JSONL file sink. Each record is one JSON object on its own line,
/// tagged with a `kind` field.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_line(&mut self, kind: &str, payload: serde_json::Value) {
        let line = serde_json::json!({ "kind": kind, "record": payload });
        // Telemetry failures must not abort a run.
        let _ = writeln!(self.writer, "{line}");
        let _ = self.writer.flush();
    }
}

impl EpisodeSink for FileSink {
    fn log_episode(&mut self, record: &EpisodeRecord) {
        if let Ok(v) = serde_json::to_value(record) {
            self.write_line("episode", v);
        }
    }

    fn log_window(&mut self, record: &WindowRecord) {
        if let Ok(v) = serde_json::to_value(record) {
            self.write_line("window", v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_sink_accepts_records() {
        let mut sink = NoopSink;
        sink.log_episode(&EpisodeRecord {
            phase: "warmup".to_string(),
            episode: 1,
            success: true,
            reward: 35.0,
            rounds: 8,
            truncated: false,
        });
        sink.log_window(&WindowRecord {
            episode: 100,
            succ_rate: 0.6,
            best_bound: 0.5,
            promoted: true,
        });
    }

    #[test]
    fn test_file_sink_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");

        {
            let mut sink = FileSink::create(&path).unwrap();
            sink.log_episode(&EpisodeRecord {
                phase: "train".to_string(),
                episode: 3,
                success: false,
                reward: -21.0,
                rounds: 20,
                truncated: false,
            });
            sink.log_window(&WindowRecord {
                episode: 5,
                succ_rate: 0.4,
                best_bound: 0.5,
                promoted: false,
            });
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["kind"], "episode");
        assert_eq!(first["record"]["episode"], 3);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["kind"], "window");
        assert_eq!(second["record"]["promoted"], false);
    }
}
