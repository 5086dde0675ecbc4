use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::diff::diff_json;

/// How status polls are recorded in the wire log.
pub enum MessageLogMode {
    /// Every poll body is written in full.
    Full,
    /// First poll per device in full, afterwards only the changed leaves.
    Diffed,
}

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_state: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            mode,
            file,
            previous_state: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, method: &str, url: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "url": url,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, url: &str, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "url": url,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_poll(&mut self, url: &str, status: u16, body: &Value) {
        let entry = match self.mode {
            MessageLogMode::Full => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "poll",
                "url": url,
                "status": status,
                "body": body,
            }),
            MessageLogMode::Diffed => match self.previous_state.get(url) {
                None => json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "poll",
                    "url": url,
                    "status": status,
                    "full": true,
                    "body": body,
                }),
                Some(prev) => {
                    let mut changes = Vec::new();
                    diff_json(prev, body, "", &mut changes);

                    let change_entries: Vec<Value> = changes
                        .iter()
                        .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                        .collect();

                    json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "poll",
                        "url": url,
                        "status": status,
                        "changes": change_entries,
                    })
                }
            },
        };
        if let MessageLogMode::Diffed = self.mode {
            self.previous_state.insert(url.to_string(), body.clone());
        }
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn read_lines(path: &str) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_request_writes_ndjson() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request("GET", "http://10.0.0.5/api/v/1/status");

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["method"], "GET");
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn log_command_captures_body() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_command("http://10.0.0.5/api/v/1/set/fan", &json!({"value": 2}));

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "cmd");
        assert_eq!(lines[0]["url"], "http://10.0.0.5/api/v/1/set/fan");
        assert_eq!(lines[0]["body"]["value"], 2);
    }

    #[test]
    fn diffed_mode_logs_full_first_then_changes() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_poll("a", 200, &json!({"RESULT": {"t": 24}}));
        logger.log_poll("a", 200, &json!({"RESULT": {"t": 25}}));

        let lines = read_lines(path);
        assert_eq!(lines[0]["full"], true);
        assert!(lines[0]["body"].is_object());
        let changes = lines[1]["changes"].as_array().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["path"], "RESULT.t");
    }

    #[test]
    fn diffed_mode_tracks_devices_separately() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_poll("a", 200, &json!({"RESULT": {"t": 24}}));
        logger.log_poll("b", 200, &json!({"RESULT": {"t": 20}}));
        logger.log_poll("a", 200, &json!({"RESULT": {"t": 24}}));

        let lines = read_lines(path);
        assert_eq!(lines[1]["full"], true);
        assert_eq!(lines[2]["changes"].as_array().unwrap().len(), 0);
    }
}
