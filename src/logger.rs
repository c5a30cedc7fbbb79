use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    /// Every response body in full.
    Full,
    /// First response per endpoint in full, then only changed leaves.
    Diffed,
}

/// NDJSON log of proxy traffic.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str, body: Option<&Value>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, path: &str, status: u16, body: &Value) {
        let entry = match self.mode {
            MessageLogMode::Full => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "resp",
                "path": path,
                "status": status,
                "body": body,
            }),
            MessageLogMode::Diffed => match self.previous.insert(path.to_string(), body.clone()) {
                None => json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "resp",
                    "path": path,
                    "status": status,
                    "full": true,
                    "body": body,
                }),
                Some(prev) => {
                    let mut changes = Vec::new();
                    diff_json(&prev, body, "", &mut changes);
                    let changes: Vec<Value> = changes
                        .into_iter()
                        .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                        .collect();
                    json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "resp",
                        "path": path,
                        "status": status,
                        "changes": changes,
                    })
                }
            },
        };
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

/// Changed leaves between two documents as `(dotted.path, old, new)`.
/// List elements are addressed by position.
fn diff_json(previous: &Value, current: &Value, prefix: &str, changes: &mut Vec<(String, Value, Value)>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match (previous, current) {
        (Value::Object(prev), Value::Object(curr)) => {
            for (key, curr_val) in curr {
                let prev_val = prev.get(key).unwrap_or(&Value::Null);
                diff_json(prev_val, curr_val, &join(key), changes);
            }
        }
        (Value::Array(prev), Value::Array(curr)) if prev.len() == curr.len() => {
            for (i, (p, c)) in prev.iter().zip(curr).enumerate() {
                diff_json(p, c, &join(&i.to_string()), changes);
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}
