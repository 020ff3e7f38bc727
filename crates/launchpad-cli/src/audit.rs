//! Append-only audit trail of state-changing commands.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub(crate) enum AuditError {
    #[error("failed to append to audit log '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialise audit event: {0}")]
    Serialise(#[source] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct AuditEvent<'a> {
    #[serde(with = "time::serde::rfc3339")]
    ts: OffsetDateTime,
    #[serde(rename = "type")]
    kind: &'a str,
    payload: Value,
}

/// JSON-lines audit log, one event per line.
#[derive(Debug, Clone)]
pub(crate) struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends an event stamped with the current UTC time.
    pub(crate) fn record(&self, kind: &str, payload: Value) -> Result<(), AuditError> {
        self.record_at(OffsetDateTime::now_utc(), kind, payload)
    }

    fn record_at(&self, ts: OffsetDateTime, kind: &str, payload: Value) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(&AuditEvent { ts, kind, payload })
            .map_err(AuditError::Serialise)?;
        line.push(b'\n');
        let write_error = |source| AuditError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_error)?;
        file.write_all(&line).map_err(write_error)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn events_are_appended_as_json_lines() {
        let dir = TempDir::new().expect("temp dir");
        let log = AuditLog::new(dir.path().join("audit.jsonl"));

        log.record_at(
            datetime!(2026-03-01 09:30 UTC),
            "pack",
            json!({ "app": "coevo-api" }),
        )
        .expect("first event");
        log.record("stop", json!({ "app": "coevo-api" }))
            .expect("second event");

        let contents = fs::read_to_string(&log.path).expect("read log");
        let lines: Vec<Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        let first = lines.first().expect("first line");
        assert_eq!(first["ts"], "2026-03-01T09:30:00Z");
        assert_eq!(first["type"], "pack");
        assert_eq!(first["payload"]["app"], "coevo-api");
    }
}
