//! Append-only audit trail of inbound webhook deliveries.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::Result;

const AUDIT_MAX_TEXT: usize = 4000;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    /// Raw webhook body as received.
    pub fn inbound(body: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event: "inbound".to_string(),
            user_id: None,
            content: Some(body.to_string()),
            error: None,
        }
    }

    pub fn error(user_id: Option<&str>, error: &str, content: Option<&str>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event: "error".to_string(),
            user_id: user_id.map(|s| s.to_string()),
            content: content.map(|s| s.to_string()),
            error: Some(error.to_string()),
        }
    }

    /// `<timestamp> <event> [user=<id>] [error=<msg>]`, then the content
    /// indented on the following lines.
    fn plain_line(&self) -> String {
        let mut line = format!("{} {}", self.timestamp, self.event);
        if let Some(user) = &self.user_id {
            line.push_str(&format!(" user={user}"));
        }
        if let Some(error) = &self.error {
            line.push_str(&format!(" error={error}"));
        }
        if let Some(content) = &self.content {
            for body_line in content.lines() {
                line.push_str("\n    ");
                line.push_str(body_line);
            }
        }
        line
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        writeln!(file, "{}", event.plain_line())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
