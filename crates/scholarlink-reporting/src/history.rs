//! Append-only record of formatted responses.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ReportingError;
use crate::style::CitationStyle;

/// One formatted response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub mode: String,
    pub style: CitationStyle,
    pub response: String,
}

impl ResponseRecord {
    pub fn new(query: &str, mode: &str, style: CitationStyle, response: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            query: query.to_string(),
            mode: mode.to_string(),
            style,
            response: response.to_string(),
        }
    }
}

/// Somewhere to keep formatted responses.
pub trait ResponseSink: Send + Sync {
    fn record(&self, record: &ResponseRecord) -> Result<(), ReportingError>;
}

/// JSON Lines file, one record per line.
#[derive(Debug, Clone)]
pub struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<ResponseRecord>, ReportingError> {
        load_history(&self.path)
    }
}

impl ResponseSink for JsonlHistory {
    fn record(&self, record: &ResponseRecord) -> Result<(), ReportingError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // one write per record
        file.write_all(line.as_bytes())?;
        tracing::debug!(path = %self.path.display(), "recorded response");
        Ok(())
    }
}

/// Read every record. A missing file is an empty history; unreadable lines
/// are logged and skipped.
pub fn load_history(path: &Path) -> Result<Vec<ResponseRecord>, ReportingError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = i + 1, error = %e, "skipping malformed history line");
                None
            }
        })
        .collect())
}
