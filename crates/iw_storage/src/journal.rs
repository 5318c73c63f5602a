//! Append-only journal of completed fetch cycles.
//!
//! Each line reads `Processed <count> at <timestamp>`. The newest line is the
//! "data last updated" signal for whatever serves the stored articles.

use chrono::{DateTime, NaiveDateTime, Utc};
use iw_core::Result;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMarker {
    pub processed: usize,
    pub completed_at: DateTime<Utc>,
}

impl RunMarker {
    pub fn to_line(&self) -> String {
        format!(
            "Processed {} at {}",
            self.processed,
            self.completed_at.format(TIMESTAMP_FORMAT)
        )
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let (head, timestamp) = line.trim().rsplit_once(" at ")?;
        let processed = head.strip_prefix("Processed ")?.trim().parse().ok()?;
        let completed_at = NaiveDateTime::parse_from_str(timestamp.trim(), TIMESTAMP_PARSE_FORMAT)
            .ok()?
            .and_utc();
        Some(Self {
            processed,
            completed_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunJournal {
    path: PathBuf,
}

impl RunJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, processed: usize, completed_at: DateTime<Utc>) -> Result<RunMarker> {
        let marker = RunMarker {
            processed,
            completed_at,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", marker.to_line()).as_bytes())
            .await?;
        file.flush().await?;
        tracing::debug!(path = %self.path.display(), line = %marker.to_line(), "run marker appended");
        Ok(marker)
    }

    /// The newest well-formed marker, or `None` if the journal is missing or empty.
    pub async fn last_completed(&self) -> Result<Option<RunMarker>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(contents.lines().rev().find_map(RunMarker::parse_line))
    }
}
