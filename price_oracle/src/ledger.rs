//! Run/status ledger
//!
//! Every launch records one entry: which task ran, when it started and how
//! it ended. Task and status names are validated before anything is
//! written.

use crate::error::{OracleError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Kind of run recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Learn,
    Predict,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Learn => "learn",
            TaskKind::Predict => "predict",
        }
    }
}

impl FromStr for TaskKind {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "learn" => Ok(TaskKind::Learn),
            "predict" => Ok(TaskKind::Predict),
            other => Err(OracleError::InvalidTask(other.to_string())),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ongoing,
    Finished,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Ongoing => "ongoing",
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
        }
    }

    /// Whether no further transition is expected
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Ongoing)
    }
}

impl FromStr for RunStatus {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ongoing" => Ok(RunStatus::Ongoing),
            "finished" => Ok(RunStatus::Finished),
            "failed" => Ok(RunStatus::Failed),
            other => Err(OracleError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub task: TaskKind,
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
}

/// Records the lifecycle of runs
pub trait RunLedger {
    /// Start a new entry with status `ongoing` and make it current.
    ///
    /// Fails with [`OracleError::InvalidTask`] for an unknown task name.
    fn create_entry(&mut self, task: &str) -> Result<u64>;

    /// Update the status of the current entry.
    ///
    /// Fails with [`OracleError::InvalidStatus`] for an unknown status name.
    fn set_status(&mut self, status: &str) -> Result<()>;
}

/// Entries held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Vec<LedgerEntry>,
    current: Option<usize>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Entry the next status update applies to
    pub fn current(&self) -> Option<&LedgerEntry> {
        self.current.and_then(|i| self.entries.get(i))
    }

    fn push(&mut self, task: TaskKind) -> u64 {
        let id = self.entries.last().map_or(1, |e| e.id + 1);
        self.entries.push(LedgerEntry {
            id,
            task,
            started_at: Utc::now(),
            status: RunStatus::Ongoing,
        });
        self.current = Some(self.entries.len() - 1);
        id
    }

    fn update(&mut self, status: RunStatus) -> Result<u64> {
        let entry = self
            .current
            .and_then(|i| self.entries.get_mut(i))
            .ok_or_else(|| OracleError::ValidationError("No ledger entry to update".to_string()))?;
        entry.status = status;
        Ok(entry.id)
    }
}

impl RunLedger for MemoryLedger {
    fn create_entry(&mut self, task: &str) -> Result<u64> {
        let task = task.parse::<TaskKind>()?;
        Ok(self.push(task))
    }

    fn set_status(&mut self, status: &str) -> Result<()> {
        let status = status.parse::<RunStatus>()?;
        self.update(status)?;
        Ok(())
    }
}

/// Entries persisted as a JSON document, rewritten on every change
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
    inner: MemoryLedger,
}

impl FileLedger {
    /// Open the ledger at `path`; a missing file starts an empty ledger
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries: Vec<LedgerEntry> = if path.exists() {
            serde_json::from_reader(BufReader::new(File::open(&path)?))?
        } else {
            Vec::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "opened run ledger");
        Ok(Self {
            path,
            inner: MemoryLedger {
                entries,
                current: None,
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        self.inner.entries()
    }

    pub fn current(&self) -> Option<&LedgerEntry> {
        self.inner.current()
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, self.inner.entries())?;
        writer.flush()?;
        Ok(())
    }
}

impl RunLedger for FileLedger {
    fn create_entry(&mut self, task: &str) -> Result<u64> {
        let id = self.inner.create_entry(task)?;
        self.persist()?;
        debug!(id, task, "created ledger entry");
        Ok(id)
    }

    fn set_status(&mut self, status: &str) -> Result<()> {
        let status = status.parse::<RunStatus>()?;
        let id = self.inner.update(status)?;
        self.persist()?;
        debug!(id, %status, "updated ledger entry");
        Ok(())
    }
}
