use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Represents each line type in the task JSONL history file.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskLogLine {
    TaskStart {
        timestamp: DateTime<Utc>,
        task: String,
        criteria: String,
        propose_model: String,
        judge_model: String,
        max_rounds: usize,
    },
    Round {
        round: usize,
        verdict: String,
        descriptor_replaced: bool,
        files_replaced: Option<usize>,
        execution_secs: f64,
        failure: Option<String>,
        timestamp: DateTime<Utc>,
    },
    TaskEnd {
        outcome: String,
        rounds: usize,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Writes task history as JSONL to a file in the local data directory
/// (`~/.local/share/forgeloop/tasks/` on Linux).
pub struct TaskLogWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl TaskLogWriter {
    /// Create a new writer. Computes the file path from the current UTC
    /// timestamp and a hash of the task text, creates parent directories,
    /// and opens the file for writing.
    pub fn new(task: &str) -> io::Result<Self> {
        let tasks_dir = Self::tasks_dir()?;
        Self::new_in(&tasks_dir, task)
    }

    /// Create a writer rooted at an explicit directory
    pub fn new_in(dir: &Path, task: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let now = Utc::now();
        let digest = Sha256::digest(task.as_bytes());
        let short_hash = &hex::encode(digest)[..8];
        let file_name = format!("{}_{}.jsonl", now.format("%Y%m%d_%H%M%S"), short_hash);
        let path = dir.join(file_name);

        let file = File::create(&path)?;
        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and flush so a crash never loses completed rounds
    pub fn write(&self, line: &TaskLogLine) -> io::Result<()> {
        let json = serde_json::to_string(line)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut writer = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "task log lock poisoned"))?;
        writeln!(writer, "{}", json)?;
        writer.flush()
    }

    fn tasks_dir() -> io::Result<PathBuf> {
        let base = dirs::data_local_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no local data directory available")
        })?;
        Ok(base.join("forgeloop").join("tasks"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_jsonl_lines() {
        let dir = TempDir::new().unwrap();
        let writer = TaskLogWriter::new_in(dir.path(), "print hello world").unwrap();

        writer
            .write(&TaskLogLine::TaskStart {
                timestamp: Utc::now(),
                task: "print hello world".into(),
                criteria: "stdout contains hello".into(),
                propose_model: "claude".into(),
                judge_model: "claude".into(),
                max_rounds: 20,
            })
            .unwrap();
        writer
            .write(&TaskLogLine::TaskEnd {
                outcome: "success".into(),
                rounds: 1,
                duration_secs: 2.0,
                timestamp: Utc::now(),
            })
            .unwrap();

        let content = fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""type":"task_start""#));
        assert!(lines[1].contains(r#""type":"task_end""#));
    }

    #[test]
    fn test_file_name_has_task_hash() {
        let dir = TempDir::new().unwrap();
        let writer = TaskLogWriter::new_in(dir.path(), "some task").unwrap();
        let name = writer.path().file_name().unwrap().to_string_lossy();
        assert!(name.ends_with(".jsonl"));
        // timestamp + underscore + 8 hex chars
        assert_eq!(name.split('_').count(), 3);
    }
}
