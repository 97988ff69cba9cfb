use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Loop stage a transient failure was absorbed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStage {
    Execute,
    Judge,
    Merge,
}

impl std::fmt::Display for RoundStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundStage::Execute => write!(f, "execute"),
            RoundStage::Judge => write!(f, "judge"),
            RoundStage::Merge => write!(f, "merge"),
        }
    }
}

/// Structured log events for the convergence loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    TaskStarted {
        task_preview: String,
        max_rounds: usize,
    },
    ProposeStarted,
    ProposeCompleted {
        files: usize,
        duration_secs: f64,
    },
    ProposeFailed {
        error: String,
    },
    RoundStarted {
        round: usize,
        max_rounds: usize,
    },
    ExecutionCompleted {
        round: usize,
        output_lines: usize,
        duration_secs: f64,
    },
    JudgeCompleted {
        round: usize,
        verdict: String,
    },
    PatchApplied {
        round: usize,
        descriptor_replaced: bool,
        files_replaced: Option<usize>,
    },
    /// A transient failure absorbed as "not satisfied, no patch"
    RoundFailure {
        round: usize,
        stage: RoundStage,
        error: String,
    },
    TaskCompleted {
        rounds: usize,
        duration_secs: f64,
    },
    RoundBudgetExhausted {
        rounds: usize,
    },
    TaskInterrupted {
        rounds: usize,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for forgeloop events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON lines
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::TaskStarted {
                task_preview,
                max_rounds,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(stderr, "{}", "forgeloop".bold().bright_white());
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "Task:".dimmed(),
                    truncate(task_preview, 72).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "  {} {} rounds",
                    "Budget:".dimmed(),
                    max_rounds
                );
                let _ = writeln!(stderr);
            }
            LogEvent::ProposeStarted => {
                let _ = writeln!(
                    stderr,
                    "{} {}",
                    "▶".bright_cyan(),
                    "PROPOSE".bright_cyan().bold()
                );
            }
            LogEvent::ProposeCompleted {
                files,
                duration_secs,
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} bundle with {} {} ({:.1}s)",
                    "✓".bright_green(),
                    files,
                    if *files == 1 { "file" } else { "files" },
                    duration_secs
                );
                let _ = writeln!(stderr);
            }
            LogEvent::ProposeFailed { error } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "✗".bright_red(),
                    error.bright_red()
                );
            }
            LogEvent::RoundStarted { round, max_rounds } => {
                let _ = writeln!(
                    stderr,
                    "{} {} {}",
                    "▶".bright_blue(),
                    "ROUND".bright_blue().bold(),
                    format!("{}/{}", round, max_rounds).bright_blue()
                );
            }
            LogEvent::ExecutionCompleted {
                output_lines,
                duration_secs,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} output {} ({:.1}s)",
                    "⚙".dimmed(),
                    output_lines,
                    if *output_lines == 1 { "line" } else { "lines" },
                    duration_secs
                );
            }
            LogEvent::JudgeCompleted { verdict, .. } => {
                let styled = if verdict.starts_with("SATISFIED") {
                    format!("✓ Verdict: {}", verdict).bright_green().to_string()
                } else {
                    format!("→ Verdict: {}", verdict).bright_yellow().to_string()
                };
                let _ = writeln!(stderr, "  {}", styled);
            }
            LogEvent::PatchApplied {
                descriptor_replaced,
                files_replaced,
                ..
            } => {
                let mut parts = Vec::new();
                if *descriptor_replaced {
                    parts.push("descriptor".to_string());
                }
                if let Some(n) = files_replaced {
                    parts.push(format!("{} {}", n, if *n == 1 { "file" } else { "files" }));
                }
                let _ = writeln!(
                    stderr,
                    "  {} patched: {}",
                    "±".bright_magenta(),
                    parts.join(", ")
                );
                let _ = writeln!(stderr);
            }
            LogEvent::RoundFailure { stage, error, .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} failed: {}",
                    "✗".bright_red(),
                    stage,
                    error.bright_red()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::TaskCompleted {
                rounds,
                duration_secs,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Criteria satisfied after {} {} ({:.1}s)",
                    "✓".bright_green().bold(),
                    rounds,
                    if *rounds == 1 { "round" } else { "rounds" },
                    duration_secs
                );
            }
            LogEvent::RoundBudgetExhausted { rounds } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Round budget exhausted ({})",
                    "⚠".bright_yellow(),
                    rounds
                );
            }
            LogEvent::TaskInterrupted { rounds } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Interrupted after {} {}",
                    "⚠".bright_yellow(),
                    rounds,
                    if *rounds == 1 { "round" } else { "rounds" }
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::TaskStarted { max_rounds, .. } => {
                format!("[{}] task:start budget={}", timestamp, max_rounds)
            }
            LogEvent::ProposeStarted => format!("[{}] propose:start", timestamp),
            LogEvent::ProposeCompleted {
                files,
                duration_secs,
            } => format!(
                "[{}] propose:done files={} {:.1}s",
                timestamp, files, duration_secs
            ),
            LogEvent::ProposeFailed { error } => {
                format!("[{}] propose:fail {}", timestamp, error)
            }
            LogEvent::RoundStarted { round, max_rounds } => {
                format!("[{}] round:start:{}/{}", timestamp, round, max_rounds)
            }
            LogEvent::ExecutionCompleted {
                round,
                output_lines,
                duration_secs,
            } => format!(
                "[{}] execute:done:{} lines={} {:.1}s",
                timestamp, round, output_lines, duration_secs
            ),
            LogEvent::JudgeCompleted { round, verdict } => {
                format!("[{}] judge:done:{} {}", timestamp, round, verdict)
            }
            LogEvent::PatchApplied {
                round,
                descriptor_replaced,
                files_replaced,
            } => format!(
                "[{}] patch:{} descriptor={} files={:?}",
                timestamp, round, descriptor_replaced, files_replaced
            ),
            LogEvent::RoundFailure {
                round,
                stage,
                error,
            } => format!("[{}] round:fail:{} {} {}", timestamp, round, stage, error),
            LogEvent::TaskCompleted {
                rounds,
                duration_secs,
            } => format!(
                "[{}] task:done:{} {:.1}s",
                timestamp, rounds, duration_secs
            ),
            LogEvent::RoundBudgetExhausted { rounds } => {
                format!("[{}] task:exhausted:{}", timestamp, rounds)
            }
            LogEvent::TaskInterrupted { rounds } => {
                format!("[{}] task:interrupted:{}", timestamp, rounds)
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
