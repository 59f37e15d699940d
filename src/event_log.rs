//! Structured JSONL event log for session debugging. Disabled unless a
//! directory is supplied via `--debug-events-dir` or the env var; every line
//! is one self-contained JSON object.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::json;

pub const DEBUG_EVENTS_DIR_ENV: &str = "ATTACH_CONSOLE_DEBUG_EVENTS_DIR";

static LOGGER: OnceLock<Option<Arc<EventLogger>>> = OnceLock::new();

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Startup {
        mode: String,
    },
    AttachRequested {
        pid: u32,
    },
    AttachEstablished {
        pid: u32,
        command_port: u16,
        interrupt_port: u16,
    },
    AgentConnected {
        command_port: u16,
        interrupt_port: u16,
    },
    TurnCompleted {
        status: &'static str,
    },
    InterruptRequested,
    InterruptAcknowledged,
    SessionClosed {
        reason: String,
    },
}

#[derive(Debug)]
struct EventLogger {
    file: Mutex<File>,
    startup_epoch: Instant,
    pid: u32,
    seq: AtomicU64,
}

impl EventLogger {
    fn new(dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        fs::create_dir_all(dir)?;
        let pid = std::process::id();
        let file = create_unique_log_file(dir, unix_ms_now(), pid)?;
        Ok(Self {
            file: Mutex::new(file),
            startup_epoch: Instant::now(),
            pid,
            seq: AtomicU64::new(0),
        })
    }

    fn write_event(&self, event: &Event) -> Result<(), Box<dyn std::error::Error>> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let mut line = json!({
            "ts_unix_ms": unix_ms_now(),
            "uptime_ms": self.startup_epoch.elapsed().as_millis(),
            "seq": seq,
            "pid": self.pid,
        });
        let payload = serde_json::to_value(event)?;
        if let (Some(envelope), Some(fields)) = (line.as_object_mut(), payload.as_object()) {
            for (key, value) in fields {
                envelope.insert(key.clone(), value.clone());
            }
        }
        let mut file = self.file.lock().unwrap_or_else(|poison| poison.into_inner());
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }
}

/// Resolves the log directory (flag wins over env) and opens the per-process
/// log file. Safe to call more than once; later calls are ignored.
pub fn initialize(debug_events_dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let dir = debug_events_dir.or_else(|| {
        std::env::var(DEBUG_EVENTS_DIR_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
    });
    let logger = match dir {
        Some(dir) => Some(Arc::new(EventLogger::new(&dir)?)),
        None => None,
    };
    let _ = LOGGER.set(logger);
    Ok(())
}

/// Records one event. A no-op when logging was never initialized or is
/// disabled; recording failures are swallowed so logging can never abort a
/// turn.
pub fn record(event: Event) {
    let Some(Some(logger)) = LOGGER.get() else {
        return;
    };
    let _ = logger.write_event(&event);
}

fn unix_ms_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}

fn create_unique_log_file(
    dir: &Path,
    unix_ms: u128,
    pid: u32,
) -> Result<File, Box<dyn std::error::Error>> {
    for attempt in 0u32..100 {
        let name = if attempt == 0 {
            format!("attach-console-{unix_ms}-{pid}.jsonl")
        } else {
            format!("attach-console-{unix_ms}-{pid}-{attempt}.jsonl")
        };
        match OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(dir.join(name))
        {
            Ok(file) => return Ok(file),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err("unable to create a unique event log file".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let value = serde_json::to_value(Event::TurnCompleted {
            status: "result_set",
        })
        .expect("serialize");
        assert_eq!(value["event"], "turn_completed");
        assert_eq!(value["status"], "result_set");

        let value = serde_json::to_value(Event::AttachEstablished {
            pid: 7,
            command_port: 4000,
            interrupt_port: 4001,
        })
        .expect("serialize");
        assert_eq!(value["event"], "attach_established");
        assert_eq!(value["command_port"], 4000);
    }

    #[test]
    fn logger_writes_one_json_object_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logger = EventLogger::new(dir.path()).expect("logger");
        logger
            .write_event(&Event::Startup {
                mode: "local".to_string(),
            })
            .expect("write");
        logger
            .write_event(&Event::InterruptRequested)
            .expect("write");

        let entry = fs::read_dir(dir.path())
            .expect("read dir")
            .next()
            .expect("one file")
            .expect("entry");
        let mut contents = String::new();
        File::open(entry.path())
            .expect("open")
            .read_to_string(&mut contents)
            .expect("read");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["event"], "startup");
        assert_eq!(first["seq"], 1);
        let second: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(second["event"], "interrupt_requested");
        assert_eq!(second["seq"], 2);
    }

    #[test]
    fn unique_file_creation_survives_collisions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = create_unique_log_file(dir.path(), 1234, 42).expect("first");
        let second = create_unique_log_file(dir.path(), 1234, 42).expect("second");
        drop((first, second));
        assert_eq!(fs::read_dir(dir.path()).expect("read dir").count(), 2);
    }
}
