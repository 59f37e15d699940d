use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

static STARTUP_EPOCH: OnceLock<Instant> = OnceLock::new();
static STARTUP_LOG_FILE: OnceLock<Option<Mutex<std::fs::File>>> = OnceLock::new();
const STARTUP_LOG_ENABLE_ENV: &str = "ATTACH_CONSOLE_DEBUG_STARTUP";
const STARTUP_LOG_PATH_ENV: &str = "ATTACH_CONSOLE_DEBUG_STARTUP_FILE";
const STARTUP_LOG_DEFAULT: &str = "attach-console-startup.log";

fn env_set(name: &str) -> bool {
    std::env::var(name)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

/// Opt-in, file-backed trace of attach and agent startup phases. A no-op
/// unless one of the debug env vars is set.
pub fn startup_log(message: impl AsRef<str>) {
    let file = STARTUP_LOG_FILE.get_or_init(|| {
        if !env_set(STARTUP_LOG_ENABLE_ENV) && !env_set(STARTUP_LOG_PATH_ENV) {
            return None;
        }
        let path = std::env::var(STARTUP_LOG_PATH_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| STARTUP_LOG_DEFAULT.to_string());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
            .map(Mutex::new)
    });
    let Some(file) = file else {
        return;
    };
    let elapsed = STARTUP_EPOCH.get_or_init(Instant::now).elapsed();
    if let Ok(mut guard) = file.lock() {
        let _ = writeln!(
            *guard,
            "[attach-console][startup +{:>6}ms] {}",
            elapsed.as_millis(),
            message.as_ref()
        );
        let _ = guard.flush();
    }
}
