//! Injection primitive behind a one-operation interface, so the concrete
//! code-loading mechanism stays swappable.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::session::AttachError;

/// Starts this crate's agent entry point inside (or on behalf of) the target
/// process, passing the encoded port argument.
pub trait Injector {
    fn inject(&self, pid: u32, entry_argument: &str) -> Result<(), AttachError>;
}

/// Stand-in for a platform code-loading API: launches a fresh host process
/// running this executable in agent mode. Pid 0 requests a new host; any
/// other pid is verified to exist before the agent host is spawned.
pub struct SpawnInjector {
    program: PathBuf,
}

impl SpawnInjector {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }
}

impl Injector for SpawnInjector {
    fn inject(&self, pid: u32, entry_argument: &str) -> Result<(), AttachError> {
        if pid != 0 && !process_exists(pid) {
            return Err(AttachError::Inject(format!(
                "target process {pid} does not exist"
            )));
        }
        Command::new(&self.program)
            .arg("--agent")
            .arg(entry_argument)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| AttachError::Inject(format!("failed to start agent host: {err}")))?;
        Ok(())
    }
}

#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    // Signal 0 performs the permission and existence checks without
    // delivering anything.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn process_exists(_pid: u32) -> bool {
    true
}
