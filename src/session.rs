//! Attach client: owns one attach relationship and its two channels, drives
//! one evaluation turn per console line, and maps cancellation onto the
//! interrupt channel.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use crate::channel::Channel;
use crate::event_log;
use crate::inject::Injector;
use crate::protocol::{self, Status};

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum AttachError {
    /// The injection primitive rejected the request or the target process
    /// does not exist. No session was created, no cleanup is needed.
    Inject(String),
    Io(io::Error),
    /// The agent never dialed back within the accept window.
    AcceptTimeout(Duration),
}

impl std::fmt::Display for AttachError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachError::Inject(message) => write!(f, "injection failed: {message}"),
            AttachError::Io(err) => write!(f, "attach io error: {err}"),
            AttachError::AcceptTimeout(timeout) => write!(
                f,
                "timed out after {} ms waiting for the agent to connect",
                timeout.as_millis()
            ),
        }
    }
}

impl std::error::Error for AttachError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttachError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for AttachError {
    fn from(err: io::Error) -> Self {
        AttachError::Io(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

/// One attach relationship. The command channel is used strictly
/// request/response by `evaluate`; the interrupt channel is independent and
/// may be signaled at any time through an [`Interrupter`].
pub struct Session {
    pid: u32,
    command: Channel,
    interrupt: Arc<Mutex<Channel>>,
    state: SessionState,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("pid", &self.pid)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Clonable handle for signaling the interrupt channel from an asynchronous
/// trigger. The mutex keeps interrupts one-in-flight: a second request blocks
/// until the first acknowledgement byte has been consumed.
#[derive(Clone)]
pub struct Interrupter {
    channel: Arc<Mutex<Channel>>,
}

impl Interrupter {
    /// Writes one request byte and blocks for the acknowledgement. If the
    /// agent is already gone the request is silently dropped.
    pub fn interrupt(&self) -> io::Result<()> {
        let mut channel = self.channel.lock().unwrap_or_else(|poison| poison.into_inner());
        event_log::record(event_log::Event::InterruptRequested);
        channel.write_all(&[0])?;
        channel.flush()?;
        let mut ack = [0u8; 1];
        match channel.read(&mut ack) {
            Ok(0) => Ok(()),
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl Session {
    /// Establishes a session against a running target process: binds two
    /// ephemeral listeners, asks the injector to start the agent with both
    /// port numbers, then accepts exactly one connection on each listener.
    pub fn attach(pid: u32, injector: &dyn Injector) -> Result<Self, AttachError> {
        let command_listener = TcpListener::bind(("127.0.0.1", 0))?;
        let interrupt_listener = TcpListener::bind(("127.0.0.1", 0))?;
        let command_port = command_listener.local_addr()?.port();
        let interrupt_port = interrupt_listener.local_addr()?.port();

        let entry_argument = protocol::format_entry_argument(command_port, interrupt_port);
        event_log::record(event_log::Event::AttachRequested { pid });
        crate::diagnostics::startup_log(format!("attach: injecting with {entry_argument}"));
        injector.inject(pid, &entry_argument)?;

        // The agent dials both ports; backlog buffers whichever lands first,
        // so accepting sequentially observes them in either order.
        let command = accept_with_timeout(command_listener, ACCEPT_TIMEOUT)?;
        let interrupt = accept_with_timeout(interrupt_listener, ACCEPT_TIMEOUT)?;

        event_log::record(event_log::Event::AttachEstablished {
            pid,
            command_port,
            interrupt_port,
        });
        Ok(Self {
            pid,
            command: Channel::from_tcp(command)?,
            interrupt: Arc::new(Mutex::new(Channel::from_tcp(interrupt)?)),
            state: SessionState::Active,
        })
    }

    /// Assembles a session directly from established channels. Used by tests
    /// and by embedders that manage their own transport.
    pub fn from_channels(pid: u32, command: Channel, interrupt: Channel) -> Self {
        Self {
            pid,
            command,
            interrupt: Arc::new(Mutex::new(interrupt)),
            state: SessionState::Active,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            channel: self.interrupt.clone(),
        }
    }

    /// Sends one console line and consumes frames until the turn's terminal
    /// status. Returns the input unchanged for `PARTIAL_INPUT` so the caller
    /// keeps accumulating, `None` once the turn completed. Error payloads go
    /// to `stderr`, a rendered result to `stdout`.
    pub fn evaluate(
        &mut self,
        input: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> io::Result<Option<String>> {
        let result = self.evaluate_inner(input, stdout, stderr);
        if result.is_err() {
            self.state = SessionState::Closed;
        }
        result
    }

    fn evaluate_inner(
        &mut self,
        input: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> io::Result<Option<String>> {
        protocol::write_string(&mut self.command, input)?;
        loop {
            match protocol::read_status(&mut self.command)? {
                Status::PartialInput => return Ok(Some(input.to_string())),
                Status::Error => {
                    let message = protocol::read_string(&mut self.command)?;
                    writeln!(stderr, "{message}")?;
                    stderr.flush()?;
                }
                Status::ResultNotSet => return Ok(None),
                Status::ResultSet => {
                    let rendered = protocol::read_string(&mut self.command)?;
                    writeln!(stdout, "{rendered}")?;
                    stdout.flush()?;
                    return Ok(None);
                }
            }
        }
    }

    /// Convenience wrapper over [`Interrupter::interrupt`].
    pub fn interrupt(&self) -> io::Result<()> {
        self.interrupter().interrupt()
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
        event_log::record(event_log::Event::SessionClosed {
            reason: "client requested exit".to_string(),
        });
    }
}

/// Blocks accepting one inbound connection, bounded by `timeout`. Grounded on
/// a connector thread handing the result back over a channel so the caller
/// can give up without platform-specific socket cancellation.
fn accept_with_timeout(listener: TcpListener, timeout: Duration) -> Result<TcpStream, AttachError> {
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name("attach-accept".to_string())
        .spawn(move || {
            let _ = tx.send(listener.accept());
        })
        .map_err(AttachError::Io)?;
    match rx.recv_timeout(timeout) {
        Ok(Ok((stream, _addr))) => Ok(stream),
        Ok(Err(err)) => Err(AttachError::Io(err)),
        Err(_) => Err(AttachError::AcceptTimeout(timeout)),
    }
}
