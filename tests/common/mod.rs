#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use attach_console::agent;
use attach_console::engine::{Engine, InterruptHandle, Submission};
use attach_console::inject::Injector;
use attach_console::protocol;
use attach_console::render::Value;
use attach_console::session::AttachError;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Engine that replays a fixed script of submissions and records everything
/// it was asked to evaluate.
pub struct ScriptedEngine {
    script: VecDeque<Submission>,
    seen: Arc<Mutex<Vec<String>>>,
    interrupt: InterruptHandle,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Submission>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                script: script.into(),
                seen: seen.clone(),
                interrupt: InterruptHandle::default(),
            },
            seen,
        )
    }
}

impl Engine for ScriptedEngine {
    fn submit(&mut self, input: &str) -> Submission {
        self.seen.lock().unwrap().push(input.to_string());
        self.script.pop_front().unwrap_or_default()
    }

    fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }
}

/// Engine whose single turn blocks until its interrupt flag is raised,
/// then reports the cancellation as a diagnostic.
pub struct BlockingEngine {
    interrupt: InterruptHandle,
    max_wait: Duration,
}

impl BlockingEngine {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            interrupt: InterruptHandle::default(),
            max_wait,
        }
    }
}

impl Engine for BlockingEngine {
    fn submit(&mut self, _input: &str) -> Submission {
        let deadline = std::time::Instant::now() + self.max_wait;
        while std::time::Instant::now() < deadline {
            if self.interrupt.take() {
                return Submission {
                    diagnostics: "interrupted".to_string(),
                    ..Submission::default()
                };
            }
            thread::sleep(Duration::from_millis(5));
        }
        Submission::value(Value::Text("never interrupted".to_string()))
    }

    fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }
}

/// Injector that hosts the agent on a thread in this process instead of
/// loading code into a foreign one; the dial-back handshake over real
/// localhost sockets is identical either way.
pub struct ThreadInjector {
    engine: Mutex<Option<Box<dyn Engine>>>,
}

impl ThreadInjector {
    pub fn new(engine: Box<dyn Engine>) -> Self {
        Self {
            engine: Mutex::new(Some(engine)),
        }
    }
}

impl Injector for ThreadInjector {
    fn inject(&self, _pid: u32, entry_argument: &str) -> Result<(), AttachError> {
        let (command_port, interrupt_port) = protocol::parse_entry_argument(entry_argument)
            .ok_or_else(|| AttachError::Inject(format!("bad entry argument: {entry_argument}")))?;
        let engine = self
            .engine
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| AttachError::Inject("injector already used".to_string()))?;
        thread::Builder::new()
            .name("test-agent".to_string())
            .spawn(move || {
                let _ = agent::run(command_port, interrupt_port, engine);
            })
            .map_err(|err| AttachError::Inject(err.to_string()))?;
        Ok(())
    }
}
