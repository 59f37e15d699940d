//! Interactive console loop, usable against an in-process engine or a remote
//! session. Output is produced through the same presenter either way, so the
//! two modes are indistinguishable at the prompt.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::engine::Engine;
use crate::pending::PendingInput;
use crate::render::render;
use crate::session::Session;

const PRIMARY_PROMPT: &str = "> ";
const CONTINUATION_PROMPT: &str = ". ";
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

static INTERRUPT_FLAG: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
fn install_sigint_handler() {
    extern "C" fn on_sigint(_signal: libc::c_int) {
        INTERRUPT_FLAG.store(true, Ordering::SeqCst);
    }
    unsafe {
        libc::signal(
            libc::SIGINT,
            on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t,
        );
    }
}

#[cfg(not(unix))]
fn install_sigint_handler() {}

/// Bridges the SIGINT flag (the only thing a signal handler may touch) to an
/// arbitrary action on a plain thread. Stopped and joined on drop.
struct InterruptWatch {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl InterruptWatch {
    fn spawn(action: impl Fn() + Send + 'static) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let watch_stop = stop.clone();
        let thread = thread::Builder::new()
            .name("console-interrupt".to_string())
            .spawn(move || {
                while !watch_stop.load(Ordering::SeqCst) {
                    if INTERRUPT_FLAG.swap(false, Ordering::SeqCst) {
                        action();
                    }
                    thread::sleep(INTERRUPT_POLL_INTERVAL);
                }
            })?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }
}

impl Drop for InterruptWatch {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Runs the console against an engine in this process.
pub fn run_local(engine: Box<dyn Engine>) -> Result<(), Box<dyn std::error::Error>> {
    install_sigint_handler();
    let handle = engine.interrupt_handle();
    let _watch = InterruptWatch::spawn(move || handle.request())?;

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    local_loop(engine, &mut reader, &mut stdout, &mut stderr)
}

/// Runs the console against an attached session. Ctrl-C becomes a one-byte
/// signal on the interrupt channel instead of a local engine poke.
pub fn run_remote(session: Session) -> Result<(), Box<dyn std::error::Error>> {
    install_sigint_handler();
    let interrupter = session.interrupter();
    let _watch = InterruptWatch::spawn(move || {
        let _ = interrupter.interrupt();
    })?;

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    remote_loop(session, &mut reader, &mut stdout, &mut stderr)
}

fn local_loop(
    mut engine: Box<dyn Engine>,
    reader: &mut dyn BufRead,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut pending = PendingInput::default();
    loop {
        write_prompt(stdout, &pending)?;
        let Some(line) = read_line(reader)? else {
            return Ok(());
        };
        pending.push_line(&line);

        let outcome = engine.submit(pending.text());
        if let Some(remaining) = outcome.remaining {
            pending.replace(remaining);
            continue;
        }
        pending.clear();

        if !outcome.diagnostics.is_empty() {
            writeln!(stderr, "{}", outcome.diagnostics)?;
            stderr.flush()?;
        }
        if let Some(value) = outcome.result {
            writeln!(stdout, "{}", render(&value))?;
            stdout.flush()?;
        }
        if outcome.quit {
            return Ok(());
        }
    }
}

fn remote_loop(
    mut session: Session,
    reader: &mut dyn BufRead,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut pending = PendingInput::default();
    loop {
        write_prompt(stdout, &pending)?;
        let Some(line) = read_line(reader)? else {
            session.close();
            return Ok(());
        };
        let quitting = !pending.is_accumulating() && line.trim() == "quit";

        match session.evaluate(&line, stdout, stderr)? {
            Some(_) => pending.push_line(&line),
            None => pending.clear(),
        }
        if quitting {
            session.close();
            return Ok(());
        }
    }
}

fn write_prompt(stdout: &mut dyn Write, pending: &PendingInput) -> io::Result<()> {
    let prompt = if pending.is_accumulating() {
        CONTINUATION_PROMPT
    } else {
        PRIMARY_PROMPT
    };
    write!(stdout, "{prompt}")?;
    stdout.flush()
}

fn read_line(reader: &mut dyn BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}
