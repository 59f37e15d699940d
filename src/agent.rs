//! Process-resident agent: dials back to the client's two ports, runs one
//! evaluation turn per complete input unit on the command channel, and
//! services cancellation requests on the interrupt channel.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::thread;

use crate::channel::Channel;
use crate::engine::{Engine, InterruptHandle};
use crate::event_log;
use crate::pending::PendingInput;
use crate::protocol::{self, Status};
use crate::render::render;

/// Entry point invoked by the injection primitive. Dials back to the two
/// client-provided ports, spawns the interrupt listener, then runs the
/// per-turn loop until quit or client disconnect.
pub fn run(command_port: u16, interrupt_port: u16, engine: Box<dyn Engine>) -> io::Result<()> {
    crate::diagnostics::startup_log(format!(
        "agent: dialing back command={command_port} interrupt={interrupt_port}"
    ));
    let command = TcpStream::connect(("127.0.0.1", command_port))?;
    let interrupt = TcpStream::connect(("127.0.0.1", interrupt_port))?;
    event_log::record(event_log::Event::AgentConnected {
        command_port,
        interrupt_port,
    });

    let handle = engine.interrupt_handle();
    let _listener = thread::Builder::new()
        .name("agent-interrupt".to_string())
        .spawn(move || interrupt_loop(interrupt, handle))?;

    turn_loop(Channel::from_tcp(command)?, engine)
}

/// Parses the injection entry argument and runs the agent against its ports.
pub fn run_from_entry(entry_argument: &str, engine: Box<dyn Engine>) -> io::Result<()> {
    let (command_port, interrupt_port) =
        protocol::parse_entry_argument(entry_argument).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("malformed agent entry argument: {entry_argument}"),
            )
        })?;
    run(command_port, interrupt_port, engine)
}

/// Per-turn loop. One read per console line; the agent owns the accumulated
/// buffer, so the engine always sees the whole statement so far. Peer
/// disconnect ends the loop without error.
pub fn turn_loop(mut channel: Channel, mut engine: Box<dyn Engine>) -> io::Result<()> {
    let mut pending = PendingInput::default();
    loop {
        let line = match protocol::read_string(&mut channel) {
            Ok(line) => line,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                event_log::record(event_log::Event::SessionClosed {
                    reason: "client disconnected".to_string(),
                });
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        pending.push_line(&line);

        let outcome = engine.submit(pending.text());
        if let Some(remaining) = outcome.remaining {
            pending.replace(remaining);
            protocol::write_frame(&mut channel, Status::PartialInput, None)?;
            event_log::record(event_log::Event::TurnCompleted {
                status: "partial_input",
            });
            continue;
        }
        pending.clear();

        if !outcome.diagnostics.is_empty() {
            protocol::write_frame(&mut channel, Status::Error, Some(&outcome.diagnostics))?;
        }
        match outcome.result {
            Some(value) => {
                protocol::write_frame(&mut channel, Status::ResultSet, Some(&render(&value)))?;
                event_log::record(event_log::Event::TurnCompleted {
                    status: "result_set",
                });
            }
            None => {
                protocol::write_frame(&mut channel, Status::ResultNotSet, None)?;
                event_log::record(event_log::Event::TurnCompleted {
                    status: "result_not_set",
                });
            }
        }
        if outcome.quit {
            event_log::record(event_log::Event::SessionClosed {
                reason: "quit requested".to_string(),
            });
            return Ok(());
        }
    }
}

/// Interrupt listener: one blocking read per request, then the cooperative
/// hook, then one acknowledgement byte. Ends on end-of-stream.
fn interrupt_loop(mut stream: TcpStream, handle: InterruptHandle) {
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        handle.request();
        event_log::record(event_log::Event::InterruptAcknowledged);
        if stream.write_all(&[0]).is_err() {
            return;
        }
        let _ = stream.flush();
    }
}
