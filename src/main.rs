use std::path::PathBuf;

use attach_console::engine::BlockEngine;
use attach_console::inject::SpawnInjector;
use attach_console::session::Session;
use attach_console::{agent, console, diagnostics, event_log};

enum CliCommand {
    Local,
    Attach(u32),
    Agent(String),
}

struct CliOptions {
    command: CliCommand,
    debug_events_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    // A remote peer closing its end mid-write would otherwise raise SIGPIPE
    // and kill the process; ignore it so writes fail with broken-pipe errors.
    ignore_sigpipe();
    diagnostics::startup_log("main: entry");

    let options = parse_cli_args()?;
    event_log::initialize(options.debug_events_dir)?;

    match options.command {
        CliCommand::Agent(entry_argument) => {
            diagnostics::startup_log("main: agent mode");
            event_log::record(event_log::Event::Startup {
                mode: "agent".to_string(),
            });
            agent::run_from_entry(&entry_argument, Box::new(BlockEngine::new()))?;
            Ok(())
        }
        CliCommand::Attach(pid) => {
            diagnostics::startup_log("main: attach mode");
            event_log::record(event_log::Event::Startup {
                mode: "attach".to_string(),
            });
            let injector = SpawnInjector::current_exe()?;
            let session = Session::attach(pid, &injector)?;
            console::run_remote(session)
        }
        CliCommand::Local => {
            diagnostics::startup_log("main: local console");
            event_log::record(event_log::Event::Startup {
                mode: "local".to_string(),
            });
            console::run_local(Box::new(BlockEngine::new()))
        }
    }
}

#[cfg(unix)]
fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

fn parse_cli_args() -> Result<CliOptions, Box<dyn std::error::Error>> {
    let mut parser = ArgParser::new();
    let mut command = CliCommand::Local;
    let mut debug_events_dir = None;

    while let Some(arg) = parser.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "--attach" => {
                let value = parser.next_value("--attach")?;
                command = CliCommand::Attach(parse_pid(&value)?);
            }
            _ if arg.starts_with("--attach=") => {
                let value = arg.split_once('=').map(|(_, value)| value).unwrap_or("");
                if value.is_empty() {
                    return Err("missing value for --attach".into());
                }
                command = CliCommand::Attach(parse_pid(value)?);
            }
            "--agent" => {
                let value = parser.next_value("--agent")?;
                command = CliCommand::Agent(value);
            }
            _ if arg.starts_with("--agent=") => {
                let value = arg.split_once('=').map(|(_, value)| value).unwrap_or("");
                if value.is_empty() {
                    return Err("missing value for --agent".into());
                }
                command = CliCommand::Agent(value.to_string());
            }
            "--debug-events-dir" => {
                let value = parser.next_value("--debug-events-dir")?;
                if value.trim().is_empty() {
                    return Err("missing value for --debug-events-dir".into());
                }
                debug_events_dir = Some(PathBuf::from(value));
            }
            _ if arg.starts_with("--debug-events-dir=") => {
                let value = arg.split_once('=').map(|(_, value)| value).unwrap_or("");
                if value.trim().is_empty() {
                    return Err("missing value for --debug-events-dir".into());
                }
                debug_events_dir = Some(PathBuf::from(value));
            }
            _ => return Err(format!("unknown argument: {arg}").into()),
        }
    }

    Ok(CliOptions {
        command,
        debug_events_dir,
    })
}

fn parse_pid(value: &str) -> Result<u32, Box<dyn std::error::Error>> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid process id: {value}").into())
}

fn print_usage() {
    println!(
        "usage: attach-console [options]\n\
         \n\
         Run an interactive evaluation console, either in-process or attached\n\
         to an agent injected into another process.\n\
         \n\
         options:\n\
         \x20 --attach <pid>            attach to a running process\n\
         \x20 --agent <entry>           run the injected agent (internal; entry is\n\
         \x20                           \"attach-console-agent:<cmdPort>:<intPort>\")\n\
         \x20 --debug-events-dir <dir>  write a JSONL event log into <dir>\n\
         \x20 -h, --help                show this help"
    );
}

struct ArgParser {
    args: Vec<String>,
    index: usize,
}

impl ArgParser {
    fn new() -> Self {
        Self {
            args: std::env::args().skip(1).collect(),
            index: 0,
        }
    }

    fn next(&mut self) -> Option<String> {
        let value = self.args.get(self.index)?.clone();
        self.index += 1;
        Some(value)
    }

    fn next_value(&mut self, flag: &str) -> Result<String, Box<dyn std::error::Error>> {
        self.next()
            .ok_or_else(|| format!("missing value for {flag}").into())
    }
}
