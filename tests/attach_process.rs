//! Attach against the real binary: the spawn injector starts a separate
//! agent host process and the session talks to it over TCP.

mod common;

use std::path::PathBuf;

use attach_console::inject::SpawnInjector;
use attach_console::session::Session;
use common::TestResult;

fn console_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_attach-console"))
}

#[test]
fn spawned_agent_evaluates_with_the_builtin_engine() -> TestResult<()> {
    let injector = SpawnInjector::new(console_binary());
    let mut session = Session::attach(0, &injector)?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    assert!(session.evaluate("1+1", &mut stdout, &mut stderr)?.is_none());
    assert_eq!(String::from_utf8(stdout)?, "2\n");
    assert!(stderr.is_empty());

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    assert!(
        session
            .evaluate("[1, \"a\", null]", &mut stdout, &mut stderr)?
            .is_none()
    );
    assert_eq!(String::from_utf8(stdout)?, "{ 1, \"a\", null }\n");
    Ok(())
}

#[test]
fn spawned_agent_accumulates_partial_input() -> TestResult<()> {
    let injector = SpawnInjector::new(console_binary());
    let mut session = Session::attach(0, &injector)?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let outcome = session.evaluate("[1,", &mut stdout, &mut stderr)?;
    assert_eq!(outcome.as_deref(), Some("[1,"));
    assert!(stdout.is_empty());

    let outcome = session.evaluate("2]", &mut stdout, &mut stderr)?;
    assert!(outcome.is_none());
    assert_eq!(String::from_utf8(stdout)?, "{ 1, 2 }\n");
    Ok(())
}

#[test]
fn spawned_agent_reports_diagnostics_without_a_value() -> TestResult<()> {
    let injector = SpawnInjector::new(console_binary());
    let mut session = Session::attach(0, &injector)?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    assert!(session.evaluate("1/0", &mut stdout, &mut stderr)?.is_none());
    assert!(stdout.is_empty());
    assert!(String::from_utf8(stderr)?.contains("division by zero"));

    // The turn completed; the session is still usable.
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    assert!(session.evaluate("2*3", &mut stdout, &mut stderr)?.is_none());
    assert_eq!(String::from_utf8(stdout)?, "6\n");
    Ok(())
}

#[test]
fn quit_ends_the_spawned_agent_turn_loop() -> TestResult<()> {
    let injector = SpawnInjector::new(console_binary());
    let mut session = Session::attach(0, &injector)?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    assert!(session.evaluate("quit", &mut stdout, &mut stderr)?.is_none());
    assert!(stdout.is_empty());

    // The agent hung up after the terminal frame; the next turn fails as a
    // transport error.
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    assert!(session.evaluate("1+1", &mut stdout, &mut stderr).is_err());
    Ok(())
}
