pub mod agent;
pub mod channel;
pub mod console;
pub mod diagnostics;
pub mod engine;
pub mod event_log;
pub mod inject;
pub mod pending;
pub mod protocol;
pub mod render;
pub mod session;
