use std::io::{self, Read, Write};

/// Fixed prefix identifying this crate's agent entry point inside an injection
/// argument. The full argument is `"<marker>:<commandPort>:<interruptPort>"`.
pub const AGENT_MARKER: &str = "attach-console-agent";

/// One-byte status tags sent by the agent on the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Statement incomplete; the client must send another line.
    PartialInput = 1,
    /// Evaluation produced a value; payload is its rendered form.
    ResultSet = 2,
    /// Evaluation completed without producing a value.
    ResultNotSet = 3,
    /// Diagnostic text; zero or more may precede a terminal status.
    Error = 4,
}

impl Status {
    pub fn from_byte(byte: u8) -> io::Result<Self> {
        match byte {
            1 => Ok(Status::PartialInput),
            2 => Ok(Status::ResultSet),
            3 => Ok(Status::ResultNotSet),
            4 => Ok(Status::Error),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown status tag: {other}"),
            )),
        }
    }

    pub fn carries_payload(self) -> bool {
        matches!(self, Status::ResultSet | Status::Error)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::ResultSet | Status::ResultNotSet)
    }
}

/// Writes a length-prefixed UTF-8 string: 4-byte little-endian byte length,
/// then the bytes. A zero-length payload is valid.
pub fn write_string(writer: &mut impl Write, payload: &str) -> io::Result<()> {
    let bytes = payload.as_bytes();
    let len = u32::try_from(bytes.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "payload length exceeds the 4-byte frame prefix",
        )
    })?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(bytes)?;
    writer.flush()
}

/// Writes one status frame. Tags that carry a payload must be given one and
/// payload-less tags must not.
pub fn write_frame(writer: &mut impl Write, status: Status, payload: Option<&str>) -> io::Result<()> {
    debug_assert_eq!(status.carries_payload(), payload.is_some());
    writer.write_all(&[status as u8])?;
    match payload {
        Some(payload) => write_string(writer, payload),
        None => writer.flush(),
    }
}

/// Reads exactly one status byte. A short read is end-of-stream, surfaced as
/// `UnexpectedEof`, never a partial frame.
pub fn read_status(reader: &mut impl Read) -> io::Result<Status> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    Status::from_byte(byte[0])
}

/// Reads a 4-byte little-endian length then exactly that many bytes, decoded
/// as UTF-8.
pub fn read_string(reader: &mut impl Read) -> io::Result<String> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;
    let len = u32::from_le_bytes(prefix) as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, format!("invalid UTF-8 payload: {err}")))
}

pub fn format_entry_argument(command_port: u16, interrupt_port: u16) -> String {
    format!("{AGENT_MARKER}:{command_port}:{interrupt_port}")
}

pub fn parse_entry_argument(argument: &str) -> Option<(u16, u16)> {
    let rest = argument.strip_prefix(AGENT_MARKER)?.strip_prefix(':')?;
    let (command, interrupt) = rest.split_once(':')?;
    Some((command.trim().parse().ok()?, interrupt.trim().parse().ok()?))
}
