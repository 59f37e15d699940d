use std::io::{self, Read, Write};
use std::net::TcpStream;

/// A duplex byte stream, one per TCP connection. The reader and writer halves
/// are boxed so tests can substitute in-memory pipes for real sockets.
pub struct Channel {
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
}

impl Channel {
    pub fn new(reader: Box<dyn Read + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self { reader, writer }
    }

    pub fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        let reader = stream.try_clone()?;
        Ok(Self {
            reader: Box::new(reader),
            writer: Box::new(stream),
        })
    }

    /// Connected in-memory pair: whatever one end writes, the other reads.
    pub fn pair() -> io::Result<(Channel, Channel)> {
        let (left_read, right_write) = io::pipe()?;
        let (right_read, left_write) = io::pipe()?;
        let left = Channel::new(Box::new(left_read), Box::new(left_write));
        let right = Channel::new(Box::new(right_read), Box::new(right_write));
        Ok((left, right))
    }
}

impl Read for Channel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Write for Channel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
