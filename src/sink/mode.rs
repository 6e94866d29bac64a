use std::fmt;
use std::io::{self, Write};
use std::mem;

use crate::sink::error::SinkError;

pub(crate) type Destination = Box<dyn Write + Send>;

/// Where new writes go.
pub(crate) enum Mode {
    /// Accumulate until a destination is attached.
    Buffering(Vec<u8>),
    /// Pass straight through.
    Forwarding(Destination),
}

/// What an attach did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handover {
    Flushed(usize),
    Repointed,
}

impl Mode {
    pub(crate) fn new() -> Self {
        Mode::Buffering(Vec::new())
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        match self {
            Mode::Buffering(buffer) => {
                buffer.extend_from_slice(bytes);
                Ok(bytes.len())
            }
            Mode::Forwarding(destination) => destination.write(bytes),
        }
    }

    pub(crate) fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Mode::Buffering(buffer) => {
                buffer.extend_from_slice(bytes);
                Ok(())
            }
            Mode::Forwarding(destination) => destination.write_all(bytes),
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        match self {
            Mode::Buffering(_) => Ok(()),
            Mode::Forwarding(destination) => destination.flush(),
        }
    }

    pub(crate) fn is_forwarding(&self) -> bool {
        matches!(self, Mode::Forwarding(_))
    }

    pub(crate) fn buffered(&self) -> Option<&[u8]> {
        match self {
            Mode::Buffering(buffer) => Some(buffer.as_slice()),
            Mode::Forwarding(_) => None,
        }
    }

    /// Move up to `out.len()` bytes from the front of the buffer.
    pub(crate) fn read(&mut self, out: &mut [u8]) -> usize {
        match self {
            Mode::Buffering(buffer) => {
                let n = buffer.len().min(out.len());
                out[..n].copy_from_slice(&buffer[..n]);
                buffer.drain(..n);
                n
            }
            Mode::Forwarding(_) => 0,
        }
    }

    /// Drain whatever is still buffered.
    pub(crate) fn take_residual(&mut self) -> Option<Vec<u8>> {
        match self {
            Mode::Buffering(buffer) => Some(mem::take(buffer)),
            Mode::Forwarding(_) => None,
        }
    }

    /// Hand over to `destination`.
    ///
    /// From `Buffering` the whole buffer is written first; any failure keeps
    /// the mode and the buffer exactly as they were. From `Forwarding` the
    /// current destination is flushed and replaced.
    pub(crate) fn attach(&mut self, mut destination: Destination) -> Result<Handover, SinkError> {
        match self {
            Mode::Buffering(buffer) => {
                write_buffer(destination.as_mut(), buffer)?;
                let flushed = buffer.len();
                *self = Mode::Forwarding(destination);
                Ok(Handover::Flushed(flushed))
            }
            Mode::Forwarding(current) => {
                current.flush().map_err(SinkError::DestinationFlush)?;
                *current = destination;
                Ok(Handover::Repointed)
            }
        }
    }
}

fn write_buffer(destination: &mut dyn Write, buffer: &[u8]) -> Result<(), SinkError> {
    let expected = buffer.len();
    let mut written = 0;
    while written < expected {
        match destination.write(&buffer[written..]) {
            Ok(0) => return Err(SinkError::ShortWrite { written, expected }),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(SinkError::Flush {
                    written,
                    expected,
                    source,
                })
            }
        }
    }
    destination.flush().map_err(|source| SinkError::Flush {
        written,
        expected,
        source,
    })
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Buffering(buffer) => f
                .debug_struct("Buffering")
                .field("len", &buffer.len())
                .finish(),
            Mode::Forwarding(_) => f.write_str("Forwarding"),
        }
    }
}
