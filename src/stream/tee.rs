use std::io::{self, Read, Write};

use thiserror::Error;

use crate::stream::source::{Source, SourceCloser};

/// Failure to mirror bytes onto the duplicate target.
///
/// Carried inside the `io::Error` returned by [`TeeReader::read`].
#[derive(Debug, Error)]
pub enum TeeError {
    #[error("Short write duplicating stream: wrote {written} of {read} bytes")]
    ShortWrite { read: usize, written: usize },

    #[error("Write error duplicating stream after {written} of {read} bytes: {source}")]
    Write {
        read: usize,
        written: usize,
        #[source]
        source: io::Error,
    },
}

impl From<TeeError> for io::Error {
    fn from(err: TeeError) -> Self {
        let kind = match &err {
            TeeError::ShortWrite { .. } => io::ErrorKind::WriteZero,
            // Copy loops retry `Interrupted`; a failed duplicate must stop them.
            TeeError::Write { source, .. } if source.kind() == io::ErrorKind::Interrupted => {
                io::ErrorKind::Other
            }
            TeeError::Write { source, .. } => source.kind(),
        };
        io::Error::new(kind, err)
    }
}

/// Reader that writes every chunk it reads to a second destination before
/// handing it back.
pub struct TeeReader<R, W> {
    source: R,
    duplicate: W,
}

impl<R, W> TeeReader<R, W> {
    pub fn new(source: R, duplicate: W) -> Self {
        Self { source, duplicate }
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    pub fn duplicate(&self) -> &W {
        &self.duplicate
    }

    pub fn into_parts(self) -> (R, W) {
        (self.source, self.duplicate)
    }
}

impl<R: Read, W: Write> Read for TeeReader<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.source.read(buf)?;
        if n > 0 {
            duplicate_all(&mut self.duplicate, &buf[..n])?;
        }
        Ok(n)
    }
}

fn duplicate_all<W: Write>(duplicate: &mut W, bytes: &[u8]) -> Result<(), TeeError> {
    let read = bytes.len();
    let mut written = 0;
    while written < read {
        match duplicate.write(&bytes[written..]) {
            Ok(0) => return Err(TeeError::ShortWrite { read, written }),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(TeeError::Write {
                    read,
                    written,
                    source,
                })
            }
        }
    }
    duplicate.flush().map_err(|source| TeeError::Write {
        read,
        written,
        source,
    })
}

/// Closing a tee closes only its source; the duplicate belongs to the caller.
impl<R, W> Source for TeeReader<R, W>
where
    R: Source,
    W: Write + Send + 'static,
{
    fn closer(&self) -> io::Result<Box<dyn SourceCloser>> {
        self.source.closer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Accepts at most `chunk` bytes per call.
    struct TrickleWriter {
        chunk: usize,
        out: Vec<u8>,
    }

    impl Write for TrickleWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_duplicates_each_read() {
        let mut tee = TeeReader::new(Cursor::new(b"abcdef".to_vec()), Vec::new());

        let mut buf = [0u8; 4];
        assert_eq!(tee.read(&mut buf).unwrap(), 4);
        assert_eq!(tee.duplicate(), b"abcd");
        assert_eq!(tee.read(&mut buf).unwrap(), 2);
        assert_eq!(tee.duplicate(), b"abcdef");
        assert_eq!(tee.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_partial_duplicate_writes_are_completed() {
        let writer = TrickleWriter {
            chunk: 3,
            out: Vec::new(),
        };
        let mut tee = TeeReader::new(Cursor::new(b"0123456789".to_vec()), writer);

        let mut out = Vec::new();
        tee.read_to_end(&mut out).unwrap();

        assert_eq!(out, b"0123456789");
        assert_eq!(tee.duplicate().out, b"0123456789");
    }

    #[test]
    fn test_short_duplicate_is_read_error() {
        let mut tee = TeeReader::new(Cursor::new(b"abc".to_vec()), ZeroWriter);

        let mut buf = [0u8; 8];
        let err = tee.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);

        let inner = err.get_ref().and_then(|e| e.downcast_ref::<TeeError>());
        assert!(matches!(
            inner,
            Some(TeeError::ShortWrite {
                read: 3,
                written: 0
            })
        ));

        // The bytes were consumed from the source even though the read failed.
        assert_eq!(tee.source().position(), 3);
    }

    #[test]
    fn test_interrupted_duplicate_error_is_not_retryable() {
        let err: io::Error = TeeError::Write {
            read: 1,
            written: 0,
            source: io::Error::from(io::ErrorKind::Interrupted),
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
