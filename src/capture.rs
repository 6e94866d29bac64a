//! Capture of the process's own stdout and stderr.
//!
//! Descriptors 1 and 2 are pointed at pipes, everything written to them is
//! mirrored back to the original terminal and held in a [`Sink`] per stream
//! until a log file is attached.

use std::fs::File;
use std::io::{self, Write};
use std::mem;

use crate::config::CaptureConfig;
use crate::sink::{Sink, SinkError};
use crate::stream::{intercept, FdSlot, Interception, TeeReader};

/// Outcome of one captured stream after [`StdCapture::finish`].
#[derive(Debug)]
pub struct StreamReport {
    pub name: &'static str,
    /// Bytes that never reached a destination; `None` when forwarding.
    pub residual: Option<Vec<u8>>,
    pub error: Option<SinkError>,
}

#[derive(Debug, Default)]
pub struct CaptureReport {
    pub streams: Vec<StreamReport>,
}

impl CaptureReport {
    /// Total bytes left undelivered across all streams.
    pub fn undelivered(&self) -> usize {
        self.streams
            .iter()
            .filter_map(|s| s.residual.as_ref())
            .map(Vec::len)
            .sum()
    }

    pub fn errors(&self) -> impl Iterator<Item = (&'static str, &SinkError)> {
        self.streams
            .iter()
            .filter_map(|s| s.error.as_ref().map(|e| (s.name, e)))
    }
}

struct CapturedStream {
    name: &'static str,
    slot: FdSlot,
    /// Kept to point the descriptor back at the terminal on shutdown.
    original: File,
    sink: Sink,
}

impl CapturedStream {
    fn start(name: &'static str, mut slot: FdSlot, config: &CaptureConfig) -> Result<Self, SinkError> {
        let Interception { reader, original } = intercept(&mut slot).map_err(SinkError::Setup)?;

        let saved = match original.try_clone() {
            Ok(saved) => saved,
            Err(err) => {
                let _ = slot.restore(&original);
                return Err(SinkError::Setup(err));
            }
        };

        let sink = match Sink::spawn(TeeReader::new(reader, original), config.sink_options(name)) {
            Ok(sink) => sink,
            Err(err) => {
                let _ = slot.restore(&saved);
                return Err(err);
            }
        };

        Ok(Self {
            name,
            slot,
            original: saved,
            sink,
        })
    }

    fn shutdown(mut self) -> StreamReport {
        flush_std(self.name);

        // Dropping the descriptor's reference to the pipe lets the copy
        // thread see EOF once children have exited.
        let restore_error = self.slot.restore(&self.original).err();
        let close_result = self.sink.close();

        let error = match (close_result, restore_error) {
            (Err(err), _) => Some(err),
            (Ok(()), Some(err)) => Some(SinkError::Setup(err)),
            (Ok(()), None) => None,
        };

        StreamReport {
            name: self.name,
            residual: self.sink.residual(),
            error,
        }
    }
}

fn flush_std(name: &str) {
    let result = match name {
        "stdout" => io::stdout().flush(),
        _ => io::stderr().flush(),
    };
    if let Err(err) = result {
        tracing::debug!(stream = name, "flushing std handle failed: {}", err);
    }
}

/// Live capture of the process's standard streams.
///
/// Dropping it without calling [`finish`](Self::finish) still restores the
/// descriptors and closes the sinks.
pub struct StdCapture {
    streams: Vec<CapturedStream>,
}

impl StdCapture {
    /// Redirect the streams enabled in `config`.
    pub fn start(config: &CaptureConfig) -> Result<Self, SinkError> {
        // Anything Rust still buffers belongs to the terminal, not the pipe.
        flush_std("stdout");

        let mut capture = Self {
            streams: Vec::with_capacity(2),
        };
        if config.stdout {
            capture
                .streams
                .push(CapturedStream::start("stdout", FdSlot::stdout(), config)?);
        }
        if config.stderr {
            capture
                .streams
                .push(CapturedStream::start("stderr", FdSlot::stderr(), config)?);
        }

        tracing::debug!(streams = capture.streams.len(), "standard streams captured");
        Ok(capture)
    }

    pub fn sink(&self, name: &str) -> Option<&Sink> {
        self.streams
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.sink)
    }

    pub fn stream_names(&self) -> Vec<&'static str> {
        self.streams.iter().map(|s| s.name).collect()
    }

    /// Attach `file` to every captured stream, stdout first.
    pub fn attach(&self, file: &File) -> Result<(), SinkError> {
        for stream in &self.streams {
            let destination = file.try_clone().map_err(SinkError::Setup)?;
            stream.sink.attach(destination)?;
        }
        Ok(())
    }

    /// Restore the descriptors, drain and close every sink.
    pub fn finish(mut self) -> CaptureReport {
        let streams = mem::take(&mut self.streams);
        CaptureReport {
            streams: streams.into_iter().map(CapturedStream::shutdown).collect(),
        }
    }
}

impl Drop for StdCapture {
    fn drop(&mut self) {
        for stream in self.streams.drain(..) {
            let report = stream.shutdown();
            if let Some(err) = report.error {
                tracing::warn!(stream = report.name, "capture shutdown failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_sums_undelivered_bytes() {
        let report = CaptureReport {
            streams: vec![
                StreamReport {
                    name: "stdout",
                    residual: Some(b"abc".to_vec()),
                    error: None,
                },
                StreamReport {
                    name: "stderr",
                    residual: None,
                    error: Some(SinkError::AlreadyClosed),
                },
            ],
        };

        assert_eq!(report.undelivered(), 3);
        let errors: Vec<_> = report.errors().map(|(name, _)| name).collect();
        assert_eq!(errors, vec!["stderr"]);
    }
}
