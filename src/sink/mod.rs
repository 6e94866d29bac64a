//! Buffer-then-forward sink fed by a background copy thread.
//!
//! A [`Sink`] starts in buffering mode: everything the copy thread reads
//! from its source is kept in memory. [`Sink::attach`] writes the buffer to
//! a destination and switches to forwarding, atomically with respect to
//! every other write. [`Sink::close`] stops the source and waits for the
//! copy thread, so nothing read before the close is lost.

mod completion;
mod error;
mod mode;

pub use error::SinkError;

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::stream::{
    intercept, Interception, OutputSlot, PipeReader, Source, SourceCloser, TeeReader,
};
use completion::Completion;
use mode::{Handover, Mode};

pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Settings for a single sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkOptions {
    /// Name used in log fields and the copy thread's name.
    pub label: String,
    /// Size of each read from the source.
    pub read_buffer_size: usize,
}

impl SinkOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            label: "sink".to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

struct State {
    mode: Mode,
    /// `None` once closed.
    source: Option<Box<dyn SourceCloser>>,
}

struct Shared {
    label: String,
    state: Mutex<State>,
    completion: Completion,
}

impl Shared {
    fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        self.state.lock().mode.write(bytes)
    }

    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        self.state.lock().mode.write_all(bytes)
    }
}

/// Thread-safe write destination that buffers until a destination is attached.
pub struct Sink {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Sink {
    /// Start draining `source` into a new sink on a background thread.
    pub fn spawn<S: Source>(source: S, options: SinkOptions) -> Result<Self, SinkError> {
        let closer = source.closer().map_err(SinkError::Setup)?;
        let shared = Arc::new(Shared {
            label: options.label,
            state: Mutex::new(State {
                mode: Mode::new(),
                source: Some(closer),
            }),
            completion: Completion::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let buffer_size = options.read_buffer_size.max(1);
        let worker = thread::Builder::new()
            .name(format!("latelog-copy-{}", shared.label))
            .spawn(move || copy_loop(source, &worker_shared, buffer_size))
            .map_err(SinkError::Spawn)?;

        tracing::debug!(sink = %shared.label, buffer_size, "sink started");

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Intercept `slot`, mirror everything written to it back onto the
    /// original handle, and buffer a copy in a new sink.
    ///
    /// On failure the slot holds its original handle again.
    pub fn intercept<O>(slot: &mut O, options: SinkOptions) -> Result<Self, SinkError>
    where
        O: OutputSlot + ?Sized,
    {
        Self::intercept_with(slot, options, Self::spawn)
    }

    fn intercept_with<O, F>(
        slot: &mut O,
        options: SinkOptions,
        start: F,
    ) -> Result<Self, SinkError>
    where
        O: OutputSlot + ?Sized,
        F: FnOnce(TeeReader<PipeReader, File>, SinkOptions) -> Result<Self, SinkError>,
    {
        let Interception { reader, original } = intercept(slot).map_err(SinkError::Setup)?;
        let saved = match original.try_clone() {
            Ok(saved) => saved,
            Err(err) => {
                put_back(slot, original);
                return Err(SinkError::Setup(err));
            }
        };

        start(TeeReader::new(reader, original), options).inspect_err(|_| put_back(slot, saved))
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Flush buffered bytes into `destination` and forward everything after.
    ///
    /// On failure nothing changes: the sink keeps buffering the same bytes
    /// and attach can be retried. Attaching while already forwarding flushes
    /// the current destination and replaces it.
    pub fn attach<W>(&self, destination: W) -> Result<(), SinkError>
    where
        W: Write + Send + 'static,
    {
        let result = self.shared.state.lock().mode.attach(Box::new(destination));

        match &result {
            Ok(Handover::Flushed(bytes)) => {
                tracing::info!(sink = %self.label(), bytes, "flushed buffered output, forwarding")
            }
            Ok(Handover::Repointed) => {
                tracing::info!(sink = %self.label(), "forwarding to new destination")
            }
            Err(err) => tracing::warn!(
                sink = %self.label(),
                error_type = err.error_type(),
                "attach failed, still buffering: {}",
                err
            ),
        }

        result.map(|_| ())
    }

    /// Stop the source, wait for the copy thread and flush the destination.
    ///
    /// Returns the copy error if the stream failed, otherwise the error from
    /// closing the source, otherwise the destination flush error. A second
    /// call returns [`SinkError::AlreadyClosed`] without blocking.
    pub fn close(&self) -> Result<(), SinkError> {
        let close_result = {
            let mut state = self.shared.state.lock();
            let closer = state.source.take().ok_or(SinkError::AlreadyClosed)?;
            closer.close()
        };

        let copy_result = self.shared.completion.wait();
        if let Some(worker) = self.worker.lock().take() {
            // A panic was already reported through the completion cell.
            let _ = worker.join();
        }
        let flush_result = self.shared.state.lock().mode.flush();

        match &copy_result {
            Some(Ok(total)) => tracing::debug!(sink = %self.label(), total, "sink closed"),
            Some(Err(err)) => {
                tracing::warn!(sink = %self.label(), "copy stopped with error: {}", err)
            }
            None => {}
        }

        if let Some(Err(err)) = copy_result {
            return Err(SinkError::Copy(err));
        }
        close_result.map_err(SinkError::Close)?;
        flush_result.map_err(SinkError::DestinationFlush)
    }

    /// Drain the bytes that never reached a destination.
    ///
    /// `None` when forwarding. Must only be called once the copy thread has
    /// finished, i.e. after [`close`](Self::close).
    ///
    /// # Panics
    ///
    /// Panics if the copy thread is still running.
    pub fn residual(&self) -> Option<Vec<u8>> {
        assert!(
            self.shared.completion.is_complete(),
            "Sink::close() must be called before Sink::residual()"
        );
        self.shared.state.lock().mode.take_residual()
    }

    /// Copy of the pending buffer, `None` when forwarding.
    pub fn buffered(&self) -> Option<Vec<u8>> {
        self.shared.state.lock().mode.buffered().map(<[u8]>::to_vec)
    }

    pub fn is_forwarding(&self) -> bool {
        self.shared.state.lock().mode.is_forwarding()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().source.is_none()
    }
}

impl Write for &Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.shared.write(buf)
    }

    /// Holds the lock for the whole slice so it stays contiguous.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.shared.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.shared.state.lock().mode.flush()
    }
}

/// Drains buffered bytes; reads `Ok(0)` once forwarding.
impl Read for &Sink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.shared.state.lock().mode.read(buf))
    }
}

impl Read for Sink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (&*self).write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self).flush()
    }
}

impl Drop for Sink {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(err) = self.close() {
            tracing::warn!(sink = %self.label(), "closing dropped sink failed: {}", err);
        }
    }
}

fn put_back<O: OutputSlot + ?Sized>(slot: &mut O, original: File) {
    if let Err(err) = slot.swap(OwnedFd::from(original)) {
        tracing::warn!("restoring intercepted handle failed: {}", err);
    }
}

fn copy_loop<S: Read>(mut source: S, shared: &Shared, buffer_size: usize) {
    let _unwind = scopeguard::guard_on_unwind((), |()| {
        shared
            .completion
            .complete(Err(io::Error::other("copy thread panicked")));
    });

    let result = pump(&mut source, shared, buffer_size);
    drop(source);
    shared.completion.complete(result);
}

fn pump<R: Read>(source: &mut R, shared: &Shared, buffer_size: usize) -> io::Result<u64> {
    let mut buf = vec![0u8; buffer_size];
    let mut total = 0u64;

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        shared.write_all(&buf[..n])?;
        total += n as u64;
    }
}
