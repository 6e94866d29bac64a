//! Shared test utilities: spy destinations and an in-memory source.

#![allow(dead_code)]

use latelog::sink::Sink;
use latelog::stream::{Source, SourceCloser};
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub type SpyBuffer = Arc<Mutex<Vec<u8>>>;

/// Destination that records everything written to it.
#[derive(Clone, Default)]
pub struct SpyWriter {
    pub buffer: SpyBuffer,
}

impl SpyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }
}

impl Write for SpyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Spy destination that sleeps before every write.
#[derive(Clone)]
pub struct SlowWriter {
    pub spy: SpyWriter,
    pub delay: Duration,
}

impl Write for SlowWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        thread::sleep(self.delay);
        self.spy.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Destination that never accepts a byte.
pub struct ShortWriter;

impl Write for ShortWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Ok(0)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Destination whose every write fails.
pub struct BrokenWriter;

impl Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "destination gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum Message {
    Data(Vec<u8>),
    Close,
}

/// Producer half of [`ChannelSource`].
#[derive(Clone)]
pub struct Feed {
    tx: Sender<Message>,
}

impl Feed {
    pub fn send(&self, bytes: &[u8]) {
        self.tx
            .send(Message::Data(bytes.to_vec()))
            .expect("source already finished");
    }
}

/// In-memory source fed through a channel; closing it ends the stream
/// after the chunks already sent.
pub struct ChannelSource {
    rx: Receiver<Message>,
    tx: Sender<Message>,
    pending: Vec<u8>,
}

impl ChannelSource {
    pub fn new() -> (Self, Feed) {
        let (tx, rx) = channel();
        let feed = Feed { tx: tx.clone() };
        (
            Self {
                rx,
                tx,
                pending: Vec::new(),
            },
            feed,
        )
    }
}

impl Read for ChannelSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(Message::Data(bytes)) => self.pending = bytes,
                Ok(Message::Close) | Err(_) => return Ok(0),
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Source for ChannelSource {
    fn closer(&self) -> io::Result<Box<dyn SourceCloser>> {
        let tx = self.tx.clone();
        Ok(Box::new(move || {
            let _ = tx.send(Message::Close);
            Ok(())
        }))
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Wait until the sink has buffered exactly `expected`.
pub fn wait_for_buffered(sink: &Sink, expected: &[u8]) -> bool {
    wait_until(|| sink.buffered().as_deref() == Some(expected))
}
