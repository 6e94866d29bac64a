//! Anonymous pipes whose read end can be shut down from another thread.
//!
//! A plain `close()` on a descriptor does not wake a thread blocked in
//! `read()` on Linux, so the reader polls the pipe together with a private
//! wake pipe. The closer counts the bytes queued in the pipe at the moment
//! of the close; the reader serves exactly those and then reports EOF.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::stream::source::{Source, SourceCloser};

/// Create an anonymous pipe, returning `(read, write)` ends.
///
/// Both ends are close-on-exec; `dup2` into a standard descriptor clears the
/// flag on the copy, so children still inherit redirected stdio.
pub fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    let read = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let write = unsafe { OwnedFd::from_raw_fd(fds[1]) };
    set_cloexec(read.as_raw_fd())?;
    set_cloexec(write.as_raw_fd())?;
    Ok((read, write))
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Number of bytes currently queued in a pipe.
fn queued_bytes(fd: RawFd) -> io::Result<usize> {
    let mut queued: libc::c_int = 0;
    if unsafe { libc::ioctl(fd, libc::FIONREAD, &mut queued as *mut libc::c_int) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(queued.max(0) as usize)
}

/// State shared between a [`PipeReader`] and its closer.
struct Shared {
    file: File,
    /// Bytes left in the pipe when the close was requested; `None` while open.
    /// Held across every read so the count never includes bytes already taken.
    limit: Mutex<Option<usize>>,
    wake_rx: OwnedFd,
    wake_tx: OwnedFd,
}

impl Shared {
    fn request_close(&self) -> io::Result<()> {
        {
            let mut limit = self.limit.lock();
            if limit.is_some() {
                return Ok(());
            }
            *limit = Some(queued_bytes(self.file.as_raw_fd())?);
        }

        let byte = 1u8;
        loop {
            let ret = unsafe {
                libc::write(
                    self.wake_tx.as_raw_fd(),
                    &byte as *const u8 as *const libc::c_void,
                    1,
                )
            };
            if ret >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

/// Read end of a pipe that can be shut down through [`Source::closer`].
pub struct PipeReader {
    shared: Arc<Shared>,
    /// Bytes still to serve after a close request; `None` while open.
    draining: Option<usize>,
}

impl PipeReader {
    pub fn new(fd: OwnedFd) -> io::Result<Self> {
        let (wake_rx, wake_tx) = pipe()?;
        Ok(Self {
            shared: Arc::new(Shared {
                file: File::from(fd),
                limit: Mutex::new(None),
                wake_rx,
                wake_tx,
            }),
            draining: None,
        })
    }

    /// Block until the pipe is readable or a close was requested.
    ///
    /// Returns `true` when the pipe side is ready.
    fn wait(&self) -> io::Result<bool> {
        let mut fds = [
            libc::pollfd {
                fd: self.shared.file.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.shared.wake_rx.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        loop {
            let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if fds[1].revents != 0 {
                return Ok(false);
            }
            if fds[0].revents != 0 {
                return Ok(true);
            }
        }
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if let Some(remaining) = self.draining {
                if remaining == 0 {
                    return Ok(0);
                }
                let limit = remaining.min(buf.len());
                let n = (&self.shared.file).read(&mut buf[..limit])?;
                self.draining = Some(if n == 0 { 0 } else { remaining - n });
                return Ok(n);
            }

            let readable = self.wait()?;
            let limit = self.shared.limit.lock();
            match *limit {
                Some(queued) => self.draining = Some(queued),
                // Only this reader consumes the pipe, so a readable pipe
                // does not block here.
                None if readable => return (&self.shared.file).read(buf),
                None => {}
            }
        }
    }
}

impl AsRawFd for PipeReader {
    fn as_raw_fd(&self) -> RawFd {
        self.shared.file.as_raw_fd()
    }
}

impl Source for PipeReader {
    fn closer(&self) -> io::Result<Box<dyn SourceCloser>> {
        let shared = Arc::downgrade(&self.shared);
        Ok(Box::new(move || match shared.upgrade() {
            Some(shared) => shared.request_close(),
            // Reader already gone.
            None => Ok(()),
        }))
    }
}
