//! Swap a live output handle for the write end of a pipe.

use std::fs::File;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use crate::stream::pipe::{pipe, PipeReader};

/// A place holding a writable handle that can be replaced in one step.
pub trait OutputSlot {
    /// Install `replacement` in the slot and return the handle it held.
    ///
    /// On error the slot must be left as it was.
    fn swap(&mut self, replacement: OwnedFd) -> io::Result<File>;
}

impl OutputSlot for File {
    fn swap(&mut self, replacement: OwnedFd) -> io::Result<File> {
        Ok(mem::replace(self, File::from(replacement)))
    }
}

/// A fixed descriptor number, such as the process's stdout.
///
/// Swapping keeps the number and changes what it refers to, so every
/// writer in the process (and every child spawned afterwards) follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdSlot {
    fd: RawFd,
}

impl FdSlot {
    /// The descriptor must stay open for as long as the slot is used.
    pub fn new(fd: RawFd) -> Self {
        Self { fd }
    }

    pub fn stdout() -> Self {
        Self::new(libc::STDOUT_FILENO)
    }

    pub fn stderr() -> Self {
        Self::new(libc::STDERR_FILENO)
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Point the descriptor back at `original`.
    ///
    /// Drops the slot's reference to the pipe, so the reader sees EOF once
    /// no other process holds the write end.
    pub fn restore(&mut self, original: &File) -> io::Result<()> {
        dup2(original.as_raw_fd(), self.fd)
    }
}

impl OutputSlot for FdSlot {
    fn swap(&mut self, replacement: OwnedFd) -> io::Result<File> {
        let saved = unsafe { libc::fcntl(self.fd, libc::F_DUPFD_CLOEXEC, 0) };
        if saved < 0 {
            return Err(io::Error::last_os_error());
        }
        let original = unsafe { File::from_raw_fd(saved) };
        dup2(replacement.as_raw_fd(), self.fd)?;
        Ok(original)
    }
}

fn dup2(src: RawFd, dst: RawFd) -> io::Result<()> {
    loop {
        if unsafe { libc::dup2(src, dst) } >= 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Result of [`intercept`]: everything written to the slot from now on can
/// be read from `reader`, and `original` is where it used to go.
pub struct Interception {
    pub reader: PipeReader,
    pub original: File,
}

impl Interception {
    pub fn into_parts(self) -> (PipeReader, File) {
        (self.reader, self.original)
    }
}

/// Replace the handle in `slot` with a pipe.
///
/// The pipe and its reader are fully built before the slot is touched, so
/// a failure leaves the slot unchanged.
pub fn intercept<S>(slot: &mut S) -> io::Result<Interception>
where
    S: OutputSlot + ?Sized,
{
    let (read, write) = pipe()?;
    let reader = PipeReader::new(read)?;
    let original = slot.swap(write)?;
    Ok(Interception { reader, original })
}
