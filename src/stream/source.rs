use std::io::{self, Read};

/// Shuts a [`Source`] down from a thread other than the one reading it.
///
/// Closing must wake a reader that is blocked inside `read`, which then
/// reports end-of-stream.
pub trait SourceCloser: Send {
    fn close(self: Box<Self>) -> io::Result<()>;
}

impl<F> SourceCloser for F
where
    F: FnOnce() -> io::Result<()> + Send,
{
    fn close(self: Box<Self>) -> io::Result<()> {
        (*self)()
    }
}

/// A byte stream that a sink can drain on a background thread and
/// interrupt later through its closer.
pub trait Source: Read + Send + 'static {
    fn closer(&self) -> io::Result<Box<dyn SourceCloser>>;
}
