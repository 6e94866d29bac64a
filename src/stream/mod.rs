//! Byte-stream plumbing underneath a sink: handle interception, the
//! interruptible pipe reader and the tee onto the original handle.

pub mod intercept;
pub mod pipe;
pub mod source;
pub mod tee;

pub use intercept::{intercept, FdSlot, Interception, OutputSlot};
pub use pipe::PipeReader;
pub use source::{Source, SourceCloser};
pub use tee::{TeeError, TeeReader};
