//! Hold a process's output in memory until its log file exists.
//!
//! [`stream::intercept`] swaps an output handle for a pipe, a
//! [`stream::TeeReader`] mirrors the pipe back onto the original handle, and a
//! [`sink::Sink`] buffers the bytes until [`sink::Sink::attach`] hands them to
//! a real destination. [`capture::StdCapture`] wires this up for the
//! process's own stdout and stderr.

#[cfg(not(unix))]
compile_error!("latelog only supports unix platforms");

pub mod capture;
pub mod cli;
pub mod config;
pub mod logging;
pub mod sink;
pub mod stream;
