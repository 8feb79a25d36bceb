//! Diagnostic shell shared by host tooling.
//!
//! The grammar and the executor live in-core so every host target parses and
//! dispatches shell lines the same way; the transport (stdin, UART, a socket)
//! is the host's business.

pub mod commands;
pub mod grammar;

pub use commands::{QueuedAck, ShellError, ShellOutcome, StatusReport, execute};
pub use grammar::{HwModePattern, ShellCommand, ShellParseError, parse};
