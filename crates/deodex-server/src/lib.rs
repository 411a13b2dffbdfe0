//! Line-oriented query protocol over the class hierarchy.
//!
//! One client, one connection, one command in flight: the serve loop
//! reads a newline-terminated command, answers it completely (flushing
//! before the next read), and repeats until the input stream ends. Any
//! per-command failure is a single `err:` line; the connection stays
//! open and the loop keeps going.
//!
//! The wire format is plain text keyed by the tokens `field:`, `inline:`,
//! `vtable:`, `class:`, `done` and `err:` — no versioning, no framing
//! beyond newlines.

#![forbid(unsafe_code)]

mod command;
mod session;
mod tcp;

pub use crate::session::serve;
pub use crate::tcp::serve_connection;
