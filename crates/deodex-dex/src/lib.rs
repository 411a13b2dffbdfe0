//! Reader for Dalvik executable containers.
//!
//! Parses the metadata tables of a `dex` file (strings, type descriptors,
//! prototypes, fields, methods, class definitions) into owned [`ClassStub`]
//! records, and unwraps the `dey` header of an optimized (`odex`) container
//! to reach the embedded dex payload.
//!
//! Method bodies are never decoded: the optimized opcodes an odex carries
//! are irrelevant to structural queries, so only the id tables and
//! `class_data` member lists are read.

#![forbid(unsafe_code)]

mod container;
mod dex;
mod error;
mod mutf8;
mod reader;

/// Dex assembler used by this crate's tests and, behind the
/// `test-fixture` feature, by downstream integration tests.
#[cfg(any(test, feature = "test-fixture"))]
pub mod test_fixture;

pub use crate::container::dex_payload;
pub use crate::dex::{ClassStub, DexFile, FieldStub, MethodStub};
pub use crate::error::{DexError, Result};

/// Marks a class definition as an interface (`ACC_INTERFACE`).
pub const ACC_INTERFACE: u32 = 0x0200;
/// Marks a method as static (`ACC_STATIC`).
pub const ACC_STATIC: u32 = 0x0008;
