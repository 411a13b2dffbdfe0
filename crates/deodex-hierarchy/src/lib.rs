//! The class-record graph and the hierarchy resolution algorithms.
//!
//! A [`ClassUniverse`] is an arena of immutable class records linked once
//! at startup from the boot class path plus the target container. Records
//! live for the process lifetime; the only post-link growth is memoized
//! array-class synthesis (`[Lfoo;` the second time is the same
//! [`ClassId`] as the first). Nothing is ever evicted, so a session that
//! touches many distinct array types holds them all until exit.
//!
//! On top of the arena sit the pure resolution algorithms: class depth,
//! the lock-step ancestor walk, covariant array merging, and
//! [`common_superclass`], the entry point verification-oriented tooling
//! cares about.

#![forbid(unsafe_code)]

mod builder;
mod classpath;
mod error;
mod intrinsics;
mod resolver;
mod universe;

pub use crate::builder::UniverseBuilder;
pub use crate::classpath::{load_universe, parse_bootclasspath};
pub use crate::error::{HierarchyError, Result};
pub use crate::intrinsics::{Intrinsic, IntrinsicTable};
pub use crate::resolver::{common_superclass, depth_of};
pub use crate::universe::{
    ClassId, ClassRecord, ClassUniverse, Field, Method, MethodKind, MethodLookup, ROOT_DESCRIPTOR,
};
