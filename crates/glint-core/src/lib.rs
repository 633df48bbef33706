//! # glint-core
//!
//! Debug tables and the runtime resolver for debugging generated code as
//! its original source.
//!
//! A code generator emits low-level code whose lines mean nothing to a
//! debugger; this crate gives them meaning back. At generation time the
//! [`builder`] records, per emitted line, a synthetic stack of original
//! source frames and a snapshot of live variables, and serializes the
//! whole thing into a per-function debug table embedded in the compiled
//! module. At debug time a [`session::Session`] runs inside the host
//! debugger's command hooks, matches the stopped instruction pointer back
//! to a table, and presents backtraces, listings, variables, and
//! breakpoints in terms of the original source.
//!
//! ## Why unsafe code is needed
//!
//! The runtime half runs in-process with the debuggee: resolving which
//! loaded module owns an instruction pointer (`dladdr`) and reading
//! variable slots off the live stack are raw-pointer operations. Both are
//! confined to small wrappers in [`modules`] and [`unwind`]; everything
//! above them is safe.

#![allow(unsafe_code)] // Required for dladdr and in-process stack reads

pub mod breakpoints;
pub mod builder;
pub mod dwarf;
pub mod error;
pub mod modules;
pub mod resolver;
pub mod session;
pub mod table;
pub mod types;
pub mod unwind;

pub use builder::SectionBuilder;
// Re-export commonly used types
pub use error::{GlintError, GlintResult};
pub use resolver::{FrameAccess, ResolverHandle, ValueResolver};
pub use session::{Session, SessionConfig};
pub use table::registry::Registry;
pub use table::FunctionTable;
pub use types::{Address, RegisterSnapshot};
