//! # Error Types
//!
//! General error handling for the generated-code debug runtime.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Everything in this taxonomy is a *local, recoverable* condition: the
//! command surface degrades to an informative text message instead of
//! aborting the host debugger session.

use thiserror::Error;

/// Main error type for debug-table and resolver operations
///
/// ## Error Categories
///
/// 1. **Address resolution**: ModuleNotFound, DebugInfoUnavailable, LineNotFound
/// 2. **Table matching**: NoMatchingTable
/// 3. **Variable lookup**: VariableNotFound, InvalidLocationExpression
/// 4. **User input**: InvalidFrameIndex, InvalidBreakpointId, MalformedBreakSpec
/// 5. **Builder misuse**: InvalidState
/// 6. **Wire format**: MalformedTable
/// 7. **I/O**: Io (command files, source listings)
#[derive(Error, Debug)]
pub enum GlintError
{
    /// The instruction pointer is not mapped into any loaded module
    ///
    /// Address resolution stops here; the resulting `Context` carries no
    /// table and every presentation operation on it returns empty output.
    #[error("Address 0x{0:016x} is not in any loaded module")]
    ModuleNotFound(u64),

    /// The module was found but its debug information cannot be opened or parsed
    #[error("No usable debug info for module {path}: {details}")]
    DebugInfoUnavailable
    {
        /// Path of the module whose debug info failed to open.
        path: String,
        /// What went wrong while opening or parsing.
        details: String,
    },

    /// The address resolves to a module with debug info, but no line-table row covers it
    #[error("No line-table row covers module-relative address 0x{0:016x}")]
    LineNotFound(u64),

    /// The address resolved to a source line but no registered debug table covers it
    #[error("No registered debug table covers {file}:{line}")]
    NoMatchingTable
    {
        /// Resolved source file of the address.
        file: String,
        /// Resolved source line of the address.
        line: u32,
    },

    /// Named variable lookup failed at the current location
    #[error("Variable {0} not found at current location")]
    VariableNotFound(String),

    /// A variable's DWARF location description has an unsupported shape
    ///
    /// Only two shapes are decoded: a single frame-base-relative offset, or
    /// that offset followed by a dereference. Anything else fails loudly
    /// rather than silently producing a wrong address.
    #[error("Unsupported location expression for variable {0}")]
    InvalidLocationExpression(String),

    /// Frame index outside `[0, stack_size)` for the current line
    #[error("Frame index {index} is not valid (stack has {stack_size} frames)")]
    InvalidFrameIndex
    {
        /// The index the user asked for.
        index: usize,
        /// Number of frames in the current line's synthetic stack.
        stack_size: usize,
    },

    /// Breakpoint id out of range or already deleted
    #[error("#{0} is not a valid breakpoint id")]
    InvalidBreakpointId(usize),

    /// Break spec did not parse as `[<file>:]<line>`
    #[error("Break spec must be of the form [<filename>:]<linenumber>, got {0:?}")]
    MalformedBreakSpec(String),

    /// A builder mutator was called with no open section
    #[error("Invalid builder state: {0}")]
    InvalidState(&'static str),

    /// A serialized debug table failed validation while decoding
    #[error("Malformed debug table: {0}")]
    MalformedTable(String),

    /// I/O error (command files, source listings, module bytes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, GlintError>`
pub type GlintResult<T> = std::result::Result<T, GlintError>;
