//! # Debug Table Format
//!
//! The per-function record mapping generated code lines back to original
//! source frames and variable bindings. Tables are produced once by the
//! [`builder`](crate::builder) at code-generation time, serialized via
//! [`wire`], and consumed immutably by the runtime resolver.
//!
//! Layout mirrors the serialized form: two parallel span tables indexed by
//! generated line number (`line_frames`, `var_lines`), two flattened lists
//! they point into (`frame_list`, `var_list`), and a deduplicated string
//! pool that every name/value field references by id.

pub mod registry;
pub mod wire;

use std::fmt;

use crate::types::Address;

/// Index into a table's [`StringPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrId(pub u32);

/// Index into a registration's resolver slot list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolverId(pub u32);

/// An `(offset, len)` window into one of the flattened per-line lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span
{
    /// First element of the window in the flattened list.
    pub offset: u32,
    /// Number of elements in the window.
    pub len: u32,
}

/// One synthetic frame attached to a generated line.
///
/// Frame 0 of a line's stack is always the innermost original-source
/// location; higher indices walk outward through nested generator
/// invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFrame
{
    /// Original source file (string id).
    pub file: StrId,
    /// Original source line.
    pub line: u32,
    /// Enclosing function name in the original source (string id).
    pub function: StrId,
    /// Offset annotation within the enclosing function; `None` marks the
    /// innermost frame (wire sentinel −1).
    pub call_offset: Option<u32>,
}

/// How a variable's display value is obtained at debug time.
///
/// The original design stored a raw function pointer as an integer next to a
/// −1 value sentinel; here the dispatch is a type-checked variant and the
/// sentinel survives only on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarValue
{
    /// Value captured literally at build time (string id).
    Literal(StrId),
    /// Value computed at debug time by the resolver in this slot.
    Resolver(ResolverId),
}

/// One live-variable binding at a generated line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarEntry
{
    /// Variable name (string id).
    pub name: StrId,
    /// Literal value or resolver reference.
    pub value: VarValue,
}

/// Deduplicated string pool; all table string references index into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringPool
{
    entries: Vec<String>,
}

impl StringPool
{
    /// Build a pool from already-deduplicated entries.
    pub fn from_entries(entries: Vec<String>) -> Self
    {
        Self { entries }
    }

    /// Look up a string by id. Ids come from a validated table, so a miss is
    /// a logic error; callers get an empty string rather than a panic.
    pub fn get(&self, id: StrId) -> &str
    {
        self.entries.get(id.0 as usize).map(String::as_str).unwrap_or("")
    }

    /// Whether `id` is inside the pool.
    pub fn contains(&self, id: StrId) -> bool
    {
        (id.0 as usize) < self.entries.len()
    }

    /// Number of entries in the pool.
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Raw entries, in id order.
    pub fn entries(&self) -> &[String]
    {
        &self.entries
    }
}

/// The immutable per-function debug table.
///
/// The resolve-once identity scratch (`identified_filename` /
/// `identified_line` in the original layout) deliberately does *not* live
/// here; the registry pairs each table with a separate once-cell so the
/// record itself stays immutable. See [`registry::RegisteredTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionTable
{
    /// Address of the anchor symbol marking the section start; the matching key.
    pub anchor: Address,
    /// Per-line window into `frame_list`; `len()` is the line count.
    pub line_frames: Vec<Span>,
    /// Flattened synthetic frames.
    pub frame_list: Vec<SourceFrame>,
    /// Per-line window into `var_list`; always `line_frames.len()` long.
    pub var_lines: Vec<Span>,
    /// Flattened variable bindings.
    pub var_list: Vec<VarEntry>,
    /// String pool backing every `StrId` above.
    pub strings: StringPool,
}

impl FunctionTable
{
    /// Number of generated-code lines this table covers.
    pub fn line_count(&self) -> usize
    {
        self.line_frames.len()
    }

    /// The synthetic frame stack for a generated line offset, innermost first.
    ///
    /// Returns an empty slice for out-of-range offsets.
    pub fn frames_for_line(&self, line_offset: usize) -> &[SourceFrame]
    {
        self.line_frames
            .get(line_offset)
            .map(|span| slice_span(&self.frame_list, span))
            .unwrap_or(&[])
    }

    /// The live variables snapshotted at a generated line offset.
    pub fn vars_for_line(&self, line_offset: usize) -> &[VarEntry]
    {
        self.var_lines
            .get(line_offset)
            .map(|span| slice_span(&self.var_list, span))
            .unwrap_or(&[])
    }

    /// Resolve a string id against this table's pool.
    pub fn string(&self, id: StrId) -> &str
    {
        self.strings.get(id)
    }
}

impl fmt::Display for SourceFrame
{
    /// Debug-friendly rendering; the presentation layer formats frames
    /// itself because it needs the string pool.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.call_offset {
            Some(off) => write!(f, "frame(file#{} line {} fn#{}:{off})", self.file.0, self.line, self.function.0),
            None => write!(f, "frame(file#{} line {} fn#{})", self.file.0, self.line, self.function.0),
        }
    }
}

fn slice_span<'a, T>(list: &'a [T], span: &Span) -> &'a [T]
{
    let start = span.offset as usize;
    let end = start.saturating_add(span.len as usize);
    list.get(start..end).unwrap_or(&[])
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn sample_table() -> FunctionTable
    {
        FunctionTable {
            anchor: Address::from(0x4000),
            line_frames: vec![Span { offset: 0, len: 1 }, Span { offset: 1, len: 2 }],
            frame_list: vec![
                SourceFrame {
                    file: StrId(0),
                    line: 1,
                    function: StrId(1),
                    call_offset: None,
                },
                SourceFrame {
                    file: StrId(0),
                    line: 3,
                    function: StrId(1),
                    call_offset: None,
                },
                SourceFrame {
                    file: StrId(0),
                    line: 9,
                    function: StrId(2),
                    call_offset: Some(4),
                },
            ],
            var_lines: vec![Span::default(), Span { offset: 0, len: 1 }],
            var_list: vec![VarEntry {
                name: StrId(3),
                value: VarValue::Literal(StrId(4)),
            }],
            strings: StringPool::from_entries(vec![
                "s.c".into(),
                "main".into(),
                "helper".into(),
                "x".into(),
                "42".into(),
            ]),
        }
    }

    #[test]
    fn test_frames_for_line()
    {
        let table = sample_table();
        assert_eq!(table.frames_for_line(0).len(), 1);
        assert_eq!(table.frames_for_line(1).len(), 2);
        assert_eq!(table.frames_for_line(1)[1].call_offset, Some(4));
        assert!(table.frames_for_line(7).is_empty());
    }

    #[test]
    fn test_vars_for_line()
    {
        let table = sample_table();
        assert!(table.vars_for_line(0).is_empty());
        let vars = table.vars_for_line(1);
        assert_eq!(vars.len(), 1);
        assert_eq!(table.string(vars[0].name), "x");
    }

    #[test]
    fn test_string_pool_miss_is_empty()
    {
        let table = sample_table();
        assert_eq!(table.string(StrId(99)), "");
    }
}
