//! Breakpoint mapping from original-source positions to generated lines.
//!
//! The user names a position in the *original* source; every generated
//! line whose innermost synthetic frame sits on that position gets a real
//! breakpoint. One user request therefore fans out to a group of
//! host-debugger directives, tracked append-only so the insertion index is
//! the externally visible id.

use std::io::Write;

use crate::error::{GlintError, GlintResult};
use crate::table::FunctionTable;

/// Lifecycle of a breakpoint group.
///
/// `Disabled` is representable and displayed but no mutator sets it yet;
/// toggling would need the host debugger's own disable directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakStatus
{
    /// Directives emitted, group live.
    Enabled,
    /// Reserved for a future toggle.
    Disabled,
    /// `clear` directives emitted; id stays burned.
    Deleted,
}

/// One user request and the generated addresses it fanned out to.
#[derive(Debug, Clone)]
pub struct BreakGroup
{
    /// The original-source file the user named.
    pub spec_file: String,
    /// The original-source line the user named.
    pub spec_line: u32,
    /// Generated positions the request mapped to, as `(file, line)`.
    pub addresses: Vec<(String, u32)>,
    /// Current lifecycle state.
    pub status: BreakStatus,
}

/// A registered table whose section identity has been resolved.
pub struct ResolvedSection<'a>
{
    /// The debug table.
    pub table: &'a FunctionTable,
    /// Generated-source file the section lives in.
    pub file: &'a str,
    /// Generated-source line of the section's anchor.
    pub start_line: u32,
}

/// Parsed form of a `set` argument.
#[derive(Debug, PartialEq, Eq)]
enum BreakSpec
{
    /// Empty spec: list existing groups.
    List,
    /// Bare line; the file comes from the selected frame.
    Line(u32),
    /// Explicit `<file>:<line>`.
    FileLine(String, u32),
}

fn parse_spec(spec: &str) -> GlintResult<BreakSpec>
{
    let spec = spec.trim();
    if spec.is_empty() {
        return Ok(BreakSpec::List);
    }
    if let Some((file, line)) = spec.split_once(':') {
        if let (false, Ok(line)) = (file.is_empty(), line.parse::<u32>()) {
            return Ok(BreakSpec::FileLine(file.to_string(), line));
        }
    } else if let Ok(line) = spec.parse::<u32>() {
        return Ok(BreakSpec::Line(line));
    }
    Err(GlintError::MalformedBreakSpec(spec.to_string()))
}

/// Absolute spec paths must match exactly; relative ones match any path
/// ending with them.
fn paths_match(spec_path: &str, path: &str) -> bool
{
    if spec_path.starts_with('/') {
        spec_path == path
    } else {
        path.ends_with(spec_path)
    }
}

/// Append-only list of breakpoint groups; the index is the public id.
#[derive(Debug, Default)]
pub struct BreakpointSet
{
    groups: Vec<BreakGroup>,
}

impl BreakpointSet
{
    /// An empty set.
    pub fn new() -> Self
    {
        Self::default()
    }

    /// All groups in insertion order, deleted ones included.
    pub fn groups(&self) -> &[BreakGroup]
    {
        &self.groups
    }

    /// Handle a `set` request.
    ///
    /// An empty `spec` lists all non-deleted groups. Otherwise the spec is
    /// matched against the innermost frame of every generated line of every
    /// resolved section; `break` directives for all matches go to `sink`
    /// and a new enabled group is appended. Zero matches still append a
    /// group, mirroring what the directives did.
    pub fn set(
        &mut self,
        sections: &[ResolvedSection<'_>],
        current_file: Option<&str>,
        spec: &str,
        sink: &mut dyn Write,
    ) -> GlintResult<String>
    {
        let (file, line) = match parse_spec(spec)? {
            BreakSpec::List => return Ok(self.render_list()),
            BreakSpec::FileLine(file, line) => (file, line),
            BreakSpec::Line(line) => {
                let Some(file) = current_file else {
                    return Ok("Cannot identify stack information for current location, aborting!\n".to_string());
                };
                (file.to_string(), line)
            }
        };

        let addresses = find_all_breaks(sections, &file, line);
        for (break_file, break_line) in &addresses {
            writeln!(sink, "break {break_file}:{break_line}")?;
        }

        let id = self.groups.len();
        let message = format!("Inserting {} breakpoints with ID: #{id}\n", addresses.len());
        self.groups.push(BreakGroup {
            spec_file: file,
            spec_line: line,
            addresses,
            status: BreakStatus::Enabled,
        });
        Ok(message)
    }

    /// Handle a `delete` request (`#<id>`), emitting `clear` directives for
    /// every address in the group and marking it deleted.
    pub fn delete(&mut self, spec: &str, sink: &mut dyn Write) -> GlintResult<String>
    {
        let id = spec
            .trim()
            .strip_prefix('#')
            .and_then(|rest| rest.parse::<usize>().ok());
        let Some(id) = id else {
            return Ok(
                "Command requires a breakpoint id (#<id>). Run break without any parameters to list all breakpoints\n"
                    .to_string(),
            );
        };

        let group = match self.groups.get_mut(id) {
            Some(group) if group.status != BreakStatus::Deleted => group,
            _ => return Err(GlintError::InvalidBreakpointId(id)),
        };

        for (file, line) in &group.addresses {
            writeln!(sink, "clear {file}:{line}")?;
        }
        let message = format!("Deleting {} breakpoints for ID: #{id}\n", group.addresses.len());
        group.status = BreakStatus::Deleted;
        Ok(message)
    }

    fn render_list(&self) -> String
    {
        use std::fmt::Write as _;

        let mut out = String::from("Following breakpoints exist:\n");
        for (id, group) in self.groups.iter().enumerate() {
            let status = match group.status {
                BreakStatus::Enabled => "ENABLED",
                BreakStatus::Disabled => "DISABLED",
                BreakStatus::Deleted => continue,
            };
            let _ = writeln!(out, "#{id} [{status}] {}:{}", group.spec_file, group.spec_line);
        }
        out
    }
}

/// Fan a `(file, line)` spec out to generated positions.
///
/// Only frame 0 of each line's stack is inspected: a breakpoint on an
/// outer-frame line would fire on every generated line it expands to,
/// which is never what the user meant.
fn find_all_breaks(sections: &[ResolvedSection<'_>], spec_file: &str, spec_line: u32) -> Vec<(String, u32)>
{
    let mut found = Vec::new();
    for section in sections {
        for line_no in 0..section.table.line_count() {
            let Some(innermost) = section.table.frames_for_line(line_no).first() else {
                continue;
            };
            if innermost.line == spec_line && paths_match(spec_file, section.table.string(innermost.file)) {
                found.push((section.file.to_string(), section.start_line + line_no as u32));
            }
        }
    }
    found
}
