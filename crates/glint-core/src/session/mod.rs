//! # Debug Session
//!
//! The stateful surface the host debugger's command hooks drive. A
//! [`Session`] owns the capability backends (module index, debug-info
//! cache, unwinder, memory), the memoized stop context, the selected frame
//! index, and the breakpoint groups. Presentation operations each take the
//! raw register quad supplied by the host debugger's expression evaluator,
//! resolve a [`Context`], and return display text; a degraded context
//! yields empty output rather than an error.

pub mod commands;
mod context;

pub use context::Context;

use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::breakpoints::{BreakpointSet, ResolvedSection};
use crate::error::{GlintError, GlintResult};
use crate::modules::{DebugInfoCache, DebugInfoOpener, ModuleIndex};
use crate::resolver::FrameAccess;
use crate::table::registry::Registry;
use crate::table::{SourceFrame, VarValue};
use crate::types::RegisterSnapshot;
use crate::unwind::{FrameUnwinder, MemoryAccess};

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig
{
    /// Lines of context shown above and below the current line in listings.
    pub listing_radius: u32,
    /// Path of the command file the break commands write for the host
    /// debugger to source.
    pub command_file: PathBuf,
}

impl Default for SessionConfig
{
    fn default() -> Self
    {
        Self {
            listing_radius: 2,
            command_file: PathBuf::from(".glint.commands"),
        }
    }
}

/// One debugger-side session over the process-wide table registry.
pub struct Session
{
    registry: Arc<Registry>,
    modules: Box<dyn ModuleIndex>,
    debug_info: DebugInfoCache,
    unwinder: Box<dyn FrameUnwinder>,
    memory: Box<dyn MemoryAccess>,
    config: SessionConfig,
    last: Option<Context>,
    current_frame: usize,
    breakpoints: BreakpointSet,
}

impl Session
{
    /// Build a session over explicit backends (tests and embedders).
    pub fn new(
        registry: Arc<Registry>,
        modules: Box<dyn ModuleIndex>,
        opener: Box<dyn DebugInfoOpener>,
        unwinder: Box<dyn FrameUnwinder>,
        memory: Box<dyn MemoryAccess>,
        config: SessionConfig,
    ) -> Self
    {
        Self {
            registry,
            modules,
            debug_info: DebugInfoCache::new(opener),
            unwinder,
            memory,
            config,
            last: None,
            current_frame: 0,
            breakpoints: BreakpointSet::new(),
        }
    }

    /// Build a session over the live process: loader-backed module lookup,
    /// DWARF debug info, frame-pointer unwinding, direct memory reads.
    #[cfg(unix)]
    pub fn native(config: SessionConfig) -> Self
    {
        use crate::modules::{DwarfOpener, LoaderModuleIndex};
        use crate::unwind::{FramePointerUnwinder, InProcessMemory};

        Self::new(
            Registry::global(),
            Box::new(LoaderModuleIndex),
            Box::new(DwarfOpener),
            Box::new(FramePointerUnwinder),
            Box::new(InProcessMemory),
            config,
        )
    }

    /// The currently selected frame index.
    pub fn current_frame(&self) -> usize
    {
        self.current_frame
    }

    /// The session's tunables.
    pub fn config(&self) -> &SessionConfig
    {
        &self.config
    }

    /// The synthetic backtrace at the stop, innermost frame first.
    pub fn backtrace(&mut self, regs: RegisterSnapshot) -> String
    {
        let ctx = self.find_context(regs);
        let Some((entry, offset)) = ctx.matched() else {
            return String::new();
        };

        let table = entry.table();
        let mut out = String::new();
        for (index, frame) in table.frames_for_line(offset).iter().enumerate() {
            push_frame_line(&mut out, table, index, frame);
        }
        out
    }

    /// Source listing around the selected frame's line, `>` marking the
    /// line itself. An unreadable source file yields empty output.
    pub fn listing(&mut self, regs: RegisterSnapshot) -> String
    {
        let ctx = self.find_context(regs);
        let Some((entry, offset)) = ctx.matched() else {
            return String::new();
        };

        let table = entry.table();
        let Some(frame) = table.frames_for_line(offset).get(self.current_frame) else {
            return String::new();
        };

        let radius = self.config.listing_radius;
        let first = frame.line.saturating_sub(radius);
        let last = frame.line + radius;
        let Ok(text) = std::fs::read_to_string(table.string(frame.file)) else {
            return String::new();
        };

        let mut out = String::new();
        for (number, line) in (1u32..).zip(text.lines()) {
            if number < first {
                continue;
            }
            if number > last {
                break;
            }
            let marker = if number == frame.line { '>' } else { ' ' };
            let _ = writeln!(out, "{marker}{number}\t{line}");
        }
        out
    }

    /// Select a frame and/or show the selected frame.
    ///
    /// `update` may be empty (no change) or a frame index; an out-of-range
    /// index leaves the selection unchanged and prepends a warning. The
    /// output is the frame header plus that frame's single source line.
    pub fn frame(&mut self, regs: RegisterSnapshot, update: &str) -> String
    {
        let requested = update.trim().parse::<usize>().ok();

        let ctx = self.find_context(regs);
        let Some((entry, offset)) = ctx.matched() else {
            return String::new();
        };

        let table = entry.table();
        let frames = table.frames_for_line(offset);

        let mut out = String::new();
        if let Some(index) = requested {
            match self.select_frame(index, frames.len()) {
                Ok(()) => {}
                Err(err) => {
                    tracing::debug!("{err}");
                    let _ = writeln!(out, "Warning: frame index {index} is not valid. Frame not updated");
                }
            }
        }

        let Some(frame) = frames.get(self.current_frame) else {
            return out;
        };
        push_frame_line(&mut out, table, self.current_frame, frame);

        if let Ok(text) = std::fs::read_to_string(table.string(frame.file)) {
            if let Some(line) = text.lines().nth(frame.line.saturating_sub(1) as usize) {
                let _ = writeln!(out, "{}\t{line}", frame.line);
            }
        }
        out
    }

    fn select_frame(&mut self, index: usize, stack_size: usize) -> GlintResult<()>
    {
        if index >= stack_size {
            return Err(GlintError::InvalidFrameIndex { index, stack_size });
        }
        self.current_frame = index;
        Ok(())
    }

    /// List live variables at the current line, or show one by name.
    ///
    /// An empty `name` lists all names (1-based). A named lookup prints
    /// `name = value`, invoking the variable's resolver when the value is
    /// computed at debug time; an unknown name yields a message, not an
    /// error.
    pub fn vars(&mut self, regs: RegisterSnapshot, name: &str) -> String
    {
        let ctx = self.find_context(regs);
        let Some((entry, offset)) = ctx.matched() else {
            return String::new();
        };
        let entry = entry.clone();
        let table = entry.table();

        let mut out = String::new();
        if name.is_empty() {
            for (index, var) in table.vars_for_line(offset).iter().enumerate() {
                let _ = writeln!(out, "{}. {}", index + 1, table.string(var.name));
            }
            return out;
        }

        for var in table.vars_for_line(offset) {
            if table.string(var.name) != name {
                continue;
            }
            match var.value {
                VarValue::Literal(value) => {
                    let _ = writeln!(out, "{name} = {}", table.string(value));
                    return out;
                }
                VarValue::Resolver(slot) => {
                    let Some(handle) = entry.registration().resolver(slot.0) else {
                        break;
                    };
                    let Some(debug_info) = ctx.debug_info.as_deref() else {
                        break;
                    };
                    let frame = FrameAccess::new(&ctx, debug_info, self.unwinder.as_ref(), self.memory.as_ref());
                    let value = handle.resolve(name, &frame);
                    let _ = writeln!(out, "{name} = {value}");
                    return out;
                }
            }
        }

        tracing::debug!("{}", GlintError::VariableNotFound(name.to_string()));
        let _ = writeln!(out, "Variable {name} not found at current location");
        out
    }

    /// Print the runtime address of a named stack variable (`&name = ...`).
    ///
    /// Works from debug info alone, without a matched table; a failed
    /// lookup prints the null address the way the host debugger would.
    pub fn variable_address(&mut self, regs: RegisterSnapshot, name: &str) -> String
    {
        let ctx = self.find_context(regs);
        let address = match ctx.debug_info.as_deref() {
            Some(debug_info) => {
                let frame = FrameAccess::new(&ctx, debug_info, self.unwinder.as_ref(), self.memory.as_ref());
                frame.find_stack_var(name).unwrap_or_else(|err| {
                    tracing::debug!("variable address lookup failed: {err}");
                    crate::types::Address::ZERO
                })
            }
            None => crate::types::Address::ZERO,
        };
        format!("&{name} = {address}\n")
    }

    /// Set a breakpoint (or list existing groups when `spec` is empty),
    /// writing host-debugger directives to `sink`.
    pub fn set_break(&mut self, regs: RegisterSnapshot, spec: &str, sink: &mut dyn Write) -> String
    {
        let ctx = self.find_context(regs);
        let current_file = self.selected_frame_file(&ctx);
        let sections = self.resolved_sections();
        let sections: Vec<ResolvedSection<'_>> = sections
            .iter()
            .map(|(entry, identity)| ResolvedSection {
                table: entry.table(),
                file: &identity.file,
                start_line: identity.start_line,
            })
            .collect();
        self.breakpoints
            .set(&sections, current_file.as_deref(), spec, sink)
            .unwrap_or_else(|err| format!("{err}\n"))
    }

    /// Delete a breakpoint group by `#<id>`, writing `clear` directives to
    /// `sink`.
    pub fn delete_break(&mut self, _regs: RegisterSnapshot, spec: &str, sink: &mut dyn Write) -> String
    {
        self.breakpoints
            .delete(spec, sink)
            .unwrap_or_else(|err| format!("{err}\n"))
    }

    /// Full path of the selected frame's source file at the current line.
    fn selected_frame_file(&self, ctx: &Context) -> Option<String>
    {
        let (entry, offset) = ctx.matched()?;
        let table = entry.table();
        let frame = table.frames_for_line(offset).get(self.current_frame)?;
        Some(table.string(frame.file).to_string())
    }

    /// Every registered table whose anchor identity is already resolved.
    ///
    /// Tables that never resolved (their module has no usable debug info)
    /// are skipped, matching the fan-out's view of the world.
    fn resolved_sections(
        &self,
    ) -> Vec<(
        Arc<crate::table::registry::RegisteredTable>,
        crate::table::registry::TableIdentity,
    )>
    {
        self.registry
            .snapshot()
            .into_iter()
            .filter_map(|entry| {
                let identity = entry.identity()?.clone();
                Some((entry, identity))
            })
            .collect()
    }
}

/// `#<i> in <fn>[:<off>] at <basename>:<line>`
fn push_frame_line(out: &mut String, table: &crate::table::FunctionTable, index: usize, frame: &SourceFrame)
{
    let function = table.string(frame.function);
    let file = basename(table.string(frame.file));
    let _ = match frame.call_offset {
        Some(off) => writeln!(out, "#{index} in {function}:{off} at {file}:{}", frame.line),
        None => writeln!(out, "#{index} in {function} at {file}:{}", frame.line),
    };
}

fn basename(path: &str) -> &str
{
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_basename()
    {
        assert_eq!(basename("/a/b/c.cpp"), "c.cpp");
        assert_eq!(basename("c.cpp"), "c.cpp");
        assert_eq!(basename(""), "");
    }

    #[test]
    fn test_default_config()
    {
        let config = SessionConfig::default();
        assert_eq!(config.listing_radius, 2);
        assert_eq!(config.command_file, PathBuf::from(".glint.commands"));
    }
}
