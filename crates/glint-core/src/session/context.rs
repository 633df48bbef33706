//! Stop context resolution.
//!
//! A [`Context`] is everything the presentation layer needs about one
//! debugger stop: the captured registers, the owning module, the resolved
//! source position, and the matched debug table (if any). Resolution is
//! memoized by `(ip, sp)`, modeling "still stopped at the same logical
//! point"; any change resets the selected frame back to 0.

use std::sync::Arc;

use crate::dwarf::DebugInfo;
use crate::error::{GlintError, GlintResult};
use crate::modules::ModuleInfo;
use crate::table::registry::RegisteredTable;
use crate::types::RegisterSnapshot;

use super::Session;

/// Resolved state for one debugger stop.
///
/// Every field past the registers is optional: resolution degrades in
/// stages, and a context that got nowhere still carries the registers it
/// was built from so the memo key stays valid.
#[derive(Clone)]
pub struct Context
{
    /// Registers captured at the stop.
    pub regs: RegisterSnapshot,
    /// Module owning the instruction pointer.
    pub module: Option<ModuleInfo>,
    /// Parsed debug info for that module.
    pub debug_info: Option<Arc<dyn DebugInfo>>,
    /// Source file the instruction pointer resolved to.
    pub source_file: Option<String>,
    /// Source line the instruction pointer resolved to.
    pub address_line: Option<u32>,
    /// The matched debug table, when one covers the resolved line.
    pub table: Option<Arc<RegisteredTable>>,
    /// Start line of the matched table's section.
    pub function_line: Option<u32>,
}

impl Context
{
    /// A context that resolved nothing beyond the registers.
    pub fn degraded(regs: RegisterSnapshot) -> Self
    {
        Self {
            regs,
            module: None,
            debug_info: None,
            source_file: None,
            address_line: None,
            table: None,
            function_line: None,
        }
    }

    /// The matched table and the generated-line offset within its section,
    /// or `None` for a degraded context.
    pub fn matched(&self) -> Option<(&Arc<RegisteredTable>, usize)>
    {
        let table = self.table.as_ref()?;
        let offset = self.line_offset()?;
        Some((table, offset))
    }

    /// `address_line - function_line`, the index into the table's per-line
    /// arrays.
    pub fn line_offset(&self) -> Option<usize>
    {
        let address = self.address_line?;
        let start = self.function_line?;
        address.checked_sub(start).map(|off| off as usize)
    }
}

impl Session
{
    /// Resolve the context for a stop, memoized by `(ip, sp)`.
    ///
    /// A hit returns the cached context untouched; a miss resets the
    /// selected frame to 0 and re-resolves from scratch. Resolution
    /// failures degrade to a context with no table, which every
    /// presentation operation treats as nothing-to-show.
    pub fn find_context(&mut self, regs: RegisterSnapshot) -> Context
    {
        if let Some(last) = &self.last {
            if last.regs.stop_key() == regs.stop_key() {
                return last.clone();
            }
        }
        self.current_frame = 0;

        let ctx = match self.resolve_context(regs) {
            Ok(ctx) => ctx,
            Err(err) => {
                tracing::debug!("context resolution degraded: {err}");
                Context::degraded(regs)
            }
        };
        self.last = Some(ctx.clone());
        ctx
    }

    fn resolve_context(&mut self, regs: RegisterSnapshot) -> GlintResult<Context>
    {
        let module = self.modules.resolve(regs.ip)?;
        let debug_info = self.debug_info.debug_info_for(&module.path)?;
        let relative = regs
            .ip
            .checked_sub(module.load_base.value())
            .ok_or(GlintError::ModuleNotFound(regs.ip.value()))?;
        let position = debug_info.line_for(relative)?;

        let mut ctx = Context::degraded(regs);
        ctx.source_file = Some(position.file.clone());
        ctx.address_line = Some(position.line);

        // First match wins, in registration order. Each entry's anchor is
        // resolved to (file, start line) at most once for the process.
        for entry in self.registry.snapshot() {
            let identity = entry.identity_or_resolve(|| {
                let anchor = entry.table().anchor;
                let anchor_relative = anchor
                    .checked_sub(module.load_base.value())
                    .ok_or(GlintError::LineNotFound(anchor.value()))?;
                let resolved = debug_info.line_for(anchor_relative)?;
                Ok(crate::table::registry::TableIdentity {
                    file: resolved.file,
                    start_line: resolved.line,
                })
            });
            let Some(identity) = identity else {
                continue;
            };

            let line_count = entry.table().line_count() as u32;
            if identity.file == position.file
                && identity.start_line <= position.line
                && position.line < identity.start_line + line_count
            {
                ctx.function_line = Some(identity.start_line);
                ctx.table = Some(entry);
                break;
            }
        }

        if ctx.table.is_none() {
            tracing::debug!(
                "{}",
                GlintError::NoMatchingTable {
                    file: position.file,
                    line: position.line,
                }
            );
        }

        ctx.module = Some(module);
        ctx.debug_info = Some(debug_info);
        Ok(ctx)
    }
}
