//! DWARF debug-information access.
//!
//! [`DebugInfo`] is the capability the resolver consumes: tightest-enclosing
//! line lookup for an address, and live-variable address computation from
//! DIE trees. [`DwarfInfo`] is the production implementation over
//! `object`/`gimli`/`addr2line`; tests substitute canned implementations.
//!
//! Only ELF objects with DWARF are supported; that is the binary format the
//! code generator targets.

mod variables;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use gimli::{Dwarf, EndianArcSlice, RunTimeEndian, SectionId};
use object::{Object, ObjectSection};

use crate::error::{GlintError, GlintResult};
use crate::types::Address;
use crate::unwind::MemoryAccess;

pub(crate) type OwnedReader = EndianArcSlice<RunTimeEndian>;
pub(crate) type OwnedDwarf = Dwarf<OwnedReader>;

/// A resolved source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine
{
    /// Source file path as recorded in the line table.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
}

/// Debug-information capability over one opened module.
pub trait DebugInfo
{
    /// Map a module-relative address to the tightest enclosing line-table
    /// row: the last row whose address is ≤ the target.
    ///
    /// Fails with `LineNotFound` when the address precedes every row or no
    /// compile unit contains it.
    fn line_for(&self, relative: Address) -> GlintResult<SourceLine>;

    /// Compute the runtime address of a named variable visible at
    /// `relative_pc`, evaluating its location expression against
    /// `frame_base`.
    fn find_var_address(
        &self,
        relative_pc: Address,
        name: &str,
        frame_base: Address,
        memory: &dyn MemoryAccess,
    ) -> GlintResult<Address>;
}

/// Parsed DWARF for one module.
///
/// Holds the raw `gimli` view for DIE work and an `addr2line` context for
/// line lookups; both share the same section bytes.
pub struct DwarfInfo
{
    dwarf: OwnedDwarf,
    context: addr2line::Context<OwnedReader>,
}

impl DwarfInfo
{
    /// Read, parse, and index debug info from an object file on disk.
    pub fn open(path: &Path) -> GlintResult<Self>
    {
        let unavailable = |details: String| GlintError::DebugInfoUnavailable {
            path: path.display().to_string(),
            details,
        };

        let bytes = fs::read(path).map_err(|err| unavailable(err.to_string()))?;
        let data = Arc::<[u8]>::from(bytes);
        let file = object::File::parse(&*data).map_err(|err| unavailable(format!("parse: {err}")))?;

        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        // ELF-only, so the canonical section names are enough; a missing
        // section reads as empty, which gimli tolerates.
        let load_section = |id: SectionId| -> Result<OwnedReader, gimli::Error> {
            let section = file
                .section_by_name(id.name())
                .and_then(|section| section.uncompressed_data().ok())
                .map(|cow| Arc::<[u8]>::from(cow.into_owned()))
                .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
            Ok(EndianArcSlice::new(section, endian))
        };

        let dwarf = Dwarf::load(load_section).map_err(|err| unavailable(format!("DWARF load: {err}")))?;
        let for_lines = Dwarf::load(load_section).map_err(|err| unavailable(format!("DWARF load: {err}")))?;
        let context =
            addr2line::Context::from_dwarf(for_lines).map_err(|err| unavailable(format!("line index: {err}")))?;

        tracing::debug!("opened debug info for {}", path.display());
        Ok(Self { dwarf, context })
    }
}

impl DebugInfo for DwarfInfo
{
    fn line_for(&self, relative: Address) -> GlintResult<SourceLine>
    {
        let location = self
            .context
            .find_location(relative.value())
            .map_err(|_| GlintError::LineNotFound(relative.value()))?
            .ok_or(GlintError::LineNotFound(relative.value()))?;

        match (location.file, location.line) {
            (Some(file), Some(line)) => Ok(SourceLine {
                file: file.to_string(),
                line,
            }),
            _ => Err(GlintError::LineNotFound(relative.value())),
        }
    }

    fn find_var_address(
        &self,
        relative_pc: Address,
        name: &str,
        frame_base: Address,
        memory: &dyn MemoryAccess,
    ) -> GlintResult<Address>
    {
        variables::find_var_address(&self.dwarf, relative_pc, name, frame_base, memory)
    }
}
