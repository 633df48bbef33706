//! In-memory fakes for driving a session without a live debuggee.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glint_core::dwarf::{DebugInfo, SourceLine};
use glint_core::error::{GlintError, GlintResult};
use glint_core::modules::{DebugInfoOpener, ModuleIndex, ModuleInfo};
use glint_core::types::{Address, RegisterSnapshot};
use glint_core::unwind::{FrameUnwinder, MemoryAccess};

pub const LOAD_BASE: u64 = 0x1000;
pub const MODULE_PATH: &str = "/fake/generated-module.so";

/// One module mapped over `[lo, hi)`.
pub struct FakeModules
{
    pub lo: u64,
    pub hi: u64,
}

impl ModuleIndex for FakeModules
{
    fn resolve(&self, ip: Address) -> GlintResult<ModuleInfo>
    {
        if (self.lo..self.hi).contains(&ip.value()) {
            Ok(ModuleInfo {
                path: PathBuf::from(MODULE_PATH),
                load_base: Address::from(LOAD_BASE),
            })
        } else {
            Err(GlintError::ModuleNotFound(ip.value()))
        }
    }
}

/// Line table and variable locations as plain maps, keyed by
/// module-relative address and variable name.
pub struct FakeInfo
{
    pub lines: HashMap<u64, (String, u32)>,
    pub var_offsets: HashMap<String, u64>,
}

impl DebugInfo for FakeInfo
{
    fn line_for(&self, relative: Address) -> GlintResult<SourceLine>
    {
        self.lines
            .get(&relative.value())
            .map(|(file, line)| SourceLine {
                file: file.clone(),
                line: *line,
            })
            .ok_or(GlintError::LineNotFound(relative.value()))
    }

    fn find_var_address(
        &self,
        _relative_pc: Address,
        name: &str,
        frame_base: Address,
        _memory: &dyn MemoryAccess,
    ) -> GlintResult<Address>
    {
        self.var_offsets
            .get(name)
            .map(|offset| Address::from(frame_base.value() + offset))
            .ok_or_else(|| GlintError::VariableNotFound(name.to_string()))
    }
}

/// Hands out the same parsed info for every path.
pub struct FakeOpener(pub Arc<FakeInfo>);

impl DebugInfoOpener for FakeOpener
{
    fn open(&self, _path: &Path) -> GlintResult<Arc<dyn DebugInfo>>
    {
        Ok(self.0.clone())
    }
}

/// Always unwinds to the same caller stack pointer.
pub struct FakeUnwinder(pub u64);

impl FrameUnwinder for FakeUnwinder
{
    fn caller_stack_pointer(&self, _regs: &RegisterSnapshot, _memory: &dyn MemoryAccess) -> GlintResult<Address>
    {
        Ok(Address::from(self.0))
    }
}

pub struct FakeMemory(pub HashMap<u64, u64>);

impl MemoryAccess for FakeMemory
{
    fn read_u64(&self, address: Address) -> GlintResult<u64>
    {
        self.0.get(&address.value()).copied().ok_or_else(|| {
            GlintError::Io(io::Error::new(io::ErrorKind::InvalidInput, "unmapped fake memory"))
        })
    }
}

pub fn regs_at(ip: u64) -> RegisterSnapshot
{
    RegisterSnapshot::new(ip, 0x7f00, 0x7f40, 0)
}
