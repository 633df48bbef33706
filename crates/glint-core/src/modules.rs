//! Module and address resolution.
//!
//! Maps a raw instruction pointer to the binary module that owns it and
//! hands out cached debug-information handles for that module. The loader
//! query is a capability trait so tests can fake a process image; the
//! production implementation asks the dynamic loader the same way the host
//! debugger would.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dwarf::{DebugInfo, DwarfInfo};
use crate::error::{GlintError, GlintResult};
use crate::types::Address;

/// The module owning a resolved instruction pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo
{
    /// Path of the mapped object file.
    pub path: PathBuf,
    /// Load base; subtracted from debuggee addresses before any debug-info
    /// query.
    pub load_base: Address,
}

/// Capability: which loaded module owns an address?
pub trait ModuleIndex
{
    /// Resolve the owning module, or `ModuleNotFound` if `ip` is unmapped.
    fn resolve(&self, ip: Address) -> GlintResult<ModuleInfo>;
}

/// Capability: open a module's debug information.
pub trait DebugInfoOpener
{
    /// Open and parse debug info for the object at `path`.
    fn open(&self, path: &Path) -> GlintResult<Arc<dyn DebugInfo>>;
}

/// Production module index backed by the dynamic loader (`dladdr`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LoaderModuleIndex;

#[cfg(unix)]
impl ModuleIndex for LoaderModuleIndex
{
    fn resolve(&self, ip: Address) -> GlintResult<ModuleInfo>
    {
        let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
        // SAFETY: dladdr only inspects the calling process's own link maps;
        // the out-param is a plain POD we zeroed above.
        let rc = unsafe { libc::dladdr(ip.value() as *const libc::c_void, &mut info) };
        if rc == 0 || info.dli_fname.is_null() {
            return Err(GlintError::ModuleNotFound(ip.value()));
        }

        let path = unsafe { std::ffi::CStr::from_ptr(info.dli_fname) }
            .to_string_lossy()
            .into_owned();
        Ok(ModuleInfo {
            path: PathBuf::from(path),
            load_base: Address::from(info.dli_fbase as u64),
        })
    }
}

/// Production opener parsing ELF + DWARF with `object`/`gimli`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DwarfOpener;

impl DebugInfoOpener for DwarfOpener
{
    fn open(&self, path: &Path) -> GlintResult<Arc<dyn DebugInfo>>
    {
        Ok(Arc::new(DwarfInfo::open(path)?))
    }
}

/// Path-keyed cache of opened debug info.
///
/// Process-lifetime, never evicted; a module's debug info is parsed at most
/// once per session no matter how many addresses resolve into it.
pub struct DebugInfoCache
{
    opener: Box<dyn DebugInfoOpener>,
    loaded: HashMap<PathBuf, Arc<dyn DebugInfo>>,
}

impl DebugInfoCache
{
    /// Create a cache over the given opener.
    pub fn new(opener: Box<dyn DebugInfoOpener>) -> Self
    {
        Self {
            opener,
            loaded: HashMap::new(),
        }
    }

    /// Get or open debug info for a module path.
    pub fn debug_info_for(&mut self, path: &Path) -> GlintResult<Arc<dyn DebugInfo>>
    {
        if let Some(existing) = self.loaded.get(path) {
            return Ok(existing.clone());
        }
        tracing::debug!("opening debug info for {}", path.display());
        let opened = self.opener.open(path)?;
        self.loaded.insert(path.to_path_buf(), opened.clone());
        Ok(opened)
    }
}
