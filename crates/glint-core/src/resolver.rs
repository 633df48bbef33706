//! Runtime value resolvers.
//!
//! A resolver is a generated callback that computes a variable's display
//! value at debug time instead of a literal captured at build time. The
//! original design registered the stopped frame in a global slot and let the
//! callback reach back through it; here the callback receives an explicit
//! [`FrameAccess`] capability instead, exposing exactly the one privileged
//! operation it needs.

use std::fmt;
use std::sync::Arc;

use crate::dwarf::DebugInfo;
use crate::error::{GlintError, GlintResult};
use crate::session::Context;
use crate::types::Address;
use crate::unwind::{FrameUnwinder, MemoryAccess};

/// A debug-time value formatter for one variable expression.
///
/// Implementations are produced by the code generator alongside the section
/// they belong to, one per distinct runtime-computed expression.
pub trait ValueResolver: Send + Sync
{
    /// Compute the display value of `name` in the stopped frame.
    ///
    /// Implementations typically call [`FrameAccess::find_stack_var`] and
    /// format whatever lives at the returned address.
    fn resolve(&self, name: &str, frame: &FrameAccess<'_>) -> String;
}

/// Shareable, identity-comparable handle to a [`ValueResolver`].
///
/// Handles are deduplicated by pointer identity when a section is emitted,
/// so a resolver shared across lines (or sections) is serialized into
/// exactly one slot.
#[derive(Clone)]
pub struct ResolverHandle
{
    inner: Arc<dyn ValueResolver>,
}

impl ResolverHandle
{
    /// Wrap a resolver implementation.
    pub fn new(resolver: Arc<dyn ValueResolver>) -> Self
    {
        Self { inner: resolver }
    }

    /// Invoke the underlying resolver.
    pub fn resolve(&self, name: &str, frame: &FrameAccess<'_>) -> String
    {
        self.inner.resolve(name, frame)
    }

    /// Identity comparison; two handles are the same resolver only if they
    /// share the same allocation.
    pub fn same_as(&self, other: &ResolverHandle) -> bool
    {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ResolverHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "ResolverHandle({:p})", Arc::as_ptr(&self.inner))
    }
}

/// The capability handed to resolver callbacks while one is running.
///
/// This is the sole entry point allowed to execute injected formatting code
/// with access to the debuggee's stack.
pub struct FrameAccess<'a>
{
    ctx: &'a Context,
    debug_info: &'a dyn DebugInfo,
    unwinder: &'a dyn FrameUnwinder,
    memory: &'a dyn MemoryAccess,
}

impl<'a> FrameAccess<'a>
{
    pub(crate) fn new(
        ctx: &'a Context,
        debug_info: &'a dyn DebugInfo,
        unwinder: &'a dyn FrameUnwinder,
        memory: &'a dyn MemoryAccess,
    ) -> Self
    {
        Self {
            ctx,
            debug_info,
            unwinder,
            memory,
        }
    }

    /// Compute the runtime address of a named variable in the stopped frame.
    ///
    /// One unwind step from the captured registers yields the caller's stack
    /// pointer, which is the DWARF frame base under the code generator's
    /// convention; the variable's location expression is then evaluated
    /// against it.
    pub fn find_stack_var(&self, name: &str) -> GlintResult<Address>
    {
        let module = self
            .ctx
            .module
            .as_ref()
            .ok_or(GlintError::ModuleNotFound(self.ctx.regs.ip.value()))?;
        let relative_ip = self
            .ctx
            .regs
            .ip
            .checked_sub(module.load_base.value())
            .ok_or(GlintError::ModuleNotFound(self.ctx.regs.ip.value()))?;

        let frame_base = self.unwinder.caller_stack_pointer(&self.ctx.regs, self.memory)?;
        tracing::debug!(
            "find_stack_var: {name} at relative ip {relative_ip} with frame base {frame_base}"
        );
        self.debug_info
            .find_var_address(relative_ip, name, frame_base, self.memory)
    }

    /// Read a 64-bit value from the debuggee.
    pub fn read_u64(&self, address: Address) -> GlintResult<u64>
    {
        self.memory.read_u64(address)
    }
}
