//! Call-stack unwinding capability.
//!
//! The live variable resolver needs precisely one unwind step: the caller's
//! stack pointer is, under the code generator's convention, the DWARF frame
//! base for the stopped function. The facility is a trait so tests can
//! substitute a canned step, with a frame-pointer implementation as the
//! in-process default.

use crate::error::{GlintError, GlintResult};
use crate::types::{Address, RegisterSnapshot};

/// Minimal memory accessor for the resolver and unwinder.
///
/// Implementations should return errors for unreadable addresses rather
/// than panic; the null address is always an error.
pub trait MemoryAccess
{
    /// Read a 64-bit value from the given address.
    fn read_u64(&self, address: Address) -> GlintResult<u64>;
}

/// Single-step unwinding facility.
pub trait FrameUnwinder
{
    /// Compute the caller's stack pointer from the captured registers.
    fn caller_stack_pointer(&self, regs: &RegisterSnapshot, memory: &dyn MemoryAccess)
        -> GlintResult<Address>;
}

/// Reads the debuggee's own address space.
///
/// The runtime executes inside the debuggee (the host debugger calls into it
/// via its expression evaluator), so a read is a plain volatile load. The
/// caller is trusted to pass addresses derived from DWARF locations of live
/// frames; a wild address faults the debuggee just as it would have without
/// us, which is the original contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcessMemory;

impl MemoryAccess for InProcessMemory
{
    fn read_u64(&self, address: Address) -> GlintResult<u64>
    {
        if address == Address::ZERO {
            return Err(GlintError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "refusing to read null address",
            )));
        }
        // SAFETY: see type-level comment; addresses come from frame-base
        // arithmetic over DWARF locations of the live stopped frame.
        let value = unsafe { std::ptr::read_volatile(address.value() as *const u64) };
        Ok(value)
    }
}

/// Frame-pointer unwinder for the x86-64 frame layout the generated code is
/// compiled with: saved RBP at `[rbp]`, return address at `[rbp + 8]`, so the
/// caller's stack pointer is `rbp + 16`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FramePointerUnwinder;

impl FrameUnwinder for FramePointerUnwinder
{
    fn caller_stack_pointer(&self, regs: &RegisterSnapshot, memory: &dyn MemoryAccess)
        -> GlintResult<Address>
    {
        if regs.bp == Address::ZERO {
            return Err(GlintError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "no frame pointer in captured registers",
            )));
        }
        // Touch the saved frame pointer so a dead frame fails here instead
        // of during location evaluation.
        memory.read_u64(regs.bp)?;
        Ok(regs.bp + 16)
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;

    /// Word-addressed fake memory for unwinder tests.
    struct FakeMemory(HashMap<u64, u64>);

    impl MemoryAccess for FakeMemory
    {
        fn read_u64(&self, address: Address) -> GlintResult<u64>
        {
            self.0
                .get(&address.value())
                .copied()
                .ok_or_else(|| GlintError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "unmapped")))
        }
    }

    #[test]
    fn test_frame_pointer_step()
    {
        let mut cells = HashMap::new();
        cells.insert(0x7000, 0x7100); // saved rbp
        let memory = FakeMemory(cells);

        let regs = RegisterSnapshot::new(0x4000, 0x6ff0, 0x7000, 0);
        let sp = FramePointerUnwinder
            .caller_stack_pointer(&regs, &memory)
            .unwrap();
        assert_eq!(sp, Address::from(0x7010));
    }

    #[test]
    fn test_missing_frame_pointer_fails()
    {
        let memory = FakeMemory(HashMap::new());
        let regs = RegisterSnapshot::new(0x4000, 0x6ff0, 0, 0);
        assert!(FramePointerUnwinder.caller_stack_pointer(&regs, &memory).is_err());
    }
}
