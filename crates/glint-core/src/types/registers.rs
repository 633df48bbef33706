//! Captured register state.

use crate::types::Address;

/// The register values the host debugger hands us when it stops.
///
/// The command surface is invoked from the host debugger's expression
/// evaluator with exactly these four registers; they are enough to identify
/// the stop location (`ip`, `sp`) and to seed the one unwind step the live
/// variable resolver performs (`bp`, `bx`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSnapshot
{
    /// Instruction pointer at the stop.
    pub ip: Address,
    /// Stack pointer at the stop.
    pub sp: Address,
    /// Frame pointer; origin for the frame-base unwind step.
    pub bp: Address,
    /// Callee-saved scratch register, carried for unwinders that need it.
    pub bx: Address,
}

impl RegisterSnapshot
{
    /// Build a snapshot from raw register values.
    pub fn new(ip: u64, sp: u64, bp: u64, bx: u64) -> Self
    {
        Self {
            ip: Address::from(ip),
            sp: Address::from(sp),
            bp: Address::from(bp),
            bx: Address::from(bx),
        }
    }

    /// The memoization key for context resolution: the debugger is considered
    /// stopped at the same logical point while `(ip, sp)` is unchanged.
    pub fn stop_key(&self) -> (Address, Address)
    {
        (self.ip, self.sp)
    }
}
