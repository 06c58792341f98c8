//! CPU/PPU synchronization.
//!
//! The CPU runs whole instructions ahead of the PPU. While `awaiting_sync` is set, the
//! first access to a PPU register inside an instruction aborts that instruction before
//! any of its effects land: the CPU rolls its program counter back, the driving loop
//! catches the PPU up to the CPU, and the instruction is retried with `skip_next_sync`
//! set so it runs to completion.

use serde::{Deserialize, Serialize};

/// Raised by the bus when a PPU register is touched while the PPU lags behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpuSync;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFlags {
    pub awaiting_sync: bool,
    pub skip_next_sync: bool,
}

impl SyncFlags {
    #[inline]
    pub fn check(&self) -> Result<(), PpuSync> {
        if self.awaiting_sync && !self.skip_next_sync {
            Err(PpuSync)
        } else {
            Ok(())
        }
    }
}

/// Outcome of a single CPU step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Instruction (or interrupt entry) completed, costing this many cycles
    Continue(u32),
    /// Instruction touched a PPU register; it was rolled back and must be retried
    /// after the PPU has caught up
    NeedsSync,
    /// JAM was executed at this address; the CPU will not run again
    Halted { pc: u16 },
}

/// Outcome of a burst of CPU steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstResult {
    Completed,
    NeedsSync,
    Halted { pc: u16 },
}
