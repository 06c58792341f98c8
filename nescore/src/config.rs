//! Emulator configuration and NTSC frame timing.

use serde::{Deserialize, Serialize};

/// PPU ticks in one scanline
pub const TICKS_PER_SCANLINE: u32 = 341;

/// Scanlines in one NTSC frame, pre-render line included
pub const SCANLINES_PER_FRAME: u32 = 262;

/// The PPU runs three ticks for every CPU cycle
pub const TICKS_PER_CPU_CYCLE: u32 = 3;

pub const FRAME_TICKS: u32 = TICKS_PER_SCANLINE * SCANLINES_PER_FRAME;

/// CPU cycles executed while the PPU renders, before vblank begins
pub const RENDER_CYCLES: u32 = 27508;

/// CPU cycles executed during vblank, with no CPU/PPU synchronization
pub const VBLANK_CYCLES: u32 = 2272;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    pub render_cycles: u32,
    pub vblank_cycles: u32,
    /// When false, any illegal opcode halts the CPU like JAM does
    pub illegal_opcodes: bool,
    /// When false, the render phase runs without rolling back on PPU register access
    pub cpu_ppu_sync: bool,
    /// 6 or 8 letter code armed when the system is built
    pub game_genie: Option<String>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            render_cycles: RENDER_CYCLES,
            vblank_cycles: VBLANK_CYCLES,
            illegal_opcodes: true,
            cpu_ppu_sync: true,
            game_genie: None,
        }
    }
}

impl EmulatorConfig {
    /// PPU tick count reached at the end of the render phase
    #[must_use]
    pub const fn render_ticks(&self) -> u32 {
        self.render_cycles * TICKS_PER_CPU_CYCLE
    }
}
