#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate bitflags;

mod bus;
mod cartridge;
mod config;
mod cpu;
mod error;
mod input;
mod mapper;
mod ppu;
mod snapshot;
mod sync;
mod system;

pub use bus::{GameGenie, SystemBus};
pub use cartridge::{Cartridge, CartridgeNes, Mirroring};
pub use config::{EmulatorConfig, FRAME_TICKS, RENDER_CYCLES, SCANLINES_PER_FRAME, TICKS_PER_CPU_CYCLE, TICKS_PER_SCANLINE, VBLANK_CYCLES};
pub use cpu::{Cpu6502, CpuRegisters};
pub use error::{NesError, Result};
pub use input::{Button, InputDevice, StandardJoypad};
pub use ppu::{FrameBuffer, OAMEntry, PixelSink, Ppu2C02, PpuRegisters};
pub use snapshot::{Snapshot, SystemState};
pub use sync::{BurstResult, StepResult, SyncFlags};
pub use system::Nes;

pub const DISPLAY_WIDTH: usize = 256;
pub const DISPLAY_HEIGHT: usize = 240;

pub trait SystemControl {
    fn reset(&mut self);
}
