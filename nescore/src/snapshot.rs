//! Single-slot save states.
//!
//! Everything but the cartridge is plain data in [`SystemState`]; the cartridge, whose
//! concrete type the core does not know, is captured through `Cartridge::clone_state`.

use serde::{Deserialize, Serialize};

use crate::bus::SystemBus;
use crate::cartridge::Cartridge;
use crate::cpu::Cpu6502;
use crate::error::{NesError, Result};
use crate::ppu::{Ppu2C02, PpuBus};
use crate::system::Nes;

/// The value-copied part of a snapshot
#[derive(Clone, Serialize, Deserialize)]
pub struct SystemState {
    pub cpu: Cpu6502,
    pub cpu_ram: Vec<u8>,
    pub ppu_bus: PpuBus,
    pub ppu: Ppu2C02,
}

pub struct Snapshot {
    state: SystemState,
    cartridge: Box<dyn Cartridge>,
}

impl Snapshot {
    fn capture(cpu: &Cpu6502, bus: &SystemBus, ppu: &Ppu2C02) -> Self {
        Self {
            state: SystemState {
                cpu: cpu.clone(),
                cpu_ram: bus.cpu_ram.clone(),
                ppu_bus: bus.ppu_bus.clone(),
                ppu: ppu.clone(),
            },
            cartridge: bus.cartridge.clone_state(),
        }
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }
}

impl Nes {
    /// Captures the whole machine, replacing any earlier snapshot
    pub fn save_snapshot(&mut self) {
        self.snapshot = Some(Snapshot::capture(&self.cpu, &self.bus, &self.ppu));

        log::debug!("Snapshot saved at {:04X}", self.cpu.program_counter());
    }

    /// Swaps the saved machine back in and discards the snapshot.
    /// With nothing saved, the live state is left untouched.
    pub fn restore_snapshot(&mut self) -> Result<()> {
        let Snapshot { state, cartridge } = self.snapshot.take().ok_or(NesError::NoSnapshot)?;

        self.cpu = state.cpu;
        self.bus.cpu_ram = state.cpu_ram;
        self.bus.ppu_bus = state.ppu_bus;
        self.bus.cartridge = cartridge;
        self.ppu = state.ppu;

        log::debug!("Snapshot restored at {:04X}", self.cpu.program_counter());
        Ok(())
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }
}
