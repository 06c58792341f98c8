mod game_genie;

use crate::cartridge::Cartridge;
use crate::error::Result;
use crate::input::InputDevice;
use crate::ppu::PpuBus;
use crate::sync::{PpuSync, SyncFlags};
use crate::SystemControl;

pub use self::game_genie::GameGenie;

const CPU_RAM_START: u16 = 0x0000;
const CPU_RAM_END: u16 = 0x1FFF;
const PPU_REG_START: u16 = 0x2000;
const PPU_REG_END: u16 = 0x3FFF;
const CARTRIDGE_START: u16 = 0x4020;

pub const DMA_REG_ADDR: u16 = 0x4014;
const JOYPAD1_REG: u16 = 0x4016;
const JOYPAD2_REG: u16 = 0x4017;

pub const CPU_RAM_LENGTH: usize = 0x800;

// CPU cycles the OAM DMA transfer holds the bus for
const DMA_STALL_CYCLES: u32 = 512;

pub struct SystemBus {
    pub cartridge: Box<dyn Cartridge>,
    pub ppu_bus: PpuBus,

    pub(crate) cpu_ram: Vec<u8>,
    ports: [Option<Box<dyn InputDevice>>; 2],
    game_genie: Option<GameGenie>,

    dma_stall: u32,
}

impl SystemControl for SystemBus {
    fn reset(&mut self) {
        self.cartridge.reset();
        self.ppu_bus.reset();
        self.ppu_bus.set_mirroring(self.cartridge.mirroring());
        self.dma_stall = 0;
    }
}

impl SystemBus {
    pub fn new(cartridge: Box<dyn Cartridge>) -> Self {
        Self {
            ppu_bus: PpuBus::new(cartridge.mirroring()),
            cartridge,

            cpu_ram: vec![0; CPU_RAM_LENGTH],
            ports: [None, None],
            game_genie: None,

            dma_stall: 0,
        }
    }

    /// CPU read. Touching a PPU register while the PPU lags behind aborts with `PpuSync`.
    pub fn cpu_read(&mut self, addr: u16, sync: &SyncFlags) -> std::result::Result<u8, PpuSync> {
        let byte = match addr {
            CPU_RAM_START..=CPU_RAM_END => {
                self.cpu_ram[addr as usize % CPU_RAM_LENGTH]
            },
            PPU_REG_START..=PPU_REG_END => {
                sync.check()?;
                self.ppu_bus.cpu_read_reg(addr, self.cartridge.as_ref())
            },
            JOYPAD1_REG | JOYPAD2_REG => {
                match &mut self.ports[(addr & 0x01) as usize] {
                    Some(device) => device.poll() & 0x01,
                    None => 0,
                }
            },
            CARTRIDGE_START..=0xFFFF => self.read_cartridge(addr),
            // APU and I/O registers are not emulated
            _ => 0
        };

        Ok(byte)
    }

    pub fn cpu_write(&mut self, addr: u16, byte: u8, sync: &SyncFlags) -> std::result::Result<(), PpuSync> {
        match addr {
            CPU_RAM_START..=CPU_RAM_END => {
                self.cpu_ram[addr as usize % CPU_RAM_LENGTH] = byte;
            },
            PPU_REG_START..=PPU_REG_END => {
                sync.check()?;
                self.ppu_bus.cpu_write_reg(addr, byte, self.cartridge.as_mut());
            },
            DMA_REG_ADDR => self.oam_dma(byte),
            JOYPAD1_REG => {
                let strobe = byte & 0x01 != 0;
                for device in self.ports.iter_mut().flatten() {
                    device.set_strobe(strobe);
                }
            },
            CARTRIDGE_START..=0xFFFF => {
                self.cartridge.write(addr, byte);

                // mappers may switch nametable layout at any time
                let mirroring = self.cartridge.mirroring();
                if mirroring != self.ppu_bus.mirroring() {
                    self.ppu_bus.set_mirroring(mirroring);
                }
            },
            _ => {}
        };

        Ok(())
    }

    /// Side-effect-free read of CPU space, for debuggers and vector fetches
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            CPU_RAM_START..=CPU_RAM_END => self.cpu_ram[addr as usize % CPU_RAM_LENGTH],
            PPU_REG_START..=PPU_REG_END => self.ppu_bus.peek_reg(addr, self.cartridge.as_ref()),
            CARTRIDGE_START..=0xFFFF => self.read_cartridge(addr),
            _ => 0
        }
    }

    pub fn ppu_read(&self, addr: u16) -> u8 {
        self.ppu_bus.ppu_read(addr, self.cartridge.as_ref())
    }

    /// Stall cycles owed by DMA transfers since the last call
    pub fn take_dma_stall(&mut self) -> u32 {
        std::mem::take(&mut self.dma_stall)
    }

    /// Plugs a device into port 0 (0x4016) or port 1 (0x4017); other ports are ignored
    pub fn connect_input(&mut self, port: usize, device: Box<dyn InputDevice>) {
        if let Some(slot) = self.ports.get_mut(port) {
            *slot = Some(device);
        }
    }

    pub fn disconnect_input(&mut self, port: usize) -> Option<Box<dyn InputDevice>> {
        self.ports.get_mut(port).and_then(Option::take)
    }

    pub fn set_game_genie(&mut self, code: &str) -> Result<()> {
        let genie = GameGenie::decode(code)?;
        self.game_genie = Some(genie);

        log::info!("Game Genie {} armed: {:04X} = {:02X} (compare {:?})", code, genie.addr, genie.data, genie.compare);
        Ok(())
    }

    pub fn clear_game_genie(&mut self) {
        if self.game_genie.take().is_some() {
            log::info!("Game Genie cleared");
        }
    }

    pub fn game_genie(&self) -> Option<GameGenie> {
        self.game_genie
    }

    #[inline]
    fn read_cartridge(&self, addr: u16) -> u8 {
        let byte = self.cartridge.read(addr);

        match &self.game_genie {
            Some(genie) => genie.patch(addr, byte),
            None => byte,
        }
    }

    fn oam_dma(&mut self, page: u8) {
        let base = (page as u16) << 8;

        let mut data = [0; 256];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = self.peek(base | i as u16);
        }

        self.ppu_bus.oam_dma(&data);
        self.dma_stall += DMA_STALL_CYCLES;
    }
}

#[cfg(test)]
impl SystemBus {
    /// Writes `data` starting at `addr`, into RAM below 0x2000 and the cartridge above
    pub fn load_ram(&mut self, addr: u16, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            let addr = addr.wrapping_add(i as u16);

            if addr <= CPU_RAM_END {
                self.cpu_ram[addr as usize % CPU_RAM_LENGTH] = byte;
            } else {
                self.cartridge.write(addr, byte);
            }
        }
    }

    pub fn test_new() -> Self {
        Self::new(Box::new(crate::cartridge::CartridgeNes::test_new()))
    }
}
