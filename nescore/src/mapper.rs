mod mapper0;
mod mapper2;
#[cfg(test)]
mod testmapper;

use crate::cartridge::Mirroring;
use crate::SystemControl;

pub use self::mapper0::Mapper0;
pub use self::mapper2::Mapper2;

#[cfg(test)]
pub use self::testmapper::TestMapper;

const PRG_RAM_START: u16 = 0x6000;
const PRG_RAM_END: u16 = 0x7FFF;

const PRG_ROM_START: u16 = 0x8000;
const PRG_ROM_END: u16 = 0xFFFF;
const PRG_ROM_LO_START: u16 = 0x8000;
const PRG_ROM_LO_END: u16 = 0xBFFF;
const PRG_ROM_HI_START: u16 = 0xC000;
const PRG_ROM_HI_END: u16 = 0xFFFF;

const CHR_START: u16 = 0x0000;
const CHR_END: u16 = 0x1FFF;

/// Bank-switching policy of a cartridge board. ROM contents stay in `CartridgeNes`;
/// a mapper only holds its latches and on-board RAM.
pub trait Mapper: SystemControl + Send {
    /// Some contains the successfully read byte; None means nothing on the board answers
    fn mapped_cpu_read(&self, prg_rom: &[u8], addr: u16) -> Option<u8>;

    /// Returns true if the board accepted the write
    fn mapped_cpu_write(&mut self, addr: u16, byte: u8) -> bool;

    /// Returns the addressed pattern table byte (from PPU 0x0000 to 0x1FFF)
    fn mapped_ppu_read(&self, chr_mem: &[u8], addr: u16) -> u8;

    /// Ignored unless the board carries CHR RAM
    fn mapped_ppu_write(&mut self, chr_mem: &mut [u8], addr: u16, byte: u8);

    /// Some mappers can dynamically change mirroring mode during execution
    fn get_updated_mirroring(&self) -> Option<Mirroring> {
        None
    }

    fn box_clone(&self) -> Box<dyn Mapper>;
}

impl Clone for Box<dyn Mapper> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}
