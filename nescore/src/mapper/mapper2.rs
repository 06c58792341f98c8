use crate::{cartridge::PRG_ROM_BANK_SIZE, SystemControl};

use super::{Mapper, CHR_END, PRG_ROM_END, PRG_ROM_HI_END, PRG_ROM_HI_START, PRG_ROM_LO_END, PRG_ROM_LO_START, PRG_ROM_START};

/// UxROM: switchable 16KB bank at 0x8000, last bank fixed at 0xC000
#[derive(Clone)]
pub struct Mapper2 {
    prg_rom_banks: usize,
    prg_bank_lo: usize,
    chr_ram: bool,
}

impl SystemControl for Mapper2 {
    fn reset(&mut self) {
        self.prg_bank_lo = 0;
    }
}

impl Mapper for Mapper2 {
    fn mapped_cpu_read(&self, prg_rom: &[u8], addr: u16) -> Option<u8> {
        match addr {
            PRG_ROM_LO_START..=PRG_ROM_LO_END => {
                Some(prg_rom[self.prg_bank_lo * PRG_ROM_BANK_SIZE + (addr & 0x3FFF) as usize])
            },
            PRG_ROM_HI_START..=PRG_ROM_HI_END => {
                Some(prg_rom[(self.prg_rom_banks - 1) * PRG_ROM_BANK_SIZE + (addr & 0x3FFF) as usize])
            },
            _ => None
        }
    }

    fn mapped_cpu_write(&mut self, addr: u16, byte: u8) -> bool {
        match addr {
            PRG_ROM_START..=PRG_ROM_END => {
                let mut bank = (byte & 0b00001111) as usize;

                if bank >= self.prg_rom_banks {
                    log::warn!("UxROM bank {} out of range ({} banks), clamping", bank, self.prg_rom_banks);
                    bank = self.prg_rom_banks - 1;
                }

                self.prg_bank_lo = bank;
                true
            }
            _ => false
        }
    }

    fn mapped_ppu_read(&self, chr_mem: &[u8], addr: u16) -> u8 {
        chr_mem[addr as usize % chr_mem.len()]
    }

    fn mapped_ppu_write(&mut self, chr_mem: &mut [u8], addr: u16, byte: u8) {
        if self.chr_ram && addr <= CHR_END {
            let len = chr_mem.len();
            chr_mem[addr as usize % len] = byte;
        }
    }

    fn box_clone(&self) -> Box<dyn Mapper> {
        Box::new(self.clone())
    }
}

impl Mapper2 {
    pub fn new(prg_rom_banks: usize, chr_ram: bool) -> Self {
        Self {
            prg_rom_banks: prg_rom_banks.max(1),
            prg_bank_lo: 0,
            chr_ram,
        }
    }
}
