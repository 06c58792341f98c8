use super::{Mapper, CHR_END, CHR_START, PRG_RAM_END, PRG_RAM_START, PRG_ROM_END, PRG_ROM_START};
use crate::{cartridge::PRG_ROM_BANK_SIZE, SystemControl};

const PRG_RAM_SIZE: usize = 0x2000;

/// NROM: fixed 16KB or 32KB of PRG ROM, 8KB of CHR
#[derive(Clone)]
pub struct Mapper0 {
    prg_ram: [u8; PRG_RAM_SIZE],
    prg_rom_banks: usize, // 1 or 2 bank(s)
    chr_ram: bool,
}

impl SystemControl for Mapper0 {
    fn reset(&mut self) {}
}

impl Mapper for Mapper0 {
    fn mapped_cpu_read(&self, prg_rom: &[u8], addr: u16) -> Option<u8> {
        match addr {
            PRG_RAM_START..=PRG_RAM_END => {
                Some(self.prg_ram[(addr - PRG_RAM_START) as usize])
            }
            PRG_ROM_START..=PRG_ROM_END => {
                let addr = (addr - PRG_ROM_START) as usize;

                Some(if self.prg_rom_banks == 1 {
                    // address wraps back for ROMs with only a single 16KB bank
                    prg_rom[addr % PRG_ROM_BANK_SIZE]
                } else {
                    prg_rom[addr % prg_rom.len()]
                })
            },
            _ => None
        }
    }

    fn mapped_cpu_write(&mut self, addr: u16, byte: u8) -> bool {
        match addr {
            PRG_RAM_START..=PRG_RAM_END => {
                self.prg_ram[(addr - PRG_RAM_START) as usize] = byte;
                true
            }
            _ => false
        }
    }

    fn mapped_ppu_read(&self, chr_mem: &[u8], addr: u16) -> u8 {
        match addr {
            CHR_START..=CHR_END => chr_mem[addr as usize % chr_mem.len()],
            _ => 0,
        }
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

impl Mapper0 {
    pub fn new(prg_rom_banks: usize, chr_ram: bool) -> Self {
        Self {
            prg_ram: [0; PRG_RAM_SIZE],
            prg_rom_banks,
            chr_ram,
        }
    }
}
