use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{NesError, Result};
use crate::mapper::{Mapper, Mapper0, Mapper2};
use crate::SystemControl;

// The size of each PRG_ROM bank
pub const PRG_ROM_BANK_SIZE: usize = 0x4000;

// The size of each CHR_ROM bank
pub const CHR_ROM_BANK_SIZE: usize = 0x2000;

const INES_HEADER_SIZE: usize = 0x10;
const TRAINER_SIZE: usize = 0x200;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mirroring {
    HORIZONTAL,
    VERTICAL,
    ONESCREEN_LO,
    ONESCREEN_HI,
    FOUR_SCREEN,
}

impl Mirroring {
    /// Physical nametable backing each of the four logical ones
    pub fn nametable_map(&self) -> [usize; 4] {
        match self {
            Mirroring::HORIZONTAL => [0, 0, 1, 1],
            Mirroring::VERTICAL => [0, 1, 0, 1],
            Mirroring::ONESCREEN_LO => [0, 0, 0, 0],
            Mirroring::ONESCREEN_HI => [1, 1, 1, 1],
            Mirroring::FOUR_SCREEN => [0, 1, 2, 3],
        }
    }
}

/// Everything the console sees of a cartridge: CPU space from 0x4020, the pattern
/// tables, the current nametable layout, and a way to clone the whole board for snapshots.
pub trait Cartridge: SystemControl + Send {
    fn read(&self, addr: u16) -> u8;

    fn write(&mut self, addr: u16, byte: u8);

    fn read_pattern(&self, addr: u16) -> u8;

    fn write_pattern(&mut self, addr: u16, byte: u8);

    fn mirroring(&self) -> Mirroring;

    fn clone_state(&self) -> Box<dyn Cartridge>;
}

#[derive(Clone)]
pub struct CartridgeNes {
    mirroring: Mirroring,
    mapper: Box<dyn Mapper>,
    mapper_num: u8,

    prg_rom: Arc<[u8]>,
    chr_mem: Vec<u8>,
}

impl SystemControl for CartridgeNes {
    fn reset(&mut self) {
        self.mapper.reset();
    }
}

impl Cartridge for CartridgeNes {
    fn read(&self, addr: u16) -> u8 {
        self.mapper.mapped_cpu_read(&self.prg_rom, addr).unwrap_or(0)
    }

    fn write(&mut self, addr: u16, byte: u8) {
        self.mapper.mapped_cpu_write(addr, byte);
    }

    fn read_pattern(&self, addr: u16) -> u8 {
        self.mapper.mapped_ppu_read(&self.chr_mem, addr)
    }

    fn write_pattern(&mut self, addr: u16, byte: u8) {
        self.mapper.mapped_ppu_write(&mut self.chr_mem, addr, byte);
    }

    fn mirroring(&self) -> Mirroring {
        self.mapper.get_updated_mirroring().unwrap_or(self.mirroring)
    }

    fn clone_state(&self) -> Box<dyn Cartridge> {
        Box::new(self.clone())
    }
}

impl CartridgeNes {
    pub fn from_ines_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < INES_HEADER_SIZE {
            return Err(NesError::InvalidRom(format!("{} bytes is too short for an iNES header", data.len())));
        }

        // First three bytes must be "NES" in ASCII, followed by 0x1A
        if data[0..4] != [0x4E, 0x45, 0x53, 0x1A] {
            return Err(NesError::InvalidRom(String::from("Not a iNES file")));
        }

        let prg_rom_banks = data[4] as usize;
        let chr_rom_banks = data[5] as usize;

        if prg_rom_banks == 0 {
            return Err(NesError::InvalidRom(String::from("no PRG-ROM banks")));
        }

        let mut mirroring = if data[6] & 0x01 == 0 {
            Mirroring::HORIZONTAL
        } else {
            Mirroring::VERTICAL
        };

        if data[6] & 0b00001000 != 0 {
            mirroring = Mirroring::FOUR_SCREEN;
        }

        let has_trainer = data[6] & 0b00000100 != 0;
        let mapper_num = (data[7] & 0b11110000) | (data[6] >> 4);

        let prg_start = INES_HEADER_SIZE + if has_trainer { TRAINER_SIZE } else { 0 };
        let prg_end = prg_start + prg_rom_banks * PRG_ROM_BANK_SIZE;
        let chr_end = prg_end + chr_rom_banks * CHR_ROM_BANK_SIZE;

        if data.len() < chr_end {
            return Err(NesError::InvalidRom(format!(
                "expected {} bytes of PRG/CHR data, found {}", chr_end - prg_start, data.len().saturating_sub(prg_start)
            )));
        }

        let chr_ram = chr_rom_banks == 0;
        let chr_mem = if chr_ram {
            vec![0; CHR_ROM_BANK_SIZE]
        } else {
            data[prg_end..chr_end].to_vec()
        };

        let mapper: Box<dyn Mapper> = match mapper_num {
            0 => Box::new(Mapper0::new(prg_rom_banks, chr_ram)),
            2 => Box::new(Mapper2::new(prg_rom_banks, chr_ram)),
            _ => return Err(NesError::UnsupportedMapper(mapper_num))
        };

        log::info!("PRG-ROM banks:{} CHR-ROM banks:{} {:?} Trainer?:{} Mapper:{}",
            prg_rom_banks, chr_rom_banks, mirroring, has_trainer, mapper_num);

        Ok(Self {
            mirroring,
            mapper,
            mapper_num,
            prg_rom: Arc::from(&data[prg_start..prg_end]),
            chr_mem,
        })
    }

    pub fn mapper_num(&self) -> u8 {
        self.mapper_num
    }
}

#[cfg(test)]
impl CartridgeNes {
    pub fn test_new() -> Self {
        CartridgeNes {
            mirroring: Mirroring::HORIZONTAL,
            mapper: Box::new(crate::mapper::TestMapper::new()),
            mapper_num: 0,
            prg_rom: Arc::from(Vec::new()),
            chr_mem: vec![0; CHR_ROM_BANK_SIZE],
        }
    }
}

#[cfg(test)]
pub(crate) fn ines_image(mapper_num: u8, prg_rom_banks: u8, chr_rom_banks: u8, flags6: u8) -> Vec<u8> {
    let mut data = vec![0x4E, 0x45, 0x53, 0x1A, prg_rom_banks, chr_rom_banks,
        flags6 | (mapper_num << 4), mapper_num & 0xF0];
    data.resize(INES_HEADER_SIZE, 0);
    data.resize(INES_HEADER_SIZE
        + prg_rom_banks as usize * PRG_ROM_BANK_SIZE
        + chr_rom_banks as usize * CHR_ROM_BANK_SIZE, 0);
    data
}
