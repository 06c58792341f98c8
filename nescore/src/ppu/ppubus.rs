use serde::{Deserialize, Serialize};

use crate::cartridge::{Cartridge, Mirroring};
use crate::SystemControl;

use super::registers::{LoopyPpuReg, PpuCtrl, PpuMask, PpuStatus};

const PATTERN_TABLE_START: u16 = 0x0000;
const PATTERN_TABLE_END: u16 = 0x1FFF;

pub const NAME_TABLE_START: u16 = 0x2000;
const NAME_TABLE_END: u16 = 0x3EFF;
pub const ATTR_TABLE_OFFSET: usize = 0x3C0;

pub const PALETTE_TABLE_START: u16 = 0x3F00;
const PALETTE_TABLE_END: u16 = 0x3FFF;

const PALETTE_TABLE_SIZE: usize = 0x20;
pub const NAME_TABLE_SIZE: usize = 0x400;
pub const OAM_SIZE: usize = 0x100;

/// One of the 64 sprites in OAM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAMEntry {
    pub y: u8,
    pub id: u8,
    pub attributes: u8,
    pub x: u8,
}

impl Default for OAMEntry {
    fn default() -> Self {
        Self {
            y: 0xFF,
            id: 0xFF,
            attributes: 0xFF,
            x: 0xFF
        }
    }
}

impl OAMEntry {
    pub fn y_flipped(&self) -> bool {
        self.attributes & 0x80 != 0
    }

    pub fn x_flipped(&self) -> bool {
        self.attributes & 0x40 != 0
    }

    /// True when the sprite is drawn behind an opaque background
    pub fn behind_bg(&self) -> bool {
        self.attributes & 0x20 != 0
    }

    pub fn palette(&self) -> u8 {
        self.attributes & 0x03
    }
}

/// PPU-side memory (nametables, palettes, OAM) plus the CPU-visible register file
#[derive(Clone, Serialize, Deserialize)]
pub struct PpuBus {
    name_table: Vec<u8>,
    palette_table: [u8; PALETTE_TABLE_SIZE],
    oam: Vec<u8>,

    mirroring: Mirroring,
    name_table_map: [usize; 4],

    pub ctrl: PpuCtrl,
    pub mask: PpuMask,
    pub status: PpuStatus,
    pub oam_addr_reg: u8,

    // Loopy Registers
    pub vram_addr: LoopyPpuReg,
    pub tram_addr: LoopyPpuReg,
    pub fine_x: u8,

    ppu_addr_latch: bool,
    ppu_data_buffer: u8,
    last_written: u8,

    nmi_pending: bool,
}

impl SystemControl for PpuBus {
    fn reset(&mut self) {
        self.ctrl = PpuCtrl::empty();
        self.mask = PpuMask::empty();
        self.status = PpuStatus::IN_VBLANK;
        self.oam_addr_reg = 0;

        self.vram_addr = LoopyPpuReg::default();
        self.tram_addr = LoopyPpuReg::default();
        self.fine_x = 0;

        self.ppu_addr_latch = false;
        self.ppu_data_buffer = 0;
        self.last_written = 0;
        self.nmi_pending = false;
    }
}

impl PpuBus {
    pub fn new(mirroring: Mirroring) -> Self {
        Self {
            name_table: vec![0; NAME_TABLE_SIZE * 4],
            palette_table: [0; PALETTE_TABLE_SIZE],
            oam: vec![0; OAM_SIZE],

            mirroring,
            name_table_map: mirroring.nametable_map(),

            ctrl: PpuCtrl::empty(),
            mask: PpuMask::empty(),
            status: PpuStatus::IN_VBLANK,
            oam_addr_reg: 0,

            vram_addr: LoopyPpuReg::default(),
            tram_addr: LoopyPpuReg::default(),
            fine_x: 0,

            ppu_addr_latch: false,
            ppu_data_buffer: 0,
            last_written: 0,

            nmi_pending: false,
        }
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn set_mirroring(&mut self, mirroring: Mirroring) {
        self.mirroring = mirroring;
        self.name_table_map = mirroring.nametable_map();
    }

    pub fn read_oam(&self, addr: usize) -> u8 {
        self.oam[addr & 0xFF]
    }

    pub fn read_oam_entry(&self, index: usize) -> OAMEntry {
        let oam_pos = (index & 0x3F) << 2;

        OAMEntry {
            y:          self.oam[oam_pos],
            id:         self.oam[oam_pos + 1],
            attributes: self.oam[oam_pos + 2],
            x:          self.oam[oam_pos + 3],
        }
    }

    /// Copies a full page into OAM, starting at the current OAM address
    pub fn oam_dma(&mut self, page: &[u8; OAM_SIZE]) {
        for (i, &byte) in page.iter().enumerate() {
            self.oam[(self.oam_addr_reg as usize + i) & 0xFF] = byte;
        }
    }

    /// Shared first/second write toggle of PPUSCROLL and PPUADDR
    pub fn write_toggle(&self) -> bool {
        self.ppu_addr_latch
    }

    /// Consumes a pending NMI, if the PPU raised one
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_pending)
    }

    pub(super) fn enter_vblank(&mut self) {
        self.status.insert(PpuStatus::IN_VBLANK);

        if self.ctrl.nmi_enabled() {
            self.nmi_pending = true;
        }
    }

    // CPU can only access the PPU memory map through the PPU registers
    pub fn cpu_read_reg(&mut self, addr: u16, cartridge: &dyn Cartridge) -> u8 {
        match addr & 0x0007 {
            0x0002 => {
                let ret = self.peek_reg(addr, cartridge);

                self.status.remove(PpuStatus::IN_VBLANK);
                self.ppu_addr_latch = false;

                ret
            },
            0x0004 => self.oam[self.oam_addr_reg as usize],
            0x0007 => {
                let mut ret = self.ppu_data_buffer;

                if (self.vram_addr.0 & 0x3FFF) >= PALETTE_TABLE_START {
                    // palette reads skip the buffer; it is refilled from the nametable underneath
                    ret = self.ppu_read(self.vram_addr.0, cartridge);
                    self.ppu_data_buffer = self.ppu_read(self.vram_addr.0 - 0x1000, cartridge);
                } else {
                    self.ppu_data_buffer = self.ppu_read(self.vram_addr.0, cartridge);
                }

                self.increment_vram_addr();

                ret
            },
            // write-only registers
            _ => 0
        }
    }

    /// Register value as the CPU would read it, without the read side effects
    pub fn peek_reg(&self, addr: u16, cartridge: &dyn Cartridge) -> u8 {
        match addr & 0x0007 {
            0x0002 => (self.status.bits() & 0b11100000) | (self.last_written & 0b00011111),
            0x0004 => self.oam[self.oam_addr_reg as usize],
            0x0007 => {
                if (self.vram_addr.0 & 0x3FFF) >= PALETTE_TABLE_START {
                    self.ppu_read(self.vram_addr.0, cartridge)
                } else {
                    self.ppu_data_buffer
                }
            },
            _ => 0
        }
    }

    pub fn cpu_write_reg(&mut self, addr: u16, byte: u8, cartridge: &mut dyn Cartridge) {
        self.last_written = byte;

        match addr & 0x0007 {
            0x0000 => {
                let nmi_was_enabled = self.ctrl.nmi_enabled();
                self.ctrl = PpuCtrl::from_bits_truncate(byte);

                self.tram_addr.set_name_table_x(self.ctrl.name_table_x());
                self.tram_addr.set_name_table_y(self.ctrl.name_table_y());

                if !nmi_was_enabled && self.ctrl.nmi_enabled() && self.status.in_vblank() {
                    self.nmi_pending = true;
                }
            },
            0x0001 => {
                self.mask = PpuMask::from_bits_truncate(byte);
            },
            0x0002 => {},
            0x0003 => {
                self.oam_addr_reg = byte;
            },
            0x0004 => {
                self.oam[self.oam_addr_reg as usize] = byte;
                self.oam_addr_reg = self.oam_addr_reg.wrapping_add(1);
            },
            0x0005 => {
                if !self.ppu_addr_latch {
                    self.fine_x = byte & 0x07;
                    self.tram_addr.set_coarse_x((byte as u16) >> 3);
                } else {
                    self.tram_addr.set_fine_y((byte as u16) & 0x07);
                    self.tram_addr.set_coarse_y((byte as u16) >> 3);
                }

                self.ppu_addr_latch = !self.ppu_addr_latch;
            }
            0x0006 => {
                if !self.ppu_addr_latch {
                    self.tram_addr.0 = (((byte & 0x3F) as u16) << 8) | (self.tram_addr.0 & 0x00FF);
                } else {
                    self.tram_addr.0 = (self.tram_addr.0 & 0x7F00) | (byte as u16);
                    self.vram_addr = self.tram_addr;
                }

                self.ppu_addr_latch = !self.ppu_addr_latch;
            }
            _ => {
                self.ppu_write(self.vram_addr.0, byte, cartridge);
                self.increment_vram_addr();
            }
        }
    }

    #[inline]
    fn increment_vram_addr(&mut self) {
        self.vram_addr.0 = self.vram_addr.0.wrapping_add(self.ctrl.vram_addr_inc()) & 0x7FFF;
    }

    pub fn ppu_read(&self, addr: u16, cartridge: &dyn Cartridge) -> u8 {
        let addr = addr & 0x3FFF;

        match addr {
            PATTERN_TABLE_START..=PATTERN_TABLE_END => cartridge.read_pattern(addr),
            NAME_TABLE_START..=NAME_TABLE_END => self.name_table[self.name_table_index(addr)],
            PALETTE_TABLE_START..=PALETTE_TABLE_END => {
                self.palette_table[palette_index(addr)] & if self.mask.greyscale_on() { 0x30 } else { 0x3F }
            }
            _ => 0
        }
    }

    pub fn ppu_write(&mut self, addr: u16, byte: u8, cartridge: &mut dyn Cartridge) {
        let addr = addr & 0x3FFF;

        match addr {
            PATTERN_TABLE_START..=PATTERN_TABLE_END => cartridge.write_pattern(addr, byte),
            NAME_TABLE_START..=NAME_TABLE_END => {
                let index = self.name_table_index(addr);
                self.name_table[index] = byte;
            },
            PALETTE_TABLE_START..=PALETTE_TABLE_END => {
                self.palette_table[palette_index(addr)] = byte & 0x3F;
            }
            _ => {}
        }
    }

    /// Colour index (0-63) for a palette entry; entry 0 of every palette is the backdrop
    #[inline]
    pub fn palette_colour(&self, palette: u8, pixel: u8) -> u8 {
        let index = if pixel == 0 { 0 } else { ((palette as usize) << 2) | pixel as usize };

        self.palette_table[index & 0x1F] & if self.mask.greyscale_on() { 0x30 } else { 0x3F }
    }

    /// Raw byte in one of the four logical nametables, mirroring applied
    pub fn name_table_byte(&self, table: usize, offset: usize) -> u8 {
        self.name_table[self.name_table_map[table & 0x03] * NAME_TABLE_SIZE + (offset & 0x3FF)]
    }

    #[inline]
    fn name_table_index(&self, addr: u16) -> usize {
        let table = ((addr >> 10) & 0x03) as usize;

        self.name_table_map[table] * NAME_TABLE_SIZE + (addr & 0x3FF) as usize
    }
}

// 0x3F10/0x3F14/0x3F18/0x3F1C share storage with the background entries
#[inline]
fn palette_index(addr: u16) -> usize {
    let addr = (addr & 0x001F) as usize;

    if addr & 0x13 == 0x10 {
        addr - 0x10
    } else {
        addr
    }
}
