mod frame;
mod ppubus;
mod registers;

pub use frame::{FrameBuffer, PixelSink};
pub use ppubus::{OAMEntry, PpuBus, ATTR_TABLE_OFFSET};
pub use registers::PpuStatus;

use serde::{Deserialize, Serialize};

use crate::bus::SystemBus;
use crate::config::{SCANLINES_PER_FRAME, TICKS_PER_SCANLINE};
use crate::SystemControl;

const SPRITE_CACHE_SIZE: usize = 8;

const OAM_SPRITES: u32 = 64;

/// First row of pixels are rendered in this scanline
const S_RENDER_START: u32 = 0;

/// Last row of pixels are rendered in this scanline
const S_RENDER_END: u32 = 239;

/// Idle scanline that occurs between rendering and VBLANK
const S_POST_RENDER: u32 = 240;

/// First scanline of the VBLANK Period
const S_VBLANK_START: u32 = 241;

/// Last scanline of VBLANK
const S_VBLANK_END: u32 = 260;

/// Does not render any pixels, but still prefetches the first two tiles
const S_PRE_RENDER: u32 = 261;

/// Tick on which secondary OAM is cleared before evaluation
const C_SPRITE_CLEAR: u32 = 64;

/// Odd ticks in this range each evaluate one OAM entry
const C_SPRITE_EVAL_START: u32 = 65;
const C_SPRITE_EVAL_END: u32 = C_SPRITE_EVAL_START + 2 * (OAM_SPRITES - 1);

/// Last tick that outputs a pixel
const C_RENDER_END: u32 = 256;

/// Sprite fetches for the next scanline, eight ticks per slot
const C_SPRITE_FETCH_START: u32 = 257;
const C_SPRITE_FETCH_END: u32 = 320;

/// First two tiles of the next scanline
const C_PREFETCH_START: u32 = 321;
const C_PREFETCH_END: u32 = 336;

/// Pattern bytes and output state for one of the eight sprites on a scanline
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SpriteSlot {
    patt_lo_shifter: u8,
    patt_hi_shifter: u8,
    palette: u8,
    behind_bg: bool,
    // pixels left to draw once the sprite's x position is reached
    active: u8,
    x_countdown: u8,
}

/// Row of an in-range sprite and the sprite height it was evaluated with
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SpriteRow {
    row: u8,
    height: u8,
}

/// Position and register file of the PPU, for debugging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpuRegisters {
    pub ctrl: u8,
    pub mask: u8,
    pub status: u8,
    pub oam_addr: u8,
    pub vram_addr: u16,
    pub tram_addr: u16,
    pub fine_x: u8,
    pub write_toggle: bool,
    pub scanline: u32,
    pub tick: u32,
}

/// Tick-driven picture processing unit. Holds the rendering pipeline only; the
/// memories and register file it reads live in [`PpuBus`].
#[derive(Clone, Serialize, Deserialize)]
pub struct Ppu2C02 {
    scanline: u32,
    tick: u32,
    ticks_frame: u32,

    bg_next_tile_id: u8,
    bg_next_tile_attr: u8,
    bg_next_tile_lo: u8,
    bg_next_tile_hi: u8,
    bg_patt_lo_shifter: u16,
    bg_patt_hi_shifter: u16,
    bg_attr_lo_shifter: u16,
    bg_attr_hi_shifter: u16,

    secondary_oam: [OAMEntry; SPRITE_CACHE_SIZE],
    secondary_rows: [SpriteRow; SPRITE_CACHE_SIZE],
    // sprites drawn on the current scanline
    sprite_count: usize,
    // sprites found so far for the next scanline
    next_sprite_count: usize,
    sprite_zero_line: bool,
    sprite_zero_next: bool,
    sprite_slots: [SpriteSlot; SPRITE_CACHE_SIZE],
    current_sprite: OAMEntry,
    sprite_fine_y: u16,
    sprite_height: u16,
}

impl Default for Ppu2C02 {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemControl for Ppu2C02 {
    fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Ppu2C02 {
    pub fn new() -> Self {
        Self {
            scanline: S_RENDER_START,
            tick: 0,
            ticks_frame: 0,

            bg_next_tile_id: 0,
            bg_next_tile_attr: 0,
            bg_next_tile_lo: 0,
            bg_next_tile_hi: 0,
            bg_patt_lo_shifter: 0,
            bg_patt_hi_shifter: 0,
            bg_attr_lo_shifter: 0,
            bg_attr_hi_shifter: 0,

            secondary_oam: [OAMEntry::default(); SPRITE_CACHE_SIZE],
            secondary_rows: [SpriteRow::default(); SPRITE_CACHE_SIZE],
            sprite_count: 0,
            next_sprite_count: 0,
            sprite_zero_line: false,
            sprite_zero_next: false,
            sprite_slots: [SpriteSlot::default(); SPRITE_CACHE_SIZE],
            current_sprite: OAMEntry::default(),
            sprite_fine_y: 0,
            sprite_height: 8,
        }
    }

    pub fn scanline(&self) -> u32 {
        self.scanline
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Ticks run since the last call to [`Ppu2C02::begin_frame`]
    pub fn ticks_frame(&self) -> u32 {
        self.ticks_frame
    }

    /// Moves to the start of the pre-render scanline and zeroes the frame tick counter
    pub fn begin_frame(&mut self) {
        self.scanline = S_PRE_RENDER;
        self.tick = 0;
        self.ticks_frame = 0;
    }

    /// Steps until `target` ticks have run in the current frame
    pub fn run_until(&mut self, target: u32, bus: &mut SystemBus, sink: &mut dyn PixelSink) {
        while self.ticks_frame < target {
            self.step(bus, sink);
        }
    }

    pub fn registers(&self, ppu_bus: &PpuBus) -> PpuRegisters {
        PpuRegisters {
            ctrl: ppu_bus.ctrl.bits(),
            mask: ppu_bus.mask.bits(),
            status: ppu_bus.status.bits(),
            oam_addr: ppu_bus.oam_addr_reg,
            vram_addr: ppu_bus.vram_addr.0,
            tram_addr: ppu_bus.tram_addr.0,
            fine_x: ppu_bus.fine_x,
            write_toggle: ppu_bus.write_toggle(),
            scanline: self.scanline,
            tick: self.tick,
        }
    }

    /// Advances one PPU tick, then does that tick's work
    pub fn step(&mut self, bus: &mut SystemBus, sink: &mut dyn PixelSink) {
        self.tick += 1;
        self.ticks_frame += 1;

        if self.tick >= TICKS_PER_SCANLINE {
            self.tick = 0;
            self.scanline += 1;

            if self.scanline >= SCANLINES_PER_FRAME {
                self.scanline = S_RENDER_START;
            }
        }

        match self.scanline {
            S_RENDER_START..=S_RENDER_END => self.step_visible(bus, sink),
            S_POST_RENDER => {
                if self.tick == 0 {
                    sink.frame_complete();
                }
            }
            S_VBLANK_START..=S_VBLANK_END => {
                if self.scanline == S_VBLANK_START && self.tick == 1 {
                    bus.ppu_bus.enter_vblank();
                }
            }
            _ => self.step_pre_render(bus),
        }
    }

    fn step_visible(&mut self, bus: &mut SystemBus, sink: &mut dyn PixelSink) {
        match self.tick {
            0 => {
                self.sprite_count = self.next_sprite_count;
                self.sprite_zero_line = self.sprite_zero_next;
                self.next_sprite_count = 0;
                self.sprite_zero_next = false;
            }
            1..=C_RENDER_END => {
                if self.tick == C_SPRITE_CLEAR {
                    self.secondary_oam = [OAMEntry::default(); SPRITE_CACHE_SIZE];
                    self.secondary_rows = [SpriteRow::default(); SPRITE_CACHE_SIZE];
                } else if (C_SPRITE_EVAL_START..=C_SPRITE_EVAL_END).contains(&self.tick) && self.tick & 0x01 != 0 {
                    self.evaluate_sprite(&mut bus.ppu_bus, ((self.tick - C_SPRITE_EVAL_START) >> 1) as usize);
                }

                self.render_pixel(&mut bus.ppu_bus, sink);

                if self.tick & 0x01 == 0 {
                    match ((self.tick >> 1) - 1) % 4 {
                        0 => self.fetch_tile_id(bus),
                        1 => self.fetch_tile_attr(bus),
                        2 => self.fetch_tile_lo(bus),
                        _ => {
                            self.fetch_tile_hi(bus);
                            self.load_bg_shifters();
                            Self::increment_horizontal(&mut bus.ppu_bus);
                        }
                    }
                }
            }
            C_SPRITE_FETCH_START => {
                if bus.ppu_bus.mask.rendering() {
                    bus.ppu_bus.vram_addr.increment_vertical();
                    bus.ppu_bus.vram_addr.set_horizontal_to_tram(&bus.ppu_bus.tram_addr);
                }
            }
            C_SPRITE_FETCH_START..=C_SPRITE_FETCH_END => self.fetch_sprite_slot(bus),
            C_PREFETCH_START..=C_PREFETCH_END => self.prefetch_tiles(bus),
            _ => {}
        }
    }

    fn step_pre_render(&mut self, bus: &mut SystemBus) {
        match self.tick {
            1 => {
                bus.ppu_bus.status.remove(PpuStatus::SPR_0_HIT | PpuStatus::IN_VBLANK | PpuStatus::SPR_OVERFLOW);
                self.clear_sprite_counts();
            }
            C_SPRITE_FETCH_END => {
                self.clear_sprite_counts();

                if bus.ppu_bus.mask.rendering() {
                    bus.ppu_bus.vram_addr = bus.ppu_bus.tram_addr;
                }
            }
            C_PREFETCH_START..=C_PREFETCH_END => self.prefetch_tiles(bus),
            _ => {}
        }
    }

    #[inline]
    fn clear_sprite_counts(&mut self) {
        self.sprite_count = 0;
        self.next_sprite_count = 0;
        self.sprite_zero_line = false;
        self.sprite_zero_next = false;
    }

    /// The first two tiles of the next scanline go straight into the shift registers
    fn prefetch_tiles(&mut self, bus: &mut SystemBus) {
        match self.tick {
            322 | 330 => self.fetch_tile_id(bus),
            324 | 332 => self.fetch_tile_attr(bus),
            326 | 334 => self.fetch_tile_lo(bus),
            328 => {
                self.fetch_tile_hi(bus);
                self.load_first_bg_shifters();
                Self::increment_horizontal(&mut bus.ppu_bus);
            }
            336 => {
                self.fetch_tile_hi(bus);
                self.load_bg_shifters();
                Self::increment_horizontal(&mut bus.ppu_bus);
            }
            _ => {}
        }
    }

    #[inline]
    fn increment_horizontal(ppu_bus: &mut PpuBus) {
        if ppu_bus.mask.rendering() {
            ppu_bus.vram_addr.increment_horizontal();
        }
    }

    #[inline]
    fn fetch_tile_id(&mut self, bus: &SystemBus) {
        self.bg_next_tile_id = bus.ppu_read(bus.ppu_bus.vram_addr.tile_addr());
    }

    #[inline]
    fn fetch_tile_attr(&mut self, bus: &SystemBus) {
        let vram_addr = bus.ppu_bus.vram_addr;
        let attr = bus.ppu_read(vram_addr.attribute_addr());

        self.bg_next_tile_attr = (attr >> vram_addr.attribute_shift()) & 0x03;
    }

    #[inline]
    fn bg_pattern_addr(&self, bus: &SystemBus) -> u16 {
        bus.ppu_bus.ctrl.bg_pattern_addr()
            + ((self.bg_next_tile_id as u16) << 4)
            + bus.ppu_bus.vram_addr.fine_y()
    }

    #[inline]
    fn fetch_tile_lo(&mut self, bus: &SystemBus) {
        self.bg_next_tile_lo = bus.ppu_read(self.bg_pattern_addr(bus));
    }

    #[inline]
    fn fetch_tile_hi(&mut self, bus: &SystemBus) {
        self.bg_next_tile_hi = bus.ppu_read(self.bg_pattern_addr(bus) + 8);
    }

    #[inline]
    fn load_first_bg_shifters(&mut self) {
        self.bg_patt_lo_shifter = (self.bg_next_tile_lo as u16) << 8;
        self.bg_patt_hi_shifter = (self.bg_next_tile_hi as u16) << 8;

        self.bg_attr_lo_shifter = if self.bg_next_tile_attr & 0b01 != 0 { 0xFF00 } else { 0x0000 };
        self.bg_attr_hi_shifter = if self.bg_next_tile_attr & 0b10 != 0 { 0xFF00 } else { 0x0000 };
    }

    #[inline]
    fn load_bg_shifters(&mut self) {
        self.bg_patt_lo_shifter = (self.bg_patt_lo_shifter & 0xFF00) | self.bg_next_tile_lo as u16;
        self.bg_patt_hi_shifter = (self.bg_patt_hi_shifter & 0xFF00) | self.bg_next_tile_hi as u16;

        self.bg_attr_lo_shifter = (self.bg_attr_lo_shifter & 0xFF00)
            | if self.bg_next_tile_attr & 0b01 != 0 { 0xFF } else { 0x00 };
        self.bg_attr_hi_shifter = (self.bg_attr_hi_shifter & 0xFF00)
            | if self.bg_next_tile_attr & 0b10 != 0 { 0xFF } else { 0x00 };
    }

    /// Checks one OAM entry against the current scanline and copies it into
    /// secondary OAM if it is in range
    fn evaluate_sprite(&mut self, ppu_bus: &mut PpuBus, index: usize) {
        let entry = ppu_bus.read_oam_entry(index);
        let top = entry.y as u32;
        let height = ppu_bus.ctrl.spr_height() as u32;

        if self.scanline < top || self.scanline >= top + height {
            return;
        }

        if self.next_sprite_count < SPRITE_CACHE_SIZE {
            self.secondary_oam[self.next_sprite_count] = entry;
            self.secondary_rows[self.next_sprite_count] = SpriteRow {
                row: (self.scanline - top) as u8,
                height: height as u8,
            };
            self.next_sprite_count += 1;

            if index == 0 {
                self.sprite_zero_next = true;
            }
        } else {
            ppu_bus.status.insert(PpuStatus::SPR_OVERFLOW);
        }
    }

    /// Loads the sprites found during evaluation into the output slots, one slot every eight ticks
    fn fetch_sprite_slot(&mut self, bus: &SystemBus) {
        let slot = ((self.tick - C_SPRITE_FETCH_START) / 8) as usize;

        if slot >= self.next_sprite_count {
            return;
        }

        match (self.tick - C_SPRITE_FETCH_START) % 8 {
            1 => {
                self.current_sprite = self.secondary_oam[slot];

                // PPUCTRL may have changed size since evaluation
                let SpriteRow { row, height } = self.secondary_rows[slot];
                self.sprite_height = height as u16;

                self.sprite_fine_y = if self.current_sprite.y_flipped() {
                    (height - 1 - row) as u16
                } else {
                    row as u16
                };
            }
            2 => {
                self.sprite_slots[slot].palette = self.current_sprite.palette();
                self.sprite_slots[slot].behind_bg = self.current_sprite.behind_bg();
            }
            3 => {
                let x = self.current_sprite.x;
                self.sprite_slots[slot].x_countdown = x;
                self.sprite_slots[slot].active = if x == 0 { 8 } else { 0 };
            }
            5 => {
                let byte = bus.ppu_read(self.sprite_pattern_addr(bus));
                self.sprite_slots[slot].patt_lo_shifter = self.orient(byte);
            }
            7 => {
                let byte = bus.ppu_read(self.sprite_pattern_addr(bus) + 8);
                self.sprite_slots[slot].patt_hi_shifter = self.orient(byte);
            }
            _ => {}
        }
    }

    #[inline]
    fn orient(&self, byte: u8) -> u8 {
        if self.current_sprite.x_flipped() {
            REVERSED_BYTE[byte as usize]
        } else {
            byte
        }
    }

    fn sprite_pattern_addr(&self, bus: &SystemBus) -> u16 {
        let ctrl = bus.ppu_bus.ctrl;
        let id = self.current_sprite.id as u16;

        if self.sprite_height == 16 {
            // 8x16 sprites pick their table from bit 0 of the tile id
            let table = (id & 0x01) << 12;
            let tile = (id & 0xFE) + (self.sprite_fine_y >= 8) as u16;

            table | (tile << 4) | (self.sprite_fine_y & 0x07)
        } else {
            ctrl.spr_pattern_addr() | (id << 4) | self.sprite_fine_y
        }
    }

    /// Outputs the pixel for the current tick, then advances every shift register
    fn render_pixel(&mut self, ppu_bus: &mut PpuBus, sink: &mut dyn PixelSink) {
        let x = (self.tick - 1) as usize;

        let mut bg_pixel = 0;
        let mut bg_palette = 0;

        if ppu_bus.mask.show_bg() && (ppu_bus.mask.show_bg_left() || x >= 8) {
            let bit_mux = 0x8000 >> ppu_bus.fine_x;

            let p0 = (self.bg_patt_lo_shifter & bit_mux != 0) as u8;
            let p1 = (self.bg_patt_hi_shifter & bit_mux != 0) as u8;
            bg_pixel = (p1 << 1) | p0;

            let a0 = (self.bg_attr_lo_shifter & bit_mux != 0) as u8;
            let a1 = (self.bg_attr_hi_shifter & bit_mux != 0) as u8;
            bg_palette = (a1 << 1) | a0;
        }

        let sprite = if ppu_bus.mask.show_spr() && (ppu_bus.mask.show_spr_left() || x >= 8) {
            self.sprite_pixel()
        } else {
            None
        };

        let colour = match sprite {
            Some((slot, pixel)) if !self.sprite_slots[slot].behind_bg || bg_pixel == 0 => {
                ppu_bus.palette_colour(4 + self.sprite_slots[slot].palette, pixel)
            }
            _ => ppu_bus.palette_colour(bg_palette, bg_pixel),
        };

        if let Some((0, _)) = sprite {
            if self.sprite_zero_line && bg_pixel != 0 && self.tick >= 3 {
                ppu_bus.status.insert(PpuStatus::SPR_0_HIT);
            }
        }

        sink.put_pixel(x, self.scanline as usize, colour);

        self.update_shifters();
    }

    /// First slot with an opaque pixel at the current position
    #[inline]
    fn sprite_pixel(&self) -> Option<(usize, u8)> {
        self.sprite_slots[..self.sprite_count]
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.active > 0)
            .map(|(i, slot)| {
                let p0 = (slot.patt_lo_shifter & 0x80 != 0) as u8;
                let p1 = (slot.patt_hi_shifter & 0x80 != 0) as u8;
                (i, (p1 << 1) | p0)
            })
            .find(|&(_, pixel)| pixel != 0)
    }

    #[inline]
    fn update_shifters(&mut self) {
        self.bg_patt_lo_shifter <<= 1;
        self.bg_patt_hi_shifter <<= 1;
        self.bg_attr_lo_shifter <<= 1;
        self.bg_attr_hi_shifter <<= 1;

        for slot in self.sprite_slots[..self.sprite_count].iter_mut() {
            if slot.active > 0 {
                slot.active -= 1;
                slot.patt_lo_shifter <<= 1;
                slot.patt_hi_shifter <<= 1;
            } else {
                slot.x_countdown = slot.x_countdown.wrapping_sub(1);

                if slot.x_countdown == 0 {
                    slot.active = 8;
                }
            }
        }
    }
}

lazy_static! {
    static ref REVERSED_BYTE: Vec<u8> = (0..=255u8).map(|x| {
        let x = ((x >> 1) & 0x55) | ((x & 0x55) << 1);
        let x = ((x >> 2) & 0x33) | ((x & 0x33) << 2);
        ((x >> 4) & 0x0F) | ((x & 0x0F) << 4)
    }).collect();
}
