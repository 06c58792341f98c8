use serde::{Deserialize, Serialize};

const PATTERN_TABLE_1_ADDR: u16 = 0x0000;
const PATTERN_TABLE_2_ADDR: u16 = 0x1000;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PpuCtrl: u8 {
        const NAME_TABLE_X     = 0b00000001;
        const NAME_TABLE_Y     = 0b00000010;
        const VRAM_ADDR_INC    = 0b00000100;
        const SPR_PATTERN_ADDR = 0b00001000;
        const BG_PATTERN_ADDR  = 0b00010000;
        const SPR_SIZE         = 0b00100000;
        const MASTER_SELECT    = 0b01000000;
        const NMI_ENABLED      = 0b10000000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PpuMask: u8 {
        const GREYSCALE_ON  = 0b00000001;
        const SHOW_BG_LEFT  = 0b00000010;
        const SHOW_SPR_LEFT = 0b00000100;
        const SHOW_BG       = 0b00001000;
        const SHOW_SPR      = 0b00010000;
        const EMP_RED       = 0b00100000;
        const EMP_GREEN     = 0b01000000;
        const EMP_BLUE      = 0b10000000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PpuStatus: u8 {
        const SPR_OVERFLOW = 0b00100000;
        const SPR_0_HIT    = 0b01000000;
        const IN_VBLANK    = 0b10000000;
    }
}

impl PpuCtrl {
    #[inline]
    pub fn name_table_x(&self) -> bool {
        self.contains(PpuCtrl::NAME_TABLE_X)
    }

    #[inline]
    pub fn name_table_y(&self) -> bool {
        self.contains(PpuCtrl::NAME_TABLE_Y)
    }

    #[inline]
    pub fn vram_addr_inc(&self) -> u16 {
        if self.contains(PpuCtrl::VRAM_ADDR_INC) {
            32
        } else {
            1
        }
    }

    #[inline]
    pub fn spr_pattern_addr(&self) -> u16 {
        if self.contains(PpuCtrl::SPR_PATTERN_ADDR) {
            PATTERN_TABLE_2_ADDR
        } else {
            PATTERN_TABLE_1_ADDR
        }
    }

    #[inline]
    pub fn bg_pattern_addr(&self) -> u16 {
        if self.contains(PpuCtrl::BG_PATTERN_ADDR) {
            PATTERN_TABLE_2_ADDR
        } else {
            PATTERN_TABLE_1_ADDR
        }
    }

    #[inline]
    pub fn spr_height(&self) -> u16 {
        if self.contains(PpuCtrl::SPR_SIZE) {
            16
        } else {
            8
        }
    }

    #[inline]
    pub fn nmi_enabled(&self) -> bool {
        self.contains(PpuCtrl::NMI_ENABLED)
    }
}

impl PpuMask {
    #[inline]
    pub fn greyscale_on(&self) -> bool {
        self.contains(PpuMask::GREYSCALE_ON)
    }

    #[inline]
    pub fn show_bg_left(&self) -> bool {
        self.contains(PpuMask::SHOW_BG_LEFT)
    }

    #[inline]
    pub fn show_spr_left(&self) -> bool {
        self.contains(PpuMask::SHOW_SPR_LEFT)
    }

    #[inline]
    pub fn show_bg(&self) -> bool {
        self.contains(PpuMask::SHOW_BG)
    }

    #[inline]
    pub fn show_spr(&self) -> bool {
        self.contains(PpuMask::SHOW_SPR)
    }

    #[inline]
    pub fn rendering(&self) -> bool {
        self.show_bg() || self.show_spr()
    }
}

impl PpuStatus {
    #[inline]
    pub fn in_vblank(&self) -> bool {
        self.contains(PpuStatus::IN_VBLANK)
    }
}

/// One of the 15-bit VRAM address registers (v and t)
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopyPpuReg(pub u16);

// Credits to Loopy: https://www.nesdev.org/wiki/PPU_scrolling
impl LoopyPpuReg {
    pub const COARSE_X: u16     = 0b0000000000011111;
    pub const COARSE_Y: u16     = 0b0000001111100000;
    pub const NAME_TABLE_X: u16 = 0b0000010000000000;
    pub const NAME_TABLE_Y: u16 = 0b0000100000000000;
    pub const FINE_Y: u16       = 0b0111000000000000;

    #[inline]
    pub fn increment_horizontal(&mut self) {
        if self.coarse_x() >= 31 {
            self.set_coarse_x(0);
            self.set_name_table_x(!self.name_table_x());
        } else {
            self.set_coarse_x(self.coarse_x() + 1);
        }
    }

    #[inline]
    pub fn set_horizontal_to_tram(&mut self, tram_addr: &LoopyPpuReg) {
        self.set_name_table_x(tram_addr.name_table_x());
        self.set_coarse_x(tram_addr.coarse_x());
    }

    #[inline]
    pub fn increment_vertical(&mut self) {
        if self.fine_y() >= 7 {
            self.set_fine_y(0);

            if self.coarse_y() == 29 {
                self.set_coarse_y(0);
                self.set_name_table_y(!self.name_table_y());

            } else if self.coarse_y() == 31 {
                // attribute rows: wrap without switching nametable
                self.set_coarse_y(0);

            } else {
                self.set_coarse_y(self.coarse_y() + 1)
            }

        } else {
            self.set_fine_y(self.fine_y() + 1)
        }
    }

    #[inline]
    pub fn set_vertical_to_tram(&mut self, tram_addr: &LoopyPpuReg) {
        self.set_name_table_y(tram_addr.name_table_y());
        self.set_coarse_y(tram_addr.coarse_y());
        self.set_fine_y(tram_addr.fine_y());
    }

    /// Address of the nametable byte for the tile under v
    #[inline]
    pub fn tile_addr(&self) -> u16 {
        0x2000 | (self.0 & 0x0FFF)
    }

    /// Address of the attribute byte covering the tile under v
    #[inline]
    pub fn attribute_addr(&self) -> u16 {
        0x23C0 | (self.0 & 0x0C00) | ((self.0 >> 4) & 0x38) | ((self.0 >> 2) & 0x07)
    }

    /// Bit offset of the tile's 2-bit palette inside its attribute byte
    #[inline]
    pub fn attribute_shift(&self) -> u16 {
        ((self.coarse_y() & 0x02) << 1) | (self.coarse_x() & 0x02)
    }

    #[inline]
    pub fn coarse_x(&self) -> u16 {
        self.get_mask(LoopyPpuReg::COARSE_X)
    }

    #[inline]
    pub fn coarse_y(&self) -> u16 {
        self.get_mask(LoopyPpuReg::COARSE_Y)
    }

    #[inline]
    pub fn name_table_x(&self) -> bool {
        self.get_mask(LoopyPpuReg::NAME_TABLE_X) != 0
    }

    #[inline]
    pub fn name_table_y(&self) -> bool {
        self.get_mask(LoopyPpuReg::NAME_TABLE_Y) != 0
    }

    #[inline]
    pub fn fine_y(&self) -> u16 {
        self.get_mask(LoopyPpuReg::FINE_Y)
    }

    #[inline]
    pub fn set_coarse_x(&mut self, val: u16) {
        self.set_mask(LoopyPpuReg::COARSE_X, val);
    }

    #[inline]
    pub fn set_coarse_y(&mut self, val: u16) {
        self.set_mask(LoopyPpuReg::COARSE_Y, val);
    }

    #[inline]
    pub fn set_name_table_x(&mut self, val: bool) {
        self.set_mask(LoopyPpuReg::NAME_TABLE_X, val as u16);
    }

    #[inline]
    pub fn set_name_table_y(&mut self, val: bool) {
        self.set_mask(LoopyPpuReg::NAME_TABLE_Y, val as u16);
    }

    #[inline]
    pub fn set_fine_y(&mut self, val: u16) {
        self.set_mask(LoopyPpuReg::FINE_Y, val)
    }

    #[inline]
    pub fn set_mask(&mut self, mask: u16, val: u16) {
        self.0 &= !mask;
        self.0 |= (val << mask.trailing_zeros()) & mask
    }

    #[inline]
    pub fn get_mask(&self, mask: u16) -> u16 {
        (self.0 & mask) >> mask.trailing_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_wrap() {
        let mut v = LoopyPpuReg(0);
        v.set_coarse_x(30);

        v.increment_horizontal();
        assert_eq!(v.coarse_x(), 31);
        assert!(!v.name_table_x());

        v.increment_horizontal();
        assert_eq!(v.coarse_x(), 0);
        assert!(v.name_table_x());

        for _ in 0..32 {
            v.increment_horizontal();
        }
        assert_eq!(v.coarse_x(), 0);
        assert!(!v.name_table_x());
    }

    #[test]
    fn test_vertical_wrap() {
        let mut v = LoopyPpuReg(0);
        v.set_fine_y(7);
        v.set_coarse_y(29);

        v.increment_vertical();
        assert_eq!(v.fine_y(), 0);
        assert_eq!(v.coarse_y(), 0);
        assert!(v.name_table_y());

        // fine y counts up to 7 before coarse y moves
        v.increment_vertical();
        assert_eq!(v.fine_y(), 1);
        assert_eq!(v.coarse_y(), 0);
    }

    #[test]
    fn test_vertical_out_of_range_wrap() {
        let mut v = LoopyPpuReg(0);
        v.set_fine_y(7);
        v.set_coarse_y(31);
        v.set_name_table_y(true);

        v.increment_vertical();
        assert_eq!(v.coarse_y(), 0);
        assert!(v.name_table_y());

        v.set_fine_y(7);
        v.set_coarse_y(30);
        v.increment_vertical();
        assert_eq!(v.coarse_y(), 31);
        assert!(v.name_table_y());
    }

    #[test]
    fn test_tram_copies() {
        let mut t = LoopyPpuReg(0);
        t.set_coarse_x(5);
        t.set_coarse_y(12);
        t.set_fine_y(3);
        t.set_name_table_x(true);
        t.set_name_table_y(true);

        let mut v = LoopyPpuReg(0);
        v.set_horizontal_to_tram(&t);
        assert_eq!(v.0, 0x0405);

        v.set_vertical_to_tram(&t);
        assert_eq!(v, t);
    }

    #[test]
    fn test_attribute_lookup() {
        let mut v = LoopyPpuReg(0);
        v.set_coarse_x(6);
        v.set_coarse_y(10);
        v.set_name_table_x(true);

        assert_eq!(v.tile_addr(), 0x2400 | (10 << 5) | 6);
        assert_eq!(v.attribute_addr(), 0x27C0 | (2 << 3) | 1);
        assert_eq!(v.attribute_shift(), 6);
    }
}
