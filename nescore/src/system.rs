use crate::bus::SystemBus;
use crate::cartridge::{Cartridge, CartridgeNes};
use crate::config::{EmulatorConfig, TICKS_PER_CPU_CYCLE};
use crate::cpu::{Cpu6502, CpuRegisters};
use crate::error::{NesError, Result};
use crate::input::InputDevice;
use crate::ppu::{OAMEntry, PixelSink, Ppu2C02, PpuRegisters, ATTR_TABLE_OFFSET};
use crate::snapshot::Snapshot;
use crate::sync::BurstResult;
use crate::SystemControl;

const NAME_TABLE_COLUMNS: usize = 32;

/// The console: CPU, PPU and the bus between them, driven one frame at a time
pub struct Nes {
    pub(crate) cpu: Cpu6502,
    pub(crate) bus: SystemBus,
    pub(crate) ppu: Ppu2C02,
    pub(crate) snapshot: Option<Snapshot>,

    config: EmulatorConfig,
    halted: Option<NesError>,
}

impl SystemControl for Nes {
    fn reset(&mut self) {
        self.bus.reset();
        self.ppu.reset();
        self.cpu.reset(&mut self.bus);
        self.halted = None;
    }
}

impl Nes {
    pub fn new(cartridge: Box<dyn Cartridge>, config: EmulatorConfig) -> Result<Self> {
        let mut bus = SystemBus::new(cartridge);
        if let Some(code) = &config.game_genie {
            bus.set_game_genie(code)?;
        }

        let mut cpu = Cpu6502::new();
        cpu.set_illegal_opcodes(config.illegal_opcodes);

        let mut nes = Self {
            cpu,
            bus,
            ppu: Ppu2C02::new(),
            snapshot: None,

            config,
            halted: None,
        };
        nes.reset();

        Ok(nes)
    }

    pub fn from_ines_bytes(data: &[u8], config: EmulatorConfig) -> Result<Self> {
        let cartridge = CartridgeNes::from_ines_bytes(data)?;

        Self::new(Box::new(cartridge), config)
    }

    /// Emulates one frame: the render phase in lockstep with the PPU, then vblank.
    /// Once the CPU halts, this and every later call return the halt.
    pub fn run_frame(&mut self, sink: &mut dyn PixelSink) -> Result<()> {
        if let Some(err) = &self.halted {
            return Err(err.clone());
        }

        let render_cycles = self.config.render_cycles;

        self.cpu.begin_frame();
        self.cpu.set_awaiting_sync(self.config.cpu_ppu_sync);
        self.ppu.begin_frame();

        while self.cpu.cycles() < render_cycles {
            let budget = render_cycles - self.cpu.cycles();

            match self.cpu.execute_cycles(&mut self.bus, budget) {
                BurstResult::Completed => {}
                BurstResult::NeedsSync => {
                    let target = self.cpu.cycles() * TICKS_PER_CPU_CYCLE;
                    self.ppu.run_until(target, &mut self.bus, sink);

                    log::trace!(target: "sync", "PPU caught up: cycle {} tick {} ({}, {})",
                        self.cpu.cycles(), self.ppu.ticks_frame(), self.ppu.scanline(), self.ppu.tick());
                }
                BurstResult::Halted { pc } => return Err(self.halt(pc)),
            }
        }

        self.ppu.run_until(self.config.render_ticks(), &mut self.bus, sink);

        // the PPU sits idle through vblank
        self.cpu.set_awaiting_sync(false);

        match self.cpu.execute_cycles(&mut self.bus, self.config.vblank_cycles) {
            BurstResult::Halted { pc } => Err(self.halt(pc)),
            _ => Ok(()),
        }
    }

    fn halt(&mut self, pc: u16) -> NesError {
        let err = NesError::CpuHalted { pc, cycles: self.cpu.total_cycles() };
        self.halted = Some(err.clone());

        err
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn connect_input(&mut self, port: usize, device: Box<dyn InputDevice>) {
        self.bus.connect_input(port, device);
    }

    pub fn disconnect_input(&mut self, port: usize) -> Option<Box<dyn InputDevice>> {
        self.bus.disconnect_input(port)
    }

    pub fn set_game_genie(&mut self, code: &str) -> Result<()> {
        self.bus.set_game_genie(code)
    }

    pub fn clear_game_genie(&mut self) {
        self.bus.clear_game_genie();
    }

    pub fn cpu_registers(&self) -> CpuRegisters {
        self.cpu.registers()
    }

    pub fn ppu_registers(&self) -> PpuRegisters {
        self.ppu.registers(&self.bus.ppu_bus)
    }

    pub fn oam_entry(&self, index: usize) -> OAMEntry {
        self.bus.ppu_bus.read_oam_entry(index)
    }

    /// Tile index and 2-bit palette of one background cell
    pub fn nametable_tile(&self, table: usize, column: usize, row: usize) -> (u8, u8) {
        let ppu_bus = &self.bus.ppu_bus;

        let tile = ppu_bus.name_table_byte(table, row * NAME_TABLE_COLUMNS + column);

        // each attribute byte covers 4x4 tiles, two bits per 2x2 quadrant
        let attr = ppu_bus.name_table_byte(table, ATTR_TABLE_OFFSET + (row / 4) * 8 + column / 4);
        let shift = ((row & 0x02) << 1) | (column & 0x02);

        (tile, (attr >> shift) & 0x03)
    }

    /// CPU-space read with no side effects
    pub fn peek(&self, addr: u16) -> u8 {
        self.bus.peek(addr)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cartridge::ines_image;
    use crate::ppu::FrameBuffer;

    const PRG_START: usize = 0x10;

    /// NROM image with the given code placed in CPU space and the reset vector at 0x8000
    pub(crate) fn test_rom(code: &[(u16, &[u8])]) -> Vec<u8> {
        let mut data = ines_image(0, 2, 1, 0);

        let mut place = |addr: u16, bytes: &[u8]| {
            let start = PRG_START + (addr - 0x8000) as usize;
            data[start..start + bytes.len()].copy_from_slice(bytes);
        };

        place(0xFFFC, &[0x00, 0x80]);
        for &(addr, bytes) in code {
            place(addr, bytes);
        }

        data
    }

    /// Enables NMI, counts frames in 0x0011 from the handler and spins on 0x0010
    pub(crate) fn counter_rom() -> Vec<u8> {
        test_rom(&[
            (0x8000, &[
                0xA9, 0x80,       // LDA #$80
                0x8D, 0x00, 0x20, // STA $2000
                0xEE, 0x10, 0x00, // INC $0010
                0x4C, 0x05, 0x80, // JMP $8005
            ]),
            (0x9000, &[
                0xEE, 0x11, 0x00, // INC $0011
                0x40,             // RTI
            ]),
            (0xFFFA, &[0x00, 0x90]),
        ])
    }

    #[test]
    fn test_nmi_once_per_frame() {
        let mut nes = Nes::from_ines_bytes(&counter_rom(), EmulatorConfig::default()).unwrap();
        let mut frame = FrameBuffer::new();

        nes.run_frame(&mut frame).unwrap();
        assert_eq!(nes.peek(0x0011), 1);
        assert_eq!(frame.frame_count(), 1);

        nes.run_frame(&mut frame).unwrap();
        nes.run_frame(&mut frame).unwrap();
        assert_eq!(nes.peek(0x0011), 3);
        assert_eq!(frame.frame_count(), 3);
    }

    #[test]
    fn test_halt_is_latched() {
        let rom = test_rom(&[(0x8000, &[0xEA, 0xEA, 0x02])]);
        let mut nes = Nes::from_ines_bytes(&rom, EmulatorConfig::default()).unwrap();
        let mut frame = FrameBuffer::new();

        let err = NesError::CpuHalted { pc: 0x8002, cycles: 11 };
        assert_eq!(nes.run_frame(&mut frame), Err(err.clone()));
        assert!(nes.is_halted());
        assert_eq!(nes.run_frame(&mut frame), Err(err));

        nes.reset();
        assert!(!nes.is_halted());
        assert_eq!(nes.cpu_registers().pc, 0x8000);
    }

    #[test]
    fn test_ppu_catches_up_before_register_access() {
        // ten NOPs, then a PPU register write, then JAM
        let mut code = vec![0xEA; 10];
        code.extend_from_slice(&[0x8D, 0x00, 0x20, 0x02]);
        let rom = test_rom(&[(0x8000, code.as_slice())]);

        let mut frame = FrameBuffer::new();

        let mut nes = Nes::from_ines_bytes(&rom, EmulatorConfig::default()).unwrap();
        assert!(nes.run_frame(&mut frame).is_err());
        let regs = nes.ppu_registers();
        assert_eq!((regs.scanline, regs.tick), (261, 20 * TICKS_PER_CPU_CYCLE));

        let config = EmulatorConfig { cpu_ppu_sync: false, ..EmulatorConfig::default() };
        let mut nes = Nes::from_ines_bytes(&rom, config).unwrap();
        assert!(nes.run_frame(&mut frame).is_err());
        let regs = nes.ppu_registers();
        assert_eq!((regs.scanline, regs.tick), (261, 0));
    }

    #[test]
    fn test_illegal_opcodes_can_be_disabled() {
        // LAX $10
        let rom = test_rom(&[(0x8000, &[0xA7, 0x10, 0x4C, 0x00, 0x80])]);
        let mut frame = FrameBuffer::new();

        let mut nes = Nes::from_ines_bytes(&rom, EmulatorConfig::default()).unwrap();
        assert_eq!(nes.run_frame(&mut frame), Ok(()));

        let config = EmulatorConfig { illegal_opcodes: false, ..EmulatorConfig::default() };
        let mut nes = Nes::from_ines_bytes(&rom, config).unwrap();
        assert!(matches!(nes.run_frame(&mut frame), Err(NesError::CpuHalted { pc: 0x8000, .. })));
    }

    #[test]
    fn test_game_genie_from_config() {
        let config = EmulatorConfig { game_genie: Some(String::from("GOSSIP")), ..EmulatorConfig::default() };
        let nes = Nes::from_ines_bytes(&counter_rom(), config).unwrap();
        assert_eq!(nes.peek(0xD1DD), 0x14);

        let config = EmulatorConfig { game_genie: Some(String::from("NOPE")), ..EmulatorConfig::default() };
        assert!(matches!(Nes::from_ines_bytes(&counter_rom(), config), Err(NesError::InvalidGameGenieCode(_))));
    }

    #[test]
    fn test_nametable_tile() {
        let mut nes = Nes::from_ines_bytes(&counter_rom(), EmulatorConfig::default()).unwrap();

        let bus = &mut nes.bus;
        bus.ppu_bus.ppu_write(0x2000 + 33, 0x42, bus.cartridge.as_mut());
        bus.ppu_bus.ppu_write(0x23C0, 0b11100100, bus.cartridge.as_mut());

        assert_eq!(nes.nametable_tile(0, 1, 1), (0x42, 0));
        assert_eq!(nes.nametable_tile(0, 2, 0).1, 1);
        assert_eq!(nes.nametable_tile(0, 0, 2).1, 2);
        assert_eq!(nes.nametable_tile(0, 3, 3).1, 3);

        // horizontal mirroring: table 1 is table 0
        assert_eq!(nes.nametable_tile(1, 1, 1), (0x42, 0));
    }

    #[test]
    fn test_reset_state() {
        let nes = Nes::from_ines_bytes(&counter_rom(), EmulatorConfig::default()).unwrap();

        let regs = nes.cpu_registers();
        assert_eq!((regs.pc, regs.sp, regs.p), (0x8000, 0xFD, 0x24));

        let ppu = nes.ppu_registers();
        assert_eq!(ppu.status & 0x80, 0x80);
        assert_eq!(ppu.ctrl, 0x00);
    }
}
