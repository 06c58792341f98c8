use crate::SystemControl;

use super::Mapper;

/// Flat 64KB of writable memory behind every cartridge address
#[derive(Clone)]
pub struct TestMapper {
    prg_ram: Vec<u8>,
}

impl SystemControl for TestMapper {
    fn reset(&mut self) {}
}

impl Mapper for TestMapper {
    fn mapped_cpu_read(&self, _prg_rom: &[u8], addr: u16) -> Option<u8> {
        Some(self.prg_ram[addr as usize])
    }

    fn mapped_cpu_write(&mut self, addr: u16, byte: u8) -> bool {
        self.prg_ram[addr as usize] = byte;
        true
    }

    fn mapped_ppu_read(&self, chr_mem: &[u8], addr: u16) -> u8 {
        chr_mem[addr as usize % chr_mem.len()]
    }

    fn mapped_ppu_write(&mut self, chr_mem: &mut [u8], addr: u16, byte: u8) {
        let len = chr_mem.len();
        chr_mem[addr as usize % len] = byte;
    }

    fn box_clone(&self) -> Box<dyn Mapper> {
        Box::new(self.clone())
    }
}

impl TestMapper {
    pub fn new() -> Self {
        Self {
            prg_ram: vec![0; 0x10000],
        }
    }
}
