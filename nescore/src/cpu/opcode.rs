use serde::{Deserialize, Serialize};

use crate::bus::SystemBus;

use super::{Cpu6502, Trap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddrMode {
    IMP, ACC, IMM,
    ZPG, ZPX, ZPY,
    REL, ABS, ABX,
    ABY, IND, INX, INY
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    ADC, AND, ASL, BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRK, BVC, BVS, CLC,
    CLD, CLI, CLV, CMP, CPX, CPY, DEC, DEX, DEY, EOR, INC, INX, INY, JMP,
    JSR, LDA, LDX, LDY, LSR, NOP, ORA, PHA, PHP, PLA, PLP, ROL, ROR, RTI,
    RTS, SBC, SEC, SED, SEI, STA, STX, STY, TAX, TAY, TSX, TXA, TXS, TYA,

    // Unofficial / Illegal Opcodes
    ALR, ANC, ANE, ARR, DCP, ISC, LAS, LAX, RLA, RRA, SAX, SBX, SHA,
    SHX, SHY, SLO, SRE, TAS, USBC, JAM,
}

type AddrModeFn = fn(&mut Cpu6502, &mut SystemBus) -> Result<(), Trap>;
type InstrFn = fn(&mut Cpu6502, &mut SystemBus) -> Result<u32, Trap>;

pub struct Opcode {
    pub opcode: u8,
    pub instr: Instr,
    pub addr_mode: AddrMode,
    addr_mode_fn: AddrModeFn,
    instr_fn: InstrFn,
    pub cycles: u32,
    pub illegal: bool,
}

impl Opcode {
    /// Resolves the operand, runs the handler and returns the total cycle cost
    #[inline]
    pub fn execute_op(&self, cpu: &mut Cpu6502, bus: &mut SystemBus) -> Result<u32, Trap> {
        (self.addr_mode_fn)(cpu, bus)?;
        let extra_cycles = (self.instr_fn)(cpu, bus)?;

        Ok(self.cycles + extra_cycles)
    }

    fn new(opcode: u8, addr_mode: AddrMode, instr: Instr, cycles: u32, illegal: bool) -> Self {
        let addr_mode_fn: AddrModeFn = match addr_mode {
            AddrMode::IMP => Cpu6502::imp_addressing,
            AddrMode::ACC => Cpu6502::acc_addressing,
            AddrMode::IMM => Cpu6502::imm_addressing,
            AddrMode::ZPG => Cpu6502::zpg_addressing,
            AddrMode::ZPX => Cpu6502::zpx_addressing,
            AddrMode::ZPY => Cpu6502::zpy_addressing,
            AddrMode::REL => Cpu6502::rel_addressing,
            AddrMode::ABS => Cpu6502::abs_addressing,
            AddrMode::ABX => Cpu6502::abx_addressing,
            AddrMode::ABY => Cpu6502::aby_addressing,
            AddrMode::IND => Cpu6502::ind_addressing,
            AddrMode::INX => Cpu6502::inx_addressing,
            AddrMode::INY => Cpu6502::iny_addressing,
        };

        let instr_fn: InstrFn = match instr {
            Instr::ADC => Cpu6502::add_with_carry,
            Instr::AND => Cpu6502::and_accumulator,
            Instr::ASL => Cpu6502::arithmetic_shift_left,
            Instr::BCC => Cpu6502::branch_if_carry_clear,
            Instr::BCS => Cpu6502::branch_if_carry_set,
            Instr::BEQ => Cpu6502::branch_if_equal,
            Instr::BIT => Cpu6502::bit_test,
            Instr::BMI => Cpu6502::branch_if_minus,
            Instr::BNE => Cpu6502::branch_if_not_equal,
            Instr::BPL => Cpu6502::branch_if_positive,
            Instr::BRK => Cpu6502::force_interrupt,
            Instr::BVC => Cpu6502::branch_if_overflow_clear,
            Instr::BVS => Cpu6502::branch_if_overflow_set,
            Instr::CLC => Cpu6502::clear_carry_flag,
            Instr::CLD => Cpu6502::clear_decimal_mode,
            Instr::CLI => Cpu6502::clear_interrupt_disable,
            Instr::CLV => Cpu6502::clear_overflow_flag,
            Instr::CMP => Cpu6502::compare_accumulator,
            Instr::CPX => Cpu6502::compare_x_reg,
            Instr::CPY => Cpu6502::compare_y_reg,
            Instr::DEC => Cpu6502::decrement_memory,
            Instr::DEX => Cpu6502::decrement_x_reg,
            Instr::DEY => Cpu6502::decrement_y_reg,
            Instr::EOR => Cpu6502::exclusive_or_accumulator,
            Instr::INC => Cpu6502::increment_memory,
            Instr::INX => Cpu6502::increment_x_reg,
            Instr::INY => Cpu6502::increment_y_reg,
            Instr::JMP => Cpu6502::jump,
            Instr::JSR => Cpu6502::jump_to_subroutine,
            Instr::LDA => Cpu6502::load_accumulator,
            Instr::LDX => Cpu6502::load_x_reg,
            Instr::LDY => Cpu6502::load_y_reg,
            Instr::LSR => Cpu6502::logical_shift_right,
            Instr::NOP => Cpu6502::no_operation,
            Instr::ORA => Cpu6502::or_accumulator,
            Instr::PHA => Cpu6502::push_accumulator,
            Instr::PHP => Cpu6502::push_processor_status,
            Instr::PLA => Cpu6502::pull_accumulator,
            Instr::PLP => Cpu6502::pull_processor_status,
            Instr::ROL => Cpu6502::rotate_left,
            Instr::ROR => Cpu6502::rotate_right,
            Instr::RTI => Cpu6502::return_from_interrupt,
            Instr::RTS => Cpu6502::return_from_subroutine,
            Instr::SBC => Cpu6502::subtract_with_carry,
            Instr::SEC => Cpu6502::set_carry_flag,
            Instr::SED => Cpu6502::set_decimal_mode,
            Instr::SEI => Cpu6502::set_interrupt_disable,
            Instr::STA => Cpu6502::store_accumulator,
            Instr::STX => Cpu6502::store_x_reg,
            Instr::STY => Cpu6502::store_y_reg,
            Instr::TAX => Cpu6502::transfer_accumulator_to_x,
            Instr::TAY => Cpu6502::transfer_accumulator_to_y,
            Instr::TSX => Cpu6502::transfer_stack_pointer_to_x,
            Instr::TXA => Cpu6502::transfer_x_to_accumulator,
            Instr::TXS => Cpu6502::transfer_x_to_stack_pointer,
            Instr::TYA => Cpu6502::transfer_y_to_accumulator,

            Instr::ALR => Cpu6502::alr,
            Instr::ANC => Cpu6502::anc,
            Instr::ANE => Cpu6502::ane,
            Instr::ARR => Cpu6502::arr,
            Instr::DCP => Cpu6502::dcp,
            Instr::ISC => Cpu6502::isc,
            Instr::LAS => Cpu6502::las,
            Instr::LAX => Cpu6502::lax,
            Instr::RLA => Cpu6502::rla,
            Instr::RRA => Cpu6502::rra,
            Instr::SAX => Cpu6502::sax,
            Instr::SBX => Cpu6502::sbx,
            Instr::SHA => Cpu6502::sha,
            Instr::SHX => Cpu6502::shx,
            Instr::SHY => Cpu6502::shy,
            Instr::SLO => Cpu6502::slo,
            Instr::SRE => Cpu6502::sre,
            Instr::TAS => Cpu6502::tas,
            Instr::USBC => Cpu6502::usbc,
            Instr::JAM => Cpu6502::jam,
        };

        Opcode {
            opcode,
            addr_mode,
            instr,
            addr_mode_fn,
            instr_fn,
            cycles,
            illegal,
        }
    }
}

use AddrMode::*;

/// (opcode, addressing mode, base cycles) for every encoding of an instruction
type Encodings = &'static [(u8, AddrMode, u32)];

const DOCUMENTED: &[(Instr, Encodings)] = &[
    (Instr::ADC, &[(0x69, IMM, 2), (0x65, ZPG, 3), (0x75, ZPX, 4), (0x6D, ABS, 4), (0x7D, ABX, 4), (0x79, ABY, 4), (0x61, INX, 6), (0x71, INY, 5)]),
    (Instr::AND, &[(0x29, IMM, 2), (0x25, ZPG, 3), (0x35, ZPX, 4), (0x2D, ABS, 4), (0x3D, ABX, 4), (0x39, ABY, 4), (0x21, INX, 6), (0x31, INY, 5)]),
    (Instr::ASL, &[(0x0A, ACC, 2), (0x06, ZPG, 5), (0x16, ZPX, 6), (0x0E, ABS, 6), (0x1E, ABX, 7)]),
    (Instr::BCC, &[(0x90, REL, 2)]),
    (Instr::BCS, &[(0xB0, REL, 2)]),
    (Instr::BEQ, &[(0xF0, REL, 2)]),
    (Instr::BIT, &[(0x24, ZPG, 3), (0x2C, ABS, 4)]),
    (Instr::BMI, &[(0x30, REL, 2)]),
    (Instr::BNE, &[(0xD0, REL, 2)]),
    (Instr::BPL, &[(0x10, REL, 2)]),
    // 2 when masked, the handler adds 5 when the interrupt is taken
    (Instr::BRK, &[(0x00, IMP, 2)]),
    (Instr::BVC, &[(0x50, REL, 2)]),
    (Instr::BVS, &[(0x70, REL, 2)]),
    (Instr::CLC, &[(0x18, IMP, 2)]),
    (Instr::CLD, &[(0xD8, IMP, 2)]),
    (Instr::CLI, &[(0x58, IMP, 2)]),
    (Instr::CLV, &[(0xB8, IMP, 2)]),
    (Instr::CMP, &[(0xC9, IMM, 2), (0xC5, ZPG, 3), (0xD5, ZPX, 4), (0xCD, ABS, 4), (0xDD, ABX, 4), (0xD9, ABY, 4), (0xC1, INX, 6), (0xD1, INY, 5)]),
    (Instr::CPX, &[(0xE0, IMM, 2), (0xE4, ZPG, 3), (0xEC, ABS, 4)]),
    (Instr::CPY, &[(0xC0, IMM, 2), (0xC4, ZPG, 3), (0xCC, ABS, 4)]),
    (Instr::DEC, &[(0xC6, ZPG, 5), (0xD6, ZPX, 6), (0xCE, ABS, 6), (0xDE, ABX, 7)]),
    (Instr::DEX, &[(0xCA, IMP, 2)]),
    (Instr::DEY, &[(0x88, IMP, 2)]),
    (Instr::EOR, &[(0x49, IMM, 2), (0x45, ZPG, 3), (0x55, ZPX, 4), (0x4D, ABS, 4), (0x5D, ABX, 4), (0x59, ABY, 4), (0x41, INX, 6), (0x51, INY, 5)]),
    (Instr::INC, &[(0xE6, ZPG, 5), (0xF6, ZPX, 6), (0xEE, ABS, 6), (0xFE, ABX, 7)]),
    (Instr::INX, &[(0xE8, IMP, 2)]),
    (Instr::INY, &[(0xC8, IMP, 2)]),
    (Instr::JMP, &[(0x4C, ABS, 3), (0x6C, IND, 5)]),
    (Instr::JSR, &[(0x20, ABS, 6)]),
    (Instr::LDA, &[(0xA9, IMM, 2), (0xA5, ZPG, 3), (0xB5, ZPX, 4), (0xAD, ABS, 4), (0xBD, ABX, 4), (0xB9, ABY, 4), (0xA1, INX, 6), (0xB1, INY, 5)]),
    (Instr::LDX, &[(0xA2, IMM, 2), (0xA6, ZPG, 3), (0xB6, ZPY, 4), (0xAE, ABS, 4), (0xBE, ABY, 4)]),
    (Instr::LDY, &[(0xA0, IMM, 2), (0xA4, ZPG, 3), (0xB4, ZPX, 4), (0xAC, ABS, 4), (0xBC, ABX, 4)]),
    (Instr::LSR, &[(0x4A, ACC, 2), (0x46, ZPG, 5), (0x56, ZPX, 6), (0x4E, ABS, 6), (0x5E, ABX, 7)]),
    (Instr::NOP, &[(0xEA, IMP, 2)]),
    (Instr::ORA, &[(0x09, IMM, 2), (0x05, ZPG, 3), (0x15, ZPX, 4), (0x0D, ABS, 4), (0x1D, ABX, 4), (0x19, ABY, 4), (0x01, INX, 6), (0x11, INY, 5)]),
    (Instr::PHA, &[(0x48, IMP, 3)]),
    (Instr::PHP, &[(0x08, IMP, 3)]),
    (Instr::PLA, &[(0x68, IMP, 4)]),
    (Instr::PLP, &[(0x28, IMP, 4)]),
    (Instr::ROL, &[(0x2A, ACC, 2), (0x26, ZPG, 5), (0x36, ZPX, 6), (0x2E, ABS, 6), (0x3E, ABX, 7)]),
    (Instr::ROR, &[(0x6A, ACC, 2), (0x66, ZPG, 5), (0x76, ZPX, 6), (0x6E, ABS, 6), (0x7E, ABX, 7)]),
    (Instr::RTI, &[(0x40, IMP, 6)]),
    (Instr::RTS, &[(0x60, IMP, 6)]),
    (Instr::SBC, &[(0xE9, IMM, 2), (0xE5, ZPG, 3), (0xF5, ZPX, 4), (0xED, ABS, 4), (0xFD, ABX, 4), (0xF9, ABY, 4), (0xE1, INX, 6), (0xF1, INY, 5)]),
    (Instr::SEC, &[(0x38, IMP, 2)]),
    (Instr::SED, &[(0xF8, IMP, 2)]),
    (Instr::SEI, &[(0x78, IMP, 2)]),
    (Instr::STA, &[(0x85, ZPG, 3), (0x95, ZPX, 4), (0x8D, ABS, 4), (0x9D, ABX, 5), (0x99, ABY, 5), (0x81, INX, 6), (0x91, INY, 6)]),
    (Instr::STX, &[(0x86, ZPG, 3), (0x96, ZPY, 4), (0x8E, ABS, 4)]),
    (Instr::STY, &[(0x84, ZPG, 3), (0x94, ZPX, 4), (0x8C, ABS, 4)]),
    (Instr::TAX, &[(0xAA, IMP, 2)]),
    (Instr::TAY, &[(0xA8, IMP, 2)]),
    (Instr::TSX, &[(0xBA, IMP, 2)]),
    (Instr::TXA, &[(0x8A, IMP, 2)]),
    (Instr::TXS, &[(0x9A, IMP, 2)]),
    (Instr::TYA, &[(0x98, IMP, 2)]),
];

const UNDOCUMENTED: &[(Instr, Encodings)] = &[
    (Instr::ALR, &[(0x4B, IMM, 2)]),
    (Instr::ANC, &[(0x0B, IMM, 2), (0x2B, IMM, 2)]),
    (Instr::ANE, &[(0x8B, IMM, 2)]),
    (Instr::ARR, &[(0x6B, IMM, 2)]),
    (Instr::DCP, &[(0xC7, ZPG, 5), (0xD7, ZPX, 6), (0xCF, ABS, 6), (0xDF, ABX, 7), (0xDB, ABY, 7), (0xC3, INX, 8), (0xD3, INY, 8)]),
    (Instr::ISC, &[(0xE7, ZPG, 5), (0xF7, ZPX, 6), (0xEF, ABS, 6), (0xFF, ABX, 7), (0xFB, ABY, 7), (0xE3, INX, 8), (0xF3, INY, 8)]),
    (Instr::LAS, &[(0xBB, ABY, 4)]),
    (Instr::LAX, &[(0xAB, IMM, 2), (0xA7, ZPG, 3), (0xB7, ZPY, 4), (0xAF, ABS, 4), (0xBF, ABY, 4), (0xA3, INX, 6), (0xB3, INY, 5)]),
    (Instr::RLA, &[(0x27, ZPG, 5), (0x37, ZPX, 6), (0x2F, ABS, 6), (0x3F, ABX, 7), (0x3B, ABY, 7), (0x23, INX, 8), (0x33, INY, 8)]),
    (Instr::RRA, &[(0x67, ZPG, 5), (0x77, ZPX, 6), (0x6F, ABS, 6), (0x7F, ABX, 7), (0x7B, ABY, 7), (0x63, INX, 8), (0x73, INY, 8)]),
    (Instr::SAX, &[(0x87, ZPG, 3), (0x97, ZPY, 4), (0x8F, ABS, 4), (0x83, INX, 6)]),
    (Instr::SBX, &[(0xCB, IMM, 2)]),
    (Instr::SHA, &[(0x9F, ABY, 5), (0x93, INY, 6)]),
    (Instr::SHX, &[(0x9E, ABY, 5)]),
    (Instr::SHY, &[(0x9C, ABX, 5)]),
    (Instr::SLO, &[(0x07, ZPG, 5), (0x17, ZPX, 6), (0x0F, ABS, 6), (0x1F, ABX, 7), (0x1B, ABY, 7), (0x03, INX, 8), (0x13, INY, 8)]),
    (Instr::SRE, &[(0x47, ZPG, 5), (0x57, ZPX, 6), (0x4F, ABS, 6), (0x5F, ABX, 7), (0x5B, ABY, 7), (0x43, INX, 8), (0x53, INY, 8)]),
    (Instr::TAS, &[(0x9B, ABY, 5)]),
    (Instr::USBC, &[(0xEB, IMM, 2)]),
    (Instr::NOP, &[
        (0x1A, IMP, 2), (0x3A, IMP, 2), (0x5A, IMP, 2), (0x7A, IMP, 2), (0xDA, IMP, 2), (0xFA, IMP, 2),
        (0x80, IMM, 2), (0x82, IMM, 2), (0x89, IMM, 2), (0xC2, IMM, 2), (0xE2, IMM, 2),
        (0x04, ZPG, 3), (0x44, ZPG, 3), (0x64, ZPG, 3),
        (0x14, ZPX, 4), (0x34, ZPX, 4), (0x54, ZPX, 4), (0x74, ZPX, 4), (0xD4, ZPX, 4), (0xF4, ZPX, 4),
        (0x0C, ABS, 4),
        (0x1C, ABX, 4), (0x3C, ABX, 4), (0x5C, ABX, 4), (0x7C, ABX, 4), (0xDC, ABX, 4), (0xFC, ABX, 4),
    ]),
    (Instr::JAM, &[
        (0x02, IMP, 2), (0x12, IMP, 2), (0x22, IMP, 2), (0x32, IMP, 2), (0x42, IMP, 2), (0x52, IMP, 2),
        (0x62, IMP, 2), (0x72, IMP, 2), (0x92, IMP, 2), (0xB2, IMP, 2), (0xD2, IMP, 2), (0xF2, IMP, 2),
    ]),
];

lazy_static! {
    static ref OPCODES: Vec<Opcode> = {
        let documented = DOCUMENTED.iter().map(|&(instr, encodings)| (instr, encodings, false));
        let undocumented = UNDOCUMENTED.iter().map(|&(instr, encodings)| (instr, encodings, true));

        documented
            .chain(undocumented)
            .flat_map(|(instr, encodings, illegal)| {
                encodings.iter().map(move |&(opcode, addr_mode, cycles)| {
                    Opcode::new(opcode, addr_mode, instr, cycles, illegal)
                })
            })
            .collect()
    };

    /// Indexed by opcode byte
    pub static ref OPCODES_LOOKUP: Vec<Option<&'static Opcode>> = {
        let mut lookup = vec![None; 0x100];
        for op in OPCODES.iter() {
            lookup[op.opcode as usize] = Some(op);
        }
        lookup
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_opcode_is_decoded_once() {
        assert_eq!(OPCODES.len(), 0x100);
        assert!(OPCODES_LOOKUP.iter().all(Option::is_some));

        let illegal = OPCODES.iter().filter(|op| op.illegal).count();
        assert_eq!(illegal, 105);
    }

    #[test]
    fn test_table_entries() {
        let las = OPCODES_LOOKUP[0xBB].unwrap();
        assert_eq!((las.instr, las.addr_mode, las.cycles), (Instr::LAS, AddrMode::ABY, 4));

        let sta = OPCODES_LOOKUP[0x91].unwrap();
        assert_eq!((sta.instr, sta.addr_mode, sta.cycles, sta.illegal), (Instr::STA, AddrMode::INY, 6, false));

        let jam = OPCODES_LOOKUP[0xF2].unwrap();
        assert!(jam.illegal);
        assert_eq!(jam.instr, Instr::JAM);
    }
}
