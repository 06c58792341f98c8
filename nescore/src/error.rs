use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NesError {
    /// A JAM opcode (or a disabled illegal opcode) stopped the CPU for good
    CpuHalted { pc: u16, cycles: u64 },
    InvalidRom(String),
    UnsupportedMapper(u8),
    InvalidGameGenieCode(String),
    NoSnapshot,
}

impl fmt::Display for NesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CpuHalted { pc, cycles } => write!(
                f,
                "CPU halted at {:#06X} after {} cycles",
                pc, cycles,
            ),
            Self::InvalidRom(reason) => write!(f, "invalid iNES image: {}", reason),
            Self::UnsupportedMapper(num) => write!(f, "unsupported iNES mapper {}", num),
            Self::InvalidGameGenieCode(code) => write!(f, "invalid Game Genie code: {:?}", code),
            Self::NoSnapshot => write!(f, "no snapshot has been saved"),
        }
    }
}

impl std::error::Error for NesError {}

pub type Result<T> = std::result::Result<T, NesError>;
