use crate::error::{NesError, Result};

const ALPHABET: &[u8; 16] = b"APZLGITYEOXUKSVN";

/// A decoded Game Genie patch over cartridge space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameGenie {
    pub addr: u16,
    pub data: u8,
    /// 8 letter codes only substitute when the cartridge byte matches
    pub compare: Option<u8>,
}

impl GameGenie {
    pub fn decode(code: &str) -> Result<Self> {
        let invalid = || NesError::InvalidGameGenieCode(code.to_string());

        let n = code.chars()
            .map(|c| {
                let c = c.to_ascii_uppercase();
                ALPHABET.iter().position(|&letter| letter as char == c).map(|pos| pos as u16)
            })
            .collect::<Option<Vec<u16>>>()
            .ok_or_else(invalid)?;

        if n.len() != 6 && n.len() != 8 {
            return Err(invalid());
        }

        let addr = 0x8000
            | ((n[3] & 7) << 12)
            | ((n[5] & 7) << 8) | ((n[4] & 8) << 8)
            | ((n[2] & 7) << 4) | ((n[1] & 8) << 4)
            | (n[4] & 7)        | (n[3] & 8);

        // the 8 letter form moves the data's top bit into the last letter
        let data_hi = if n.len() == 8 { n[7] & 8 } else { n[5] & 8 };
        let data = ((n[1] & 7) << 4) | ((n[0] & 8) << 4) | (n[0] & 7) | data_hi;

        let compare = (n.len() == 8).then(|| {
            (((n[7] & 7) << 4) | ((n[6] & 8) << 4) | (n[6] & 7) | (n[5] & 8)) as u8
        });

        Ok(Self { addr, data: data as u8, compare })
    }

    /// Byte seen by the CPU at `addr`, given what the cartridge holds there
    #[inline]
    pub fn patch(&self, addr: u16, byte: u8) -> u8 {
        if addr != self.addr {
            return byte;
        }

        match self.compare {
            Some(compare) if compare != byte => byte,
            _ => self.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_six_letter_code() {
        let genie = GameGenie::decode("GOSSIP").unwrap();

        assert_eq!(genie.addr, 0xD1DD);
        assert_eq!(genie.data, 0x14);
        assert_eq!(genie.compare, None);

        assert_eq!(genie.patch(0xD1DD, 0x00), 0x14);
        assert_eq!(genie.patch(0xD1DE, 0x00), 0x00);
    }

    #[test]
    fn test_lowercase_is_accepted() {
        assert_eq!(GameGenie::decode("gossip").unwrap(), GameGenie::decode("GOSSIP").unwrap());
    }

    #[test]
    fn test_eight_letter_code() {
        // ZEXPYGLA: 0x94A7 = 0x02 when the cartridge holds 0x03
        let genie = GameGenie::decode("ZEXPYGLA").unwrap();

        assert_eq!(genie.addr, 0x94A7);
        assert_eq!(genie.data, 0x02);
        assert_eq!(genie.compare, Some(0x03));

        assert_eq!(genie.patch(0x94A7, 0x03), 0x02);
        assert_eq!(genie.patch(0x94A7, 0x04), 0x04);
    }

    #[test]
    fn test_invalid_codes() {
        assert_eq!(GameGenie::decode("GOSSI"), Err(NesError::InvalidGameGenieCode(String::from("GOSSI"))));
        assert!(GameGenie::decode("GOSSIPB").is_err());
        assert!(GameGenie::decode("GOSSBP").is_err());
        assert!(GameGenie::decode("").is_err());
    }
}
