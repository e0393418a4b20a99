//! Pin numbering schemes
//!
//! Applications address pins either by their position on the board header
//! (BOARD) or by the SoC GPIO line number (BCM). Backends are always
//! addressed by physical (SoC line) index, so the registry translates every
//! logical index through a [`PinNumbering`] table first.

/// Numbering scheme used to interpret logical pin indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NumberingScheme {
    /// Physical position on the board header
    #[default]
    Board,
    /// SoC GPIO line number
    Bcm,
}

/// Translation from a logical index to a physical backend index
///
/// Returns `None` for logical indices that have no GPIO behind them
/// (power, ground, or simply out of range).
pub trait PinNumbering {
    fn translate(&self, scheme: NumberingScheme, logical: u8) -> Option<u8>;
}

/// Numbering where logical and physical indices coincide in every scheme
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl PinNumbering for Identity {
    fn translate(&self, _scheme: NumberingScheme, logical: u8) -> Option<u8> {
        Some(logical)
    }
}

/// Highest BCM line exposed on the 40-pin header
const HEADER_MAX_BCM: u8 = 27;

/// Header position → BCM line for the 40-pin Raspberry Pi header
///
/// Index 0 does not exist on the header; power and ground pins map to `None`.
const BOARD_TO_BCM: [Option<u8>; 41] = [
    None,     // 0 (no such pin)
    None,     // 1  3V3
    None,     // 2  5V
    Some(2),  // 3
    None,     // 4  5V
    Some(3),  // 5
    None,     // 6  GND
    Some(4),  // 7
    Some(14), // 8
    None,     // 9  GND
    Some(15), // 10
    Some(17), // 11
    Some(18), // 12
    Some(27), // 13
    None,     // 14 GND
    Some(22), // 15
    Some(23), // 16
    None,     // 17 3V3
    Some(24), // 18
    Some(10), // 19
    None,     // 20 GND
    Some(9),  // 21
    Some(25), // 22
    Some(11), // 23
    Some(8),  // 24
    None,     // 25 GND
    Some(7),  // 26
    Some(0),  // 27 ID_SD
    Some(1),  // 28 ID_SC
    Some(5),  // 29
    None,     // 30 GND
    Some(6),  // 31
    Some(12), // 32
    Some(13), // 33
    None,     // 34 GND
    Some(19), // 35
    Some(16), // 36
    Some(26), // 37
    Some(20), // 38
    None,     // 39 GND
    Some(21), // 40
];

/// 40-pin Raspberry Pi header translation (BCM backends)
#[derive(Debug, Clone, Copy, Default)]
pub struct RaspberryPiHeader;

impl RaspberryPiHeader {
    /// Header position for a BCM line, if the line is on the header
    pub fn board_for_bcm(bcm: u8) -> Option<u8> {
        BOARD_TO_BCM
            .iter()
            .position(|entry| *entry == Some(bcm))
            .map(|pos| pos as u8)
    }
}

impl PinNumbering for RaspberryPiHeader {
    fn translate(&self, scheme: NumberingScheme, logical: u8) -> Option<u8> {
        match scheme {
            NumberingScheme::Board => BOARD_TO_BCM.get(logical as usize).copied().flatten(),
            NumberingScheme::Bcm => (logical <= HEADER_MAX_BCM).then_some(logical),
        }
    }
}
