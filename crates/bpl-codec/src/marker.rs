//! Object marker bytes.
//!
//! Every object starts with one byte: the high nibble is the type tag, the
//! low nibble is type-specific (a value, a log2 width, or a size where 0xF
//! means an integer object with the real count follows).

/// File header: magic plus format version.
pub const MAGIC: [u8; 8] = *b"bplist00";

pub const HEADER_LEN: usize = MAGIC.len();

// Fixed single-byte objects
pub const NULL: u8 = 0x00;
pub const FALSE: u8 = 0x08;
pub const TRUE: u8 = 0x09;
pub const FILL: u8 = 0x0F;

// Type tags (high nibble)
pub const INT: u8 = 0x10;
pub const REAL: u8 = 0x20;
pub const DATE: u8 = 0x33;
pub const DATA: u8 = 0x40;
pub const ASCII_STRING: u8 = 0x50;
pub const UTF16_STRING: u8 = 0x60;
pub const UID: u8 = 0x80;
pub const ARRAY: u8 = 0xA0;
pub const SET: u8 = 0xC0;
pub const DICT: u8 = 0xD0;

/// Low nibble value meaning "count follows as an integer object".
pub const SIZE_FOLLOWS: u8 = 0x0F;

/// A parsed marker byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    Null,
    Bool(bool),
    /// Integer payload of `width` bytes (1, 2, 4, 8, or 16).
    Integer { width: usize },
    /// IEEE 754 payload of `width` bytes (4 or 8).
    Real { width: usize },
    Date,
    /// Size nibble of a length-prefixed object.
    Data(u8),
    AsciiString(u8),
    Utf16String(u8),
    /// UID payload of `width` bytes (1 to 16).
    Uid { width: usize },
    Array(u8),
    Set(u8),
    Dict(u8),
}

impl Marker {
    /// Parse a marker byte. Returns `None` for tags the format reserves.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let low = byte & 0x0F;
        match byte & 0xF0 {
            0x00 => match byte {
                NULL => Some(Self::Null),
                FALSE => Some(Self::Bool(false)),
                TRUE => Some(Self::Bool(true)),
                _ => None,
            },
            INT if low <= 4 => Some(Self::Integer { width: 1 << low }),
            REAL if low == 2 || low == 3 => Some(Self::Real { width: 1 << low }),
            0x30 if byte == DATE => Some(Self::Date),
            DATA => Some(Self::Data(low)),
            ASCII_STRING => Some(Self::AsciiString(low)),
            UTF16_STRING => Some(Self::Utf16String(low)),
            UID => Some(Self::Uid {
                width: usize::from(low) + 1,
            }),
            ARRAY => Some(Self::Array(low)),
            SET => Some(Self::Set(low)),
            DICT => Some(Self::Dict(low)),
            _ => None,
        }
    }

    /// The byte this marker is written as.
    pub fn to_byte(&self) -> u8 {
        match self {
            Self::Null => NULL,
            Self::Bool(false) => FALSE,
            Self::Bool(true) => TRUE,
            Self::Integer { width } => INT | log2_width(*width),
            Self::Real { width } => REAL | log2_width(*width),
            Self::Date => DATE,
            Self::Data(n) => DATA | (n & 0x0F),
            Self::AsciiString(n) => ASCII_STRING | (n & 0x0F),
            Self::Utf16String(n) => UTF16_STRING | (n & 0x0F),
            Self::Uid { width } => UID | ((*width as u8).saturating_sub(1) & 0x0F),
            Self::Array(n) => ARRAY | (n & 0x0F),
            Self::Set(n) => SET | (n & 0x0F),
            Self::Dict(n) => DICT | (n & 0x0F),
        }
    }
}

fn log2_width(width: usize) -> u8 {
    (width.max(1).trailing_zeros() as u8) & 0x0F
}

/// Smallest of 1, 2, 4, or 8 bytes that holds `value` unsigned.
///
/// Used for the global reference and offset widths and for UIDs.
pub fn width_for(value: u64) -> u8 {
    if value < 1 << 8 {
        1
    } else if value < 1 << 16 {
        2
    } else if value < 1 << 32 {
        4
    } else {
        8
    }
}

/// Append the low `width` bytes of `value`, big-endian.
pub(crate) fn write_be(buf: &mut Vec<u8>, value: u64, width: u8) {
    let bytes = value.to_be_bytes();
    buf.extend_from_slice(&bytes[8 - usize::from(width)..]);
}

/// Read an unsigned big-endian integer of up to 8 bytes.
pub(crate) fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_markers() {
        assert_eq!(Marker::from_byte(0x00), Some(Marker::Null));
        assert_eq!(Marker::from_byte(0x08), Some(Marker::Bool(false)));
        assert_eq!(Marker::from_byte(0x09), Some(Marker::Bool(true)));
        assert_eq!(Marker::Bool(true).to_byte(), 0x09);
    }

    #[test]
    fn integer_widths() {
        assert_eq!(Marker::from_byte(0x10), Some(Marker::Integer { width: 1 }));
        assert_eq!(Marker::from_byte(0x13), Some(Marker::Integer { width: 8 }));
        assert_eq!(Marker::from_byte(0x14), Some(Marker::Integer { width: 16 }));
        assert_eq!(Marker::from_byte(0x15), None);
        assert_eq!(Marker::Integer { width: 4 }.to_byte(), 0x12);
    }

    #[test]
    fn real_widths() {
        assert_eq!(Marker::from_byte(0x22), Some(Marker::Real { width: 4 }));
        assert_eq!(Marker::from_byte(0x23), Some(Marker::Real { width: 8 }));
        assert_eq!(Marker::from_byte(0x21), None);
        assert_eq!(Marker::Real { width: 8 }.to_byte(), 0x23);
    }

    #[test]
    fn sized_markers_keep_nibble() {
        assert_eq!(Marker::from_byte(0x53), Some(Marker::AsciiString(3)));
        assert_eq!(Marker::from_byte(0x6F), Some(Marker::Utf16String(0x0F)));
        assert_eq!(Marker::from_byte(0xD1), Some(Marker::Dict(1)));
        assert_eq!(Marker::Array(14).to_byte(), 0xAE);
    }

    #[test]
    fn uid_width_is_nibble_plus_one() {
        assert_eq!(Marker::from_byte(0x80), Some(Marker::Uid { width: 1 }));
        assert_eq!(Marker::from_byte(0x87), Some(Marker::Uid { width: 8 }));
        assert_eq!(Marker::Uid { width: 2 }.to_byte(), 0x81);
    }

    #[test]
    fn reserved_markers() {
        for byte in [0x01, FILL, 0x30, 0x34, 0x70, 0x90, 0xB0, 0xE0, 0xF0] {
            assert_eq!(Marker::from_byte(byte), None, "0x{byte:02x}");
        }
    }

    #[test]
    fn width_boundaries() {
        assert_eq!(width_for(0), 1);
        assert_eq!(width_for(255), 1);
        assert_eq!(width_for(256), 2);
        assert_eq!(width_for(65_535), 2);
        assert_eq!(width_for(65_536), 4);
        assert_eq!(width_for(u32::MAX as u64), 4);
        assert_eq!(width_for(1 << 32), 8);
    }

    #[test]
    fn be_helpers() {
        let mut buf = Vec::new();
        write_be(&mut buf, 0x0102, 2);
        write_be(&mut buf, 7, 1);
        write_be(&mut buf, 0x0A0B0C, 4);
        assert_eq!(buf, vec![0x01, 0x02, 0x07, 0x00, 0x0A, 0x0B, 0x0C]);
        assert_eq!(read_be(&buf[0..2]), 0x0102);
        assert_eq!(read_be(&buf[3..7]), 0x0A0B0C);
    }
}
