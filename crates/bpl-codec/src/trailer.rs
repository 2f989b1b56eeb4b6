use crate::error::{DecodeError, DecodeResult};

/// Size of the trailer at the very end of the file.
pub const TRAILER_LEN: usize = 32;

/// The fixed record that locates everything else in the file.
///
/// Layout (big-endian):
/// - 5 unused bytes
/// - sort version (1 byte)
/// - offset-table entry width (1 byte)
/// - object reference width (1 byte)
/// - object count (8 bytes)
/// - root object slot (8 bytes)
/// - offset of the offset table from the start of the file (8 bytes)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trailer {
    pub sort_version: u8,
    pub offset_width: u8,
    pub ref_width: u8,
    pub object_count: u64,
    pub root: u64,
    pub offset_table_offset: u64,
}

impl Trailer {
    /// Serialize to the 32-byte wire form.
    pub fn to_bytes(&self) -> [u8; TRAILER_LEN] {
        let mut buf = [0u8; TRAILER_LEN];
        buf[5] = self.sort_version;
        buf[6] = self.offset_width;
        buf[7] = self.ref_width;
        buf[8..16].copy_from_slice(&self.object_count.to_be_bytes());
        buf[16..24].copy_from_slice(&self.root.to_be_bytes());
        buf[24..32].copy_from_slice(&self.offset_table_offset.to_be_bytes());
        buf
    }

    /// Parse the 32-byte wire form. Field values are not checked here.
    pub fn from_bytes(bytes: &[u8]) -> DecodeResult<Self> {
        if bytes.len() != TRAILER_LEN {
            return Err(DecodeError::InvalidTrailer(format!(
                "expected {TRAILER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let u64_at = |pos: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[pos..pos + 8]);
            u64::from_be_bytes(word)
        };
        Ok(Self {
            sort_version: bytes[5],
            offset_width: bytes[6],
            ref_width: bytes[7],
            object_count: u64_at(8),
            root: u64_at(16),
            offset_table_offset: u64_at(24),
        })
    }

    /// Check the widths, count, and root against each other.
    pub fn validate(&self) -> DecodeResult<()> {
        if !(1..=8).contains(&self.offset_width) {
            return Err(DecodeError::InvalidTrailer(format!(
                "offset width {} not in 1..=8",
                self.offset_width
            )));
        }
        if !(1..=8).contains(&self.ref_width) {
            return Err(DecodeError::InvalidTrailer(format!(
                "reference width {} not in 1..=8",
                self.ref_width
            )));
        }
        if self.object_count == 0 {
            return Err(DecodeError::InvalidTrailer("no objects".into()));
        }
        if self.root >= self.object_count {
            return Err(DecodeError::InvalidTrailer(format!(
                "root {} out of bounds, file has {} objects",
                self.root, self.object_count
            )));
        }
        Ok(())
    }
}
