use thiserror::Error;

use bpl_types::{Slot, TableError};

/// Errors raised before any byte of an encoding is produced.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("object table is empty")]
    EmptyTable,

    #[error("root {root} out of bounds, table has {len} objects")]
    RootOutOfBounds { root: Slot, len: usize },

    #[error("reference {reference} in object {slot} out of bounds, table has {len} objects")]
    ReferenceOutOfBounds {
        slot: Slot,
        reference: Slot,
        len: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TableError> for EncodeError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::Empty => Self::EmptyTable,
            TableError::RootOutOfBounds { root, len } => Self::RootOutOfBounds { root, len },
            TableError::ReferenceOutOfBounds {
                slot,
                reference,
                len,
            } => Self::ReferenceOutOfBounds {
                slot,
                reference,
                len,
            },
        }
    }
}

/// Errors raised while parsing an encoded property list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input too short for a binary property list: {len} bytes")]
    TooShort { len: usize },

    #[error("invalid magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("invalid trailer: {0}")]
    InvalidTrailer(String),

    #[error("trailer declares {declared} objects but the offset table holds {actual}")]
    CountMismatch { declared: u64, actual: u64 },

    #[error("object {slot} starts at {offset}, outside the object area")]
    OffsetOutOfBounds { slot: Slot, offset: u64 },

    #[error("object {slot} at offset {offset} needs bytes up to {end}, past its boundary {boundary}")]
    ObjectOverrun {
        slot: Slot,
        offset: u64,
        end: u64,
        boundary: u64,
    },

    #[error("unknown marker 0x{marker:02x} for object {slot} at offset {offset}")]
    UnknownMarker { slot: Slot, offset: u64, marker: u8 },

    #[error("reference {reference} in object {slot} out of bounds, file has {count} objects")]
    InvalidReference {
        slot: Slot,
        reference: u64,
        count: u64,
    },

    #[error("malformed object {slot} at offset {offset}: {reason}")]
    Malformed {
        slot: Slot,
        offset: u64,
        reason: String,
    },
}

pub type EncodeResult<T> = Result<T, EncodeError>;
pub type DecodeResult<T> = Result<T, DecodeError>;
