//! Binary property-list wire format.
//!
//! Encodes a flat [`ObjectTable`](bpl_types::ObjectTable) into the format a
//! host application reads, and decodes it back for verification.
//!
//! # Layout
//!
//! ```text
//! [ "bplist00" ] [ object 0 ] [ object 1 ] ... [ offset table ] [ trailer (32 bytes) ]
//! ```
//!
//! - **Objects**: one marker byte (type tag + size nibble) and a payload;
//!   containers hold slot references of one file-wide width
//! - **Offset table**: start position of every object, in slot order
//! - **Trailer**: widths, object count, root slot, offset-table position;
//!   readers find it by seeking from the end
//!
//! [`Encoder`] validates the whole table before writing anything, so a
//! failed encode never leaves a partial file behind. [`Decoder`] returns the
//! flat table with references as raw slots.

pub mod error;
pub mod marker;
pub mod reader;
pub mod trailer;
pub mod writer;

pub use error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
pub use marker::{Marker, MAGIC};
pub use reader::{decode, Decoder};
pub use trailer::{Trailer, TRAILER_LEN};
pub use writer::{encode, Encoder};
