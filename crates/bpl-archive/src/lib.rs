//! Keyed archives on top of the binary property-list encoder.
//!
//! A keyed archive is an ordinary property list with a fixed top level:
//!
//! ```text
//! { $archiver: "NSKeyedArchiver", $objects: [...], $top: { root: UID }, $version: 100000 }
//! ```
//!
//! Objects live in the flat `$objects` array and point at each other with
//! UIDs, which are indices into that array. `$objects[0]` is always the
//! string `$null`, so [`Uid::NULL`](bpl_types::Uid::NULL) means "no object".
//!
//! [`KeyedArchiver`] hands out those indices and [`Archive`] encodes the
//! result through the regular table builder and encoder.

pub mod archiver;
pub mod error;

pub use archiver::{
    Archive, ClassDescriptor, KeyedArchiver, ObjectBuilder, ARCHIVER_NAME, ARCHIVE_VERSION,
    NULL_ENTRY,
};
pub use error::{ArchiveError, ArchiveResult};
