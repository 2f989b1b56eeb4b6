//! Error types for keyed archives.

use bpl_codec::EncodeError;
use bpl_table::GraphError;
use bpl_types::Uid;

/// Errors raised while assembling or encoding a keyed archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// A UID that was never handed out by this archiver.
    #[error("{0} does not name an entry of this archive")]
    UnknownUid(Uid),

    /// A UID that does not name a reserved placeholder.
    #[error("{0} is not a reserved entry")]
    NotReserved(Uid),

    /// A reserved entry left empty when the archive was finished.
    #[error("{0} was reserved but never filled")]
    Unfilled(Uid),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

/// Convenience alias for archive results.
pub type ArchiveResult<T> = Result<T, ArchiveError>;
