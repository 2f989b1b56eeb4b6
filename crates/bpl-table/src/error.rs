//! Error types for table building.

use bpl_types::NodeId;

use crate::path::GraphPath;

/// Errors raised while flattening a value graph.
///
/// Every variant carries the path from the root to the offending value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// An integer does not fit the signed 64-bit range the format stores.
    #[error("integer {value} at {path} is outside the signed 64-bit range")]
    IntegerOutOfRange {
        /// Location of the integer.
        path: GraphPath,
        /// The rejected value.
        value: i128,
    },

    /// A container handle that the graph never allocated.
    #[error("container {node} at {path} does not belong to this graph")]
    UnknownNode {
        /// Location of the handle.
        path: GraphPath,
        /// The unknown container.
        node: NodeId,
    },

    /// A handle whose variant disagrees with the container it names.
    #[error("value at {path} is tagged {expected} but container {node} is a {actual}")]
    KindMismatch {
        /// Location of the handle.
        path: GraphPath,
        /// The container named by the handle.
        node: NodeId,
        /// Kind implied by the value variant.
        expected: &'static str,
        /// Kind of the container in the graph.
        actual: &'static str,
    },
}

impl GraphError {
    /// Path from the root to the value that failed.
    pub fn path(&self) -> &GraphPath {
        match self {
            Self::IntegerOutOfRange { path, .. }
            | Self::UnknownNode { path, .. }
            | Self::KindMismatch { path, .. } => path,
        }
    }
}

/// Convenience alias for builder results.
pub type GraphResult<T> = Result<T, GraphError>;
