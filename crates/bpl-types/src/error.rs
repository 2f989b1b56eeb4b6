use thiserror::Error;

use crate::object::Slot;
use crate::value::NodeId;

/// Errors produced while building a value graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("value is not a container: expected {expected}")]
    NotAContainer { expected: &'static str },

    #[error("container {0} does not belong to this graph")]
    UnknownNode(NodeId),
}

/// Structural violations of an [`ObjectTable`](crate::ObjectTable).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("object table is empty")]
    Empty,

    #[error("root {root} out of bounds, table has {len} objects")]
    RootOutOfBounds { root: Slot, len: usize },

    #[error("reference {reference} in object {slot} out of bounds, table has {len} objects")]
    ReferenceOutOfBounds {
        slot: Slot,
        reference: Slot,
        len: usize,
    },
}
