//! Foundation types for binary property lists.
//!
//! This crate provides the value model that callers build archives from and
//! the flat object table that the encoder consumes. Every other `bpl` crate
//! depends on `bpl-types`.
//!
//! # Key Types
//!
//! - [`Value`]: A leaf value, or a handle to a container in a [`Graph`]
//! - [`Graph`]: Arena owning every array, dict, and set of a value tree
//! - [`NodeId`]: Identity of one container; sharing a `NodeId` shares the container
//! - [`Uid`]: The format's explicit UID object (keyed-archive references)
//! - [`Date`]: Seconds relative to 2001-01-01T00:00:00Z
//! - [`Object`]: One flattened table entry whose members are [`Slot`]s
//! - [`ObjectTable`]: The ordered object table plus its root slot

pub mod error;
pub mod graph;
pub mod object;
pub mod value;

pub use error::{TableError, TypeError};
pub use graph::{Container, Graph};
pub use object::{Object, ObjectTable, Slot};
pub use value::{Date, NodeId, Uid, Value};
