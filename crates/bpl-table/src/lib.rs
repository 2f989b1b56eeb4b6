//! Object table builder for binary property lists.
//!
//! Walks a caller-built [`Value`](bpl_types::Value) tree and assigns every
//! distinct object a slot in a flat [`ObjectTable`](bpl_types::ObjectTable).
//! Containers keep their identity, so shared containers map to one slot and
//! cycles terminate. Equal leaves may collapse to one slot as a space
//! optimization (see [`BuildOptions`]).

pub mod builder;
pub mod error;
pub mod path;

pub use builder::{build, BuildOptions, TableBuilder};
pub use error::{GraphError, GraphResult};
pub use path::{GraphPath, PathSegment};
