//! Arena of containers that a [`Value`] tree points into.
//!
//! A value tree is a [`Graph`] plus a root [`Value`]. Containers are
//! allocated in the arena and referred to by [`NodeId`], so sharing and
//! cycles need no reference counting: pushing a container's own value into
//! itself is a self-reference, reusing a value in two places shares it.

use crate::error::TypeError;
use crate::value::{NodeId, Value};

/// Contents of one container.
#[derive(Clone, Debug, PartialEq)]
pub enum Container {
    Array(Vec<Value>),
    /// Entries in caller order. Keys are conventionally strings.
    Dict(Vec<(Value, Value)>),
    Set(Vec<Value>),
}

impl Container {
    pub fn len(&self) -> usize {
        match self {
            Self::Array(items) | Self::Set(items) => items.len(),
            Self::Dict(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
        }
    }
}

/// Owner of every container in a value tree.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<Container>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of containers allocated.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no container has been allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn alloc(&mut self, container: Container) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(container);
        id
    }

    /// Allocate a new array holding `items`.
    pub fn array(&mut self, items: impl IntoIterator<Item = Value>) -> Value {
        Value::Array(self.alloc(Container::Array(items.into_iter().collect())))
    }

    /// Allocate a new dict holding `entries` in the given order.
    pub fn dict<K: Into<Value>>(&mut self, entries: impl IntoIterator<Item = (K, Value)>) -> Value {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Dict(self.alloc(Container::Dict(entries)))
    }

    /// Allocate a new set holding `items`.
    pub fn set(&mut self, items: impl IntoIterator<Item = Value>) -> Value {
        Value::Set(self.alloc(Container::Set(items.into_iter().collect())))
    }

    /// Look up a container.
    pub fn get(&self, id: NodeId) -> Option<&Container> {
        self.nodes.get(id.index())
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Container, TypeError> {
        self.nodes.get_mut(id.index()).ok_or(TypeError::UnknownNode(id))
    }

    /// Append `item` to an array or set.
    pub fn push(&mut self, target: &Value, item: Value) -> Result<(), TypeError> {
        let id = match target {
            Value::Array(id) | Value::Set(id) => *id,
            _ => {
                return Err(TypeError::NotAContainer {
                    expected: "array or set",
                })
            }
        };
        match self.get_mut(id)? {
            Container::Array(items) | Container::Set(items) => {
                items.push(item);
                Ok(())
            }
            Container::Dict(_) => Err(TypeError::NotAContainer {
                expected: "array or set",
            }),
        }
    }

    /// Append an entry to a dict. Existing entries with the same key are kept.
    pub fn insert(
        &mut self,
        target: &Value,
        key: impl Into<Value>,
        value: Value,
    ) -> Result<(), TypeError> {
        let Value::Dict(id) = target else {
            return Err(TypeError::NotAContainer { expected: "dict" });
        };
        match self.get_mut(*id)? {
            Container::Dict(entries) => {
                entries.push((key.into(), value));
                Ok(())
            }
            _ => Err(TypeError::NotAContainer { expected: "dict" }),
        }
    }
}
