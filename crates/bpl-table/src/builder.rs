//! Flattening of a value graph into an object table.
//!
//! [`TableBuilder`] walks the tree with an explicit stack in pre-order:
//! a node gets its slot the first time it is popped, and children are
//! pushed in reverse so the visit order matches a recursive walk. Dict keys
//! are visited before dict values. A container's slot is reserved before
//! any child is visited, so a child pointing back at an open container
//! resolves to the reserved slot and the walk terminates on cycles.

use std::collections::HashMap;

use tracing::debug;

use bpl_types::{Container, Graph, NodeId, Object, ObjectTable, Slot, Value};

use crate::error::{GraphError, GraphResult};
use crate::path::{GraphPath, PathSegment};

/// Knobs for [`TableBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    /// Collapse leaves that are equal by value into one slot.
    /// Containers are never merged regardless of this flag.
    pub dedup_leaves: bool,
    /// Order dict entries by string key before flattening. Entries with
    /// non-string keys follow the string keys in their original order.
    pub sort_keys: bool,
    /// Reserve slot 0 for a null object before the walk starts.
    pub null_sentinel: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            dedup_leaves: true,
            sort_keys: false,
            null_sentinel: false,
        }
    }
}

/// Flatten `root` with the default options.
pub fn build(graph: &Graph, root: &Value) -> GraphResult<ObjectTable> {
    TableBuilder::new(graph).build(root)
}

/// Builds an [`ObjectTable`] from a [`Graph`] and a root value.
pub struct TableBuilder<'g> {
    graph: &'g Graph,
    options: BuildOptions,
}

/// Position of a member inside its container's table entry.
#[derive(Clone, Copy, Debug)]
enum Member {
    Item(usize),
    Key { pos: usize, entry: usize },
    Value { pos: usize, entry: usize },
}

/// Breadcrumb used to rebuild a path when an error is reported.
struct Trail {
    up: Option<usize>,
    node: NodeId,
    member: Member,
}

struct Pending<'g> {
    value: &'g Value,
    parent: Option<(Slot, Member)>,
    trail: Option<usize>,
}

/// Hashable identity of a leaf for deduplication.
#[derive(Clone, PartialEq, Eq, Hash)]
enum LeafKey {
    Null,
    Bool(bool),
    Integer(i64),
    Real(u64),
    String(String),
    Date(u64),
    Data(Vec<u8>),
    Uid(u64),
}

impl LeafKey {
    fn of(object: &Object) -> Option<Self> {
        Some(match object {
            Object::Null => Self::Null,
            Object::Bool(b) => Self::Bool(*b),
            Object::Integer(i) => Self::Integer(*i),
            Object::Real(r) => Self::Real(r.to_bits()),
            Object::String(s) => Self::String(s.clone()),
            Object::Date(d) => Self::Date(d.plist_secs().to_bits()),
            Object::Data(d) => Self::Data(d.clone()),
            Object::Uid(u) => Self::Uid(u.get()),
            Object::Array(_) | Object::Dict(_) | Object::Set(_) => return None,
        })
    }
}

impl<'g> TableBuilder<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            options: BuildOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> BuildOptions {
        self.options
    }

    /// Flatten the tree rooted at `root`.
    pub fn build(&self, root: &'g Value) -> GraphResult<ObjectTable> {
        let mut table = ObjectTable::new(Vec::new(), Slot(0));
        let mut containers: HashMap<NodeId, Slot> = HashMap::new();
        let mut leaves: HashMap<LeafKey, Slot> = HashMap::new();
        let mut trails: Vec<Trail> = Vec::new();

        if self.options.null_sentinel {
            let slot = table.push(Object::Null);
            if self.options.dedup_leaves {
                leaves.insert(LeafKey::Null, slot);
            }
        }

        let mut stack = vec![Pending {
            value: root,
            parent: None,
            trail: None,
        }];

        while let Some(pending) = stack.pop() {
            let slot = match pending.value.node() {
                Some(id) => match containers.get(&id) {
                    Some(&slot) => slot,
                    None => {
                        let container = self.container(pending.value, id, pending.trail, &trails)?;
                        let slot = table.push(placeholder(container));
                        containers.insert(id, slot);
                        self.push_children(id, container, slot, pending.trail, &mut stack, &mut trails);
                        slot
                    }
                },
                None => {
                    let object = leaf_object(pending.value)
                        .map_err(|value| GraphError::IntegerOutOfRange {
                            path: self.path(pending.trail, &trails),
                            value,
                        })?;
                    if self.options.dedup_leaves {
                        match LeafKey::of(&object) {
                            Some(key) => *leaves.entry(key).or_insert_with(|| table.push(object)),
                            None => table.push(object),
                        }
                    } else {
                        table.push(object)
                    }
                }
            };

            match pending.parent {
                None => table.set_root(slot),
                Some((parent, member)) => {
                    if let Some(object) = table.get_mut(parent) {
                        patch(object, member, slot);
                    }
                }
            }
        }

        debug!(
            objects = table.len(),
            root = %table.root(),
            containers = containers.len(),
            "built object table"
        );
        Ok(table)
    }

    /// Resolve a container handle, checking it names a container of the right kind.
    fn container(
        &self,
        value: &Value,
        id: NodeId,
        trail: Option<usize>,
        trails: &[Trail],
    ) -> GraphResult<&'g Container> {
        let graph: &'g Graph = self.graph;
        let container = graph.get(id).ok_or_else(|| GraphError::UnknownNode {
            path: self.path(trail, trails),
            node: id,
        })?;
        let matches = matches!(
            (value, container),
            (Value::Array(_), Container::Array(_))
                | (Value::Dict(_), Container::Dict(_))
                | (Value::Set(_), Container::Set(_))
        );
        if !matches {
            return Err(GraphError::KindMismatch {
                path: self.path(trail, trails),
                node: id,
                expected: value.kind_name(),
                actual: container.kind_name(),
            });
        }
        Ok(container)
    }

    /// Entry indices of a container in flattening order.
    fn order(&self, container: &Container) -> Vec<usize> {
        let mut order: Vec<usize> = (0..container.len()).collect();
        if let (Container::Dict(entries), true) = (container, self.options.sort_keys) {
            order.sort_by_key(|&i| match entries[i].0.as_str() {
                Some(key) => (false, key),
                None => (true, ""),
            });
        }
        order
    }

    fn push_children(
        &self,
        id: NodeId,
        container: &'g Container,
        slot: Slot,
        up: Option<usize>,
        stack: &mut Vec<Pending<'g>>,
        trails: &mut Vec<Trail>,
    ) {
        let mut children: Vec<(&'g Value, Member)> = Vec::with_capacity(container.len() * 2);
        match container {
            Container::Array(items) | Container::Set(items) => {
                children.extend(items.iter().enumerate().map(|(i, v)| (v, Member::Item(i))));
            }
            Container::Dict(entries) => {
                let order = self.order(container);
                for (pos, &entry) in order.iter().enumerate() {
                    children.push((&entries[entry].0, Member::Key { pos, entry }));
                }
                for (pos, &entry) in order.iter().enumerate() {
                    children.push((&entries[entry].1, Member::Value { pos, entry }));
                }
            }
        }

        for (value, member) in children.into_iter().rev() {
            trails.push(Trail {
                up,
                node: id,
                member,
            });
            stack.push(Pending {
                value,
                parent: Some((slot, member)),
                trail: Some(trails.len() - 1),
            });
        }
    }

    /// Rebuild the root-to-value path from breadcrumbs.
    fn path(&self, trail: Option<usize>, trails: &[Trail]) -> GraphPath {
        let mut segments = Vec::new();
        let mut cursor = trail;
        while let Some(index) = cursor {
            let Some(step) = trails.get(index) else {
                break;
            };
            segments.push(self.segment(step));
            cursor = step.up;
        }
        segments.reverse();
        GraphPath::from_segments(segments)
    }

    fn segment(&self, step: &Trail) -> PathSegment {
        match step.member {
            Member::Item(i) => PathSegment::Index(i),
            Member::Key { entry, .. } => PathSegment::KeyOf(entry),
            Member::Value { entry, .. } => match self.graph.get(step.node) {
                Some(Container::Dict(entries)) => match entries.get(entry).and_then(|e| e.0.as_str()) {
                    Some(key) => PathSegment::Key(key.to_owned()),
                    None => PathSegment::Entry(entry),
                },
                _ => PathSegment::Entry(entry),
            },
        }
    }
}

/// A container entry sized for its members, to be patched as they resolve.
fn placeholder(container: &Container) -> Object {
    let len = container.len();
    match container {
        Container::Array(_) => Object::Array(vec![Slot(0); len]),
        Container::Set(_) => Object::Set(vec![Slot(0); len]),
        Container::Dict(_) => Object::Dict(vec![(Slot(0), Slot(0)); len]),
    }
}

fn patch(object: &mut Object, member: Member, slot: Slot) {
    match (object, member) {
        (Object::Array(items) | Object::Set(items), Member::Item(i)) => {
            if let Some(item) = items.get_mut(i) {
                *item = slot;
            }
        }
        (Object::Dict(entries), Member::Key { pos, .. }) => {
            if let Some(entry) = entries.get_mut(pos) {
                entry.0 = slot;
            }
        }
        (Object::Dict(entries), Member::Value { pos, .. }) => {
            if let Some(entry) = entries.get_mut(pos) {
                entry.1 = slot;
            }
        }
        _ => {}
    }
}

/// Convert a leaf value. Fails with the integer when it is out of range.
fn leaf_object(value: &Value) -> Result<Object, i128> {
    Ok(match value {
        Value::Null => Object::Null,
        Value::Bool(b) => Object::Bool(*b),
        Value::Integer(i) => Object::Integer(i64::try_from(*i).map_err(|_| *i)?),
        Value::Real(r) => Object::Real(*r),
        Value::String(s) => Object::String(s.clone()),
        Value::Date(d) => Object::Date(*d),
        Value::Data(d) => Object::Data(d.clone()),
        Value::Uid(u) => Object::Uid(*u),
        Value::Array(_) | Value::Dict(_) | Value::Set(_) => {
            unreachable!("containers are resolved through the graph")
        }
    })
}
