//! The flat object table consumed by the encoder.
//!
//! Every container in an [`ObjectTable`] stores [`Slot`]s, never nested
//! values, which is what lets two containers share one object and lets a
//! container point back at its ancestors.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::value::{Date, Uid};

/// Index of one object in an [`ObjectTable`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(pub usize);

impl Slot {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({})", self.0)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the object table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Object {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Date(Date),
    Data(#[serde(with = "hex_bytes")] Vec<u8>),
    Uid(Uid),
    Array(Vec<Slot>),
    /// Key/value slot pairs in table order.
    Dict(Vec<(Slot, Slot)>),
    Set(Vec<Slot>),
}

impl Object {
    /// Every slot this object refers to, keys before values for dicts.
    pub fn references(&self) -> Vec<Slot> {
        match self {
            Self::Array(items) | Self::Set(items) => items.clone(),
            Self::Dict(entries) => entries
                .iter()
                .map(|(k, _)| *k)
                .chain(entries.iter().map(|(_, v)| *v))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Dict(_) | Self::Set(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Data(_) => "data",
            Self::Uid(_) => "uid",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
        }
    }

    /// Leaf equality with reals and dates compared bit for bit.
    fn same_leaf(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Real(a), Self::Real(b)) => a.to_bits() == b.to_bits(),
            (Self::Date(a), Self::Date(b)) => a.plist_secs().to_bits() == b.plist_secs().to_bits(),
            _ => self == other,
        }
    }
}

/// The ordered table of every distinct object plus the root slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectTable {
    objects: Vec<Object>,
    root: Slot,
}

impl ObjectTable {
    /// Create a table from raw parts. Use [`validate`](Self::validate)
    /// before trusting the references.
    pub fn new(objects: Vec<Object>, root: Slot) -> Self {
        Self { objects, root }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn root(&self) -> Slot {
        self.root
    }

    pub fn set_root(&mut self, root: Slot) {
        self.root = root;
    }

    pub fn get(&self, slot: Slot) -> Option<&Object> {
        self.objects.get(slot.index())
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut Object> {
        self.objects.get_mut(slot.index())
    }

    /// Append an object and return its slot.
    pub fn push(&mut self, object: Object) -> Slot {
        self.objects.push(object);
        Slot(self.objects.len() - 1)
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, &Object)> {
        self.objects.iter().enumerate().map(|(i, o)| (Slot(i), o))
    }

    pub fn into_parts(self) -> (Vec<Object>, Slot) {
        (self.objects, self.root)
    }

    /// Check that the table is non-empty and every reference resolves.
    pub fn validate(&self) -> Result<(), TableError> {
        let len = self.objects.len();
        if len == 0 {
            return Err(TableError::Empty);
        }
        if self.root.index() >= len {
            return Err(TableError::RootOutOfBounds {
                root: self.root,
                len,
            });
        }
        for (slot, object) in self.iter() {
            if let Some(reference) = object.references().into_iter().find(|r| r.index() >= len) {
                return Err(TableError::ReferenceOutOfBounds {
                    slot,
                    reference,
                    len,
                });
            }
        }
        Ok(())
    }

    /// Structural equality from the two roots, ignoring slot numbering.
    ///
    /// Walks both tables in lockstep with an explicit stack, so cycles and
    /// deep nesting are fine. Shared objects on one side may be duplicated
    /// on the other; only the reachable shape and leaf values matter.
    pub fn same_structure(&self, other: &ObjectTable) -> bool {
        let mut seen: HashSet<(Slot, Slot)> = HashSet::new();
        let mut stack = vec![(self.root, other.root)];

        while let Some((a, b)) = stack.pop() {
            if !seen.insert((a, b)) {
                continue;
            }
            let (Some(left), Some(right)) = (self.get(a), other.get(b)) else {
                return false;
            };
            match (left, right) {
                (Object::Array(l), Object::Array(r)) | (Object::Set(l), Object::Set(r)) => {
                    if l.len() != r.len() {
                        return false;
                    }
                    stack.extend(l.iter().copied().zip(r.iter().copied()));
                }
                (Object::Dict(l), Object::Dict(r)) => {
                    if l.len() != r.len() {
                        return false;
                    }
                    for ((lk, lv), (rk, rv)) in l.iter().zip(r) {
                        stack.push((*lk, *rk));
                        stack.push((*lv, *rv));
                    }
                }
                (l, r) if !l.is_container() && !r.is_container() => {
                    if !l.same_leaf(r) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worked_example() -> ObjectTable {
        ObjectTable::new(
            vec![
                Object::Bool(true),
                Object::String("AAC".into()),
                Object::Dict(vec![(Slot(3), Slot(1))]),
                Object::String("k".into()),
            ],
            Slot(2),
        )
    }

    #[test]
    fn valid_table_passes() {
        assert_eq!(worked_example().validate(), Ok(()));
    }

    #[test]
    fn empty_table_fails() {
        let table = ObjectTable::new(vec![], Slot(0));
        assert_eq!(table.validate(), Err(TableError::Empty));
    }

    #[test]
    fn root_out_of_bounds() {
        let table = ObjectTable::new(vec![Object::Null], Slot(1));
        assert_eq!(
            table.validate(),
            Err(TableError::RootOutOfBounds { root: Slot(1), len: 1 })
        );
    }

    #[test]
    fn dangling_reference() {
        let table = ObjectTable::new(
            vec![Object::Array(vec![Slot(0), Slot(42)])],
            Slot(0),
        );
        let err = table.validate().unwrap_err();
        assert_eq!(
            err,
            TableError::ReferenceOutOfBounds {
                slot: Slot(0),
                reference: Slot(42),
                len: 1
            }
        );
        assert_eq!(
            err.to_string(),
            "reference 42 in object 0 out of bounds, table has 1 objects"
        );
    }

    #[test]
    fn dict_references_keys_then_values() {
        let d = Object::Dict(vec![(Slot(1), Slot(2)), (Slot(3), Slot(4))]);
        assert_eq!(d.references(), vec![Slot(1), Slot(3), Slot(2), Slot(4)]);
        assert!(Object::Integer(3).references().is_empty());
    }

    #[test]
    fn same_structure_ignores_slot_order() {
        let reordered = ObjectTable::new(
            vec![
                Object::String("k".into()),
                Object::Dict(vec![(Slot(0), Slot(2))]),
                Object::String("AAC".into()),
                Object::Bool(true),
            ],
            Slot(1),
        );
        assert!(worked_example().same_structure(&reordered));
    }

    #[test]
    fn same_structure_detects_leaf_change() {
        let mut other = worked_example();
        *other.get_mut(Slot(1)).unwrap() = Object::String("MP3".into());
        assert!(!worked_example().same_structure(&other));
    }

    #[test]
    fn same_structure_handles_cycles() {
        let a = ObjectTable::new(vec![Object::Array(vec![Slot(0)])], Slot(0));
        let b = ObjectTable::new(
            vec![Object::Null, Object::Array(vec![Slot(1)])],
            Slot(1),
        );
        assert!(a.same_structure(&b));
    }

    #[test]
    fn same_structure_compares_reals_bitwise() {
        let a = ObjectTable::new(vec![Object::Real(f64::NAN)], Slot(0));
        assert!(a.same_structure(&a.clone()));
        let b = ObjectTable::new(vec![Object::Real(0.0)], Slot(0));
        let c = ObjectTable::new(vec![Object::Real(-0.0)], Slot(0));
        assert!(!b.same_structure(&c));
    }

    #[test]
    fn push_returns_slot() {
        let mut table = ObjectTable::new(vec![], Slot(0));
        assert_eq!(table.push(Object::Null), Slot(0));
        assert_eq!(table.push(Object::Bool(false)), Slot(1));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn serde_json_roundtrip() {
        let mut table = worked_example();
        table.push(Object::Data(vec![0xde, 0xad]));
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.contains("\"dead\""));
        let parsed: ObjectTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, table);
    }
}
