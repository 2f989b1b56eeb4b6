use std::collections::HashMap;
use std::io::Write;

use tracing::debug;

use bpl_codec::Encoder;
use bpl_table::{BuildOptions, TableBuilder};
use bpl_types::{Container, Graph, ObjectTable, Uid, Value};

use crate::error::{ArchiveError, ArchiveResult};

/// Value of the top-level `$archiver` key.
pub const ARCHIVER_NAME: &str = "NSKeyedArchiver";

/// Value of the top-level `$version` key.
pub const ARCHIVE_VERSION: u64 = 100_000;

/// The string stored at `$objects[0]`, referenced by [`Uid::NULL`].
pub const NULL_ENTRY: &str = "$null";

/// A class name and its superclasses, nearest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassDescriptor {
    name: String,
    ancestors: Vec<String>,
}

impl ClassDescriptor {
    pub fn new(
        name: impl Into<String>,
        ancestors: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            ancestors: ancestors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The class itself followed by its ancestors, as stored in `$classes`.
    pub fn hierarchy(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.ancestors.iter().map(String::as_str))
    }
}

/// Fields of one archived object. `$class` always comes first.
///
/// Field values are usually [`Uid`]s pointing at other `$objects` entries;
/// small scalars such as booleans and version numbers may be stored inline.
#[derive(Clone, Debug)]
pub struct ObjectBuilder {
    fields: Vec<(String, Value)>,
}

impl ObjectBuilder {
    pub fn new(class: Uid) -> Self {
        Self {
            fields: vec![("$class".to_string(), Value::Uid(class))],
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Number of fields including `$class`.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builds the `$objects` array of a keyed archive.
///
/// Every archived value gets the next index of `$objects` and is addressed
/// by that index as a [`Uid`]. Strings and class descriptors are interned.
/// Entries can be reserved up front and filled later, which lets a parent
/// take a lower index than the children it points at.
#[derive(Debug)]
pub struct KeyedArchiver {
    graph: Graph,
    entries: Vec<Option<Value>>,
    strings: HashMap<String, Uid>,
    classes: HashMap<String, Uid>,
}

impl Default for KeyedArchiver {
    fn default() -> Self {
        Self {
            graph: Graph::new(),
            entries: vec![Some(Value::from(NULL_ENTRY))],
            strings: HashMap::new(),
            classes: HashMap::new(),
        }
    }
}

impl KeyedArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `$objects` entries so far, including `$null`.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn append(&mut self, value: Value) -> Uid {
        let uid = Uid(self.entries.len() as u64);
        self.entries.push(Some(value));
        uid
    }

    /// Archive a string, reusing the entry of an identical earlier string.
    pub fn archive_string(&mut self, s: &str) -> Uid {
        if let Some(&uid) = self.strings.get(s) {
            return uid;
        }
        let uid = self.append(Value::from(s));
        self.strings.insert(s.to_string(), uid);
        uid
    }

    /// Archive a leaf value as a new entry.
    pub fn archive_value(&mut self, value: impl Into<Value>) -> Uid {
        self.append(value.into())
    }

    /// Archive a class descriptor, once per class name.
    pub fn class(&mut self, class: &ClassDescriptor) -> Uid {
        if let Some(&uid) = self.classes.get(class.name()) {
            return uid;
        }
        let hierarchy = self.graph.array(class.hierarchy().map(Value::from));
        let descriptor = self.graph.dict([
            ("$classes", hierarchy),
            ("$classname", Value::from(class.name())),
        ]);
        let uid = self.append(descriptor);
        self.classes.insert(class.name().to_string(), uid);
        uid
    }

    /// Archive an object as a new entry.
    pub fn add(&mut self, object: ObjectBuilder) -> Uid {
        let dict = self.graph.dict(object.fields);
        self.append(dict)
    }

    /// Take the next index now; [`fill`](Self::fill) it later.
    pub fn reserve(&mut self) -> Uid {
        let uid = Uid(self.entries.len() as u64);
        self.entries.push(None);
        uid
    }

    /// Store an object in an entry taken with [`reserve`](Self::reserve).
    pub fn fill(&mut self, uid: Uid, object: ObjectBuilder) -> ArchiveResult<()> {
        let entry = usize::try_from(uid.get())
            .ok()
            .and_then(|index| self.entries.get_mut(index))
            .ok_or(ArchiveError::UnknownUid(uid))?;
        if entry.is_some() {
            return Err(ArchiveError::NotReserved(uid));
        }
        *entry = Some(self.graph.dict(object.fields));
        Ok(())
    }

    /// Archive an `NS.objects` collection of the given class.
    pub fn array(&mut self, class: Uid, items: &[Uid]) -> Uid {
        let objects = self.graph.array(items.iter().copied().map(Value::Uid));
        self.add(ObjectBuilder::new(class).field("NS.objects", objects))
    }

    /// Archive an `NS.keys`/`NS.objects` collection of the given class.
    pub fn dictionary(&mut self, class: Uid, entries: &[(Uid, Uid)]) -> Uid {
        let keys = self.graph.array(entries.iter().map(|(k, _)| Value::Uid(*k)));
        let objects = self.graph.array(entries.iter().map(|(_, v)| Value::Uid(*v)));
        self.add(
            ObjectBuilder::new(class)
                .field("NS.keys", keys)
                .field("NS.objects", objects),
        )
    }

    /// Close the archive with `root` as `$top.root`.
    pub fn finish(self, root: Uid) -> ArchiveResult<Archive> {
        let count = self.entries.len();
        if root.get() >= count as u64 {
            return Err(ArchiveError::UnknownUid(root));
        }
        let objects = self
            .entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| entry.ok_or(ArchiveError::Unfilled(Uid(i as u64))))
            .collect::<ArchiveResult<Vec<_>>>()?;

        let mut graph = self.graph;
        let objects = graph.array(objects);
        let top = graph.dict([("root", Value::Uid(root))]);
        let archive = graph.dict([
            ("$archiver", Value::from(ARCHIVER_NAME)),
            ("$objects", objects),
            ("$top", top),
            ("$version", Value::from(ARCHIVE_VERSION)),
        ]);

        debug!(
            entries = count,
            strings = self.strings.len(),
            classes = self.classes.len(),
            %root,
            "finished keyed archive"
        );
        Ok(Archive {
            graph,
            root: archive,
            entries: count,
        })
    }
}

/// A finished keyed archive, ready to encode.
#[derive(Debug)]
pub struct Archive {
    graph: Graph,
    root: Value,
    entries: usize,
}

impl Archive {
    /// Table options used for archives: equal leaves share a slot and keys
    /// are sorted, as the host's own writer does.
    pub fn build_options() -> BuildOptions {
        BuildOptions {
            dedup_leaves: true,
            sort_keys: true,
            null_sentinel: false,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The top-level dict.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Number of `$objects` entries.
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// The value stored at `$objects[uid]`.
    pub fn entry(&self, uid: Uid) -> Option<&Value> {
        let Some(Container::Dict(top)) = self.root.node().and_then(|id| self.graph.get(id)) else {
            return None;
        };
        let objects = top
            .iter()
            .find(|(k, _)| k.as_str() == Some("$objects"))
            .and_then(|(_, v)| v.node())
            .and_then(|id| self.graph.get(id))?;
        match objects {
            Container::Array(items) => items.get(usize::try_from(uid.get()).ok()?),
            _ => None,
        }
    }

    pub fn table(&self) -> ArchiveResult<ObjectTable> {
        let table = TableBuilder::new(&self.graph)
            .with_options(Self::build_options())
            .build(&self.root)?;
        Ok(table)
    }

    pub fn encode(&self) -> ArchiveResult<Vec<u8>> {
        Ok(Encoder::new().encode(&self.table()?)?)
    }

    /// Encode and write to `out`. Returns the number of bytes written.
    pub fn write_to<W: Write>(&self, out: W) -> ArchiveResult<usize> {
        Ok(Encoder::new().encode_to(&self.table()?, out)?)
    }
}
