use std::fmt;

/// One step from a container to one of its members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// Array or set element.
    Index(usize),
    /// Value stored under a string key.
    Key(String),
    /// Value stored under a non-string key, by entry position.
    Entry(usize),
    /// The key itself of the entry at this position.
    KeyOf(usize),
}

/// Location of a value relative to the root, rendered like `$.setting[0]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphPath {
    segments: Vec<PathSegment>,
}

impl GraphPath {
    /// The root itself.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }
}

impl fmt::Display for GraphPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Index(i) => write!(f, "[{i}]")?,
                PathSegment::Key(k) => write!(f, ".{k}")?,
                PathSegment::Entry(i) => write!(f, "[#{i}]")?,
                PathSegment::KeyOf(i) => write!(f, "{{key #{i}}}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_renders_as_dollar() {
        assert_eq!(GraphPath::root().to_string(), "$");
        assert!(GraphPath::root().is_root());
    }

    #[test]
    fn mixed_segments() {
        let path = GraphPath::from_segments(vec![
            PathSegment::Key("$objects".into()),
            PathSegment::Index(4),
            PathSegment::Key("version".into()),
        ]);
        assert_eq!(path.to_string(), "$.$objects[4].version");
    }

    #[test]
    fn non_string_keys() {
        let mut path = GraphPath::root();
        path.push(PathSegment::Entry(2));
        path.push(PathSegment::KeyOf(0));
        assert_eq!(path.to_string(), "$[#2]{key #0}");
    }
}
