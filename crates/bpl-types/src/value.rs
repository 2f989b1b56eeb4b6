use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Seconds between the Unix epoch and the property-list epoch (2001-01-01).
pub const PLIST_EPOCH_UNIX_SECS: i64 = 978_307_200;

/// Identity of one container inside a [`Graph`](crate::Graph).
///
/// Only the graph hands these out. Two containers allocated separately get
/// different ids even when their contents are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Position of the container in its graph's arena.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The format's UID object.
///
/// Keyed archives use UIDs to point at entries of their `$objects` array.
/// A UID is ordinary data to the encoder; it is not a table reference.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub u64);

impl Uid {
    /// UID 0, the `$null` entry of a keyed archive.
    pub const NULL: Uid = Uid(0);

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self.0)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid:{}", self.0)
    }
}

/// A point in time, stored as seconds since 2001-01-01T00:00:00Z.
#[derive(Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Date(f64);

impl Date {
    /// Create a date from seconds relative to the property-list epoch.
    pub fn from_plist_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Create a date from seconds relative to the Unix epoch.
    pub fn from_unix_secs(secs: f64) -> Self {
        Self(secs - PLIST_EPOCH_UNIX_SECS as f64)
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let secs = dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9;
        Self::from_unix_secs(secs)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Seconds relative to the property-list epoch, as stored on the wire.
    pub fn plist_secs(&self) -> f64 {
        self.0
    }

    pub fn unix_secs(&self) -> f64 {
        self.0 + PLIST_EPOCH_UNIX_SECS as f64
    }

    /// Convert to a UTC datetime. Returns `None` outside chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let unix = self.unix_secs();
        if !unix.is_finite() {
            return None;
        }
        let secs = unix.floor();
        let nanos = ((unix - secs) * 1e9).round().min(999_999_999.0) as u32;
        Utc.timestamp_opt(secs as i64, nanos).single()
    }
}

impl fmt::Debug for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "Date({})", dt.to_rfc3339()),
            None => write!(f, "Date({}s)", self.0),
        }
    }
}

impl From<DateTime<Utc>> for Date {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

/// A value in a caller-built tree, before flattening.
///
/// Leaves are stored inline and compare by value. Containers are handles
/// into a [`Graph`](crate::Graph) and compare by identity: cloning a
/// container value shares the container, allocating a new one does not.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Any integer; the table builder rejects values outside `i64`.
    Integer(i128),
    Real(f64),
    String(String),
    Date(Date),
    Data(Vec<u8>),
    Uid(Uid),
    Array(NodeId),
    Dict(NodeId),
    Set(NodeId),
}

impl Value {
    /// The container this value refers to, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Array(id) | Self::Dict(id) | Self::Set(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.node().is_some()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the value's type, used in diagnostics.
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
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

macro_rules! integer_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Integer(i128::from(v))
            }
        })*
    };
}

integer_from!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Data(v)
    }
}

impl From<Date> for Value {
    fn from(v: Date) -> Self {
        Self::Date(v)
    }
}

impl From<Uid> for Value {
    fn from(v: Uid) -> Self {
        Self::Uid(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_compare_by_value() {
        assert_eq!(Value::from("abc"), Value::String("abc".into()));
        assert_eq!(Value::from(7u8), Value::Integer(7));
        assert_ne!(Value::from(1i64), Value::from(true));
    }

    #[test]
    fn unsigned_conversion_keeps_magnitude() {
        assert_eq!(Value::from(u64::MAX), Value::Integer(u64::MAX as i128));
    }

    #[test]
    fn date_epoch_offset() {
        let d = Date::from_unix_secs(PLIST_EPOCH_UNIX_SECS as f64);
        assert_eq!(d.plist_secs(), 0.0);
        assert_eq!(d.unix_secs(), PLIST_EPOCH_UNIX_SECS as f64);
    }

    #[test]
    fn date_datetime_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let d = Date::from(dt);
        assert_eq!(d.to_datetime(), Some(dt));
    }

    #[test]
    fn date_before_epoch_is_negative() {
        let dt = Utc.with_ymd_and_hms(1999, 12, 31, 0, 0, 0).unwrap();
        assert!(Date::from(dt).plist_secs() < 0.0);
    }

    #[test]
    fn nan_date_has_no_datetime() {
        assert!(Date::from_plist_secs(f64::NAN).to_datetime().is_none());
    }

    #[test]
    fn uid_display() {
        assert_eq!(Uid(29).to_string(), "uid:29");
        assert_eq!(Uid::NULL.get(), 0);
    }

    #[test]
    fn kind_names() {
        assert_eq!(Value::Null.kind_name(), "null");
        assert_eq!(Value::Data(vec![]).kind_name(), "data");
        assert!(Value::Array(NodeId(0)).is_container());
        assert!(!Value::Uid(Uid(1)).is_container());
    }
}
