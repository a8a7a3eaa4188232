//! Nested-path resolution over decoded documents.
//!
//! A parent path is slash-delimited: `data/sensorData[]/meta`. A segment may
//! carry an array marker. `name[N]` descends into element `N`; `name[]` as
//! the last segment broadcasts the lookup over every element and collects
//! the results, in element order.
use std::fmt;
use std::str::FromStr;

use crate::error::PathError;
use crate::keymap::KeyMap;
use crate::value::{Value, ValueKind};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParentPath {
    segments: Vec<Segment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub index: ArrayIndex,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayIndex {
    /// Plain object segment.
    None,
    /// `name[]`
    Each,
    /// `name[N]`
    At(usize),
}

/// Outcome of a successful lookup.
#[derive(Debug, PartialEq)]
pub enum Resolved<'a> {
    Missing,
    Found(&'a Value),
    /// One cell per element of the broadcast array. Elements lacking the key
    /// contribute [`Value::Absent`].
    Broadcast(Vec<Value>),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ParentPath {
    pub fn root() -> Self {
        Self::default()
    }
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
    /// Whether the path ends in an unindexed array segment.
    pub fn is_broadcast(&self) -> bool {
        self.segments.last().is_some_and(|s| s.index == ArrayIndex::Each)
    }
    /// Mark the last segment as "every element". Returns `None` for the root
    /// path, which has nothing to broadcast over.
    pub fn broadcast(mut self) -> Option<Self> {
        let last = self.segments.last_mut()?;
        last.index = ArrayIndex::Each;
        Some(self)
    }
    /// Reject unindexed array segments anywhere but the last position.
    pub fn check_unambiguous(&self) -> Result<(), PathError> {
        let n = self.segments.len();
        for segment in self.segments.iter().take(n.saturating_sub(1)) {
            if segment.index == ArrayIndex::Each {
                return Err(PathError::AmbiguousBroadcast { segment: segment.to_string() });
            }
        }
        Ok(())
    }
}

impl FromStr for ParentPath {
    type Err = PathError;
    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let segments = src
            .split('/')
            .filter(|s| !s.is_empty())
            .map(Segment::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }
}

impl Segment {
    fn parse(raw: &str) -> Result<Self, PathError> {
        let bad = || PathError::BadSegment { segment: raw.to_owned() };
        let Some(open) = raw.find('[') else {
            if raw.contains(']') {
                return Err(bad());
            }
            return Ok(Self { name: raw.to_owned(), index: ArrayIndex::None });
        };
        let inner = raw[open + 1..].strip_suffix(']').ok_or_else(bad)?;
        let name = &raw[..open];
        if name.is_empty() {
            return Err(bad());
        }
        let index = if inner.is_empty() {
            ArrayIndex::Each
        } else {
            ArrayIndex::At(inner.parse::<usize>().map_err(|_| bad())?)
        };
        Ok(Self { name: name.to_owned(), index })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            ArrayIndex::None => write!(f, "{}", self.name),
            ArrayIndex::Each => write!(f, "{}[]", self.name),
            ArrayIndex::At(n) => write!(f, "{}[{n}]", self.name),
        }
    }
}

impl fmt::Display for ParentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Look up `key` below `parent`, starting at `root`.
///
/// A missing key anywhere along the way is [`Resolved::Missing`], not an
/// error. A segment holding the wrong kind aborts the whole lookup.
pub fn resolve<'a>(root: &'a KeyMap, parent: &ParentPath, key: &str) -> Result<Resolved<'a>, PathError> {
    let mut cursor = root;
    let last = parent.segments.len().saturating_sub(1);
    for (i, segment) in parent.segments.iter().enumerate() {
        let Some(value) = cursor.get_value(&segment.name) else {
            return Ok(Resolved::Missing);
        };
        match segment.index {
            ArrayIndex::None => {
                cursor = expect_object(segment, value)?;
            }
            ArrayIndex::At(n) => {
                let elements = expect_array(segment, value)?;
                let Some(element) = elements.get(n) else {
                    return Ok(Resolved::Missing);
                };
                cursor = expect_object(segment, element)?;
            }
            ArrayIndex::Each if i == last => {
                let elements = expect_array(segment, value)?;
                let mut out = Vec::with_capacity(elements.len());
                for element in elements {
                    let object = expect_object(segment, element)?;
                    out.push(object.get_value(key).cloned().unwrap_or_default());
                }
                return Ok(Resolved::Broadcast(out));
            }
            ArrayIndex::Each => {
                return Err(PathError::AmbiguousBroadcast { segment: segment.to_string() });
            }
        }
    }
    Ok(cursor.get_value(key).map_or(Resolved::Missing, Resolved::Found))
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn expect_object<'a>(segment: &Segment, value: &'a Value) -> Result<&'a KeyMap, PathError> {
    value.as_object().ok_or_else(|| PathError::KindMismatch {
        segment: segment.to_string(),
        expected: ValueKind::Object,
        found: value.kind(),
    })
}

fn expect_array<'a>(segment: &Segment, value: &'a Value) -> Result<&'a [Value], PathError> {
    value.as_array().ok_or_else(|| PathError::KindMismatch {
        segment: segment.to_string(),
        expected: ValueKind::Array,
        found: value.kind(),
    })
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(port: i32, unit: Option<&str>) -> Value {
        let mut m = KeyMap::new();
        m.set("port", port);
        if let Some(unit) = unit {
            m.set("unit", unit);
        }
        Value::Object(m)
    }

    fn document() -> KeyMap {
        let mut data = KeyMap::new();
        data.set("timestamp", "2020-01-01T00:00:00.000+09:00");
        data.set(
            "sensorData",
            Value::Array(vec![reading(1, Some("C")), reading(2, None), reading(3, Some("C"))]),
        );
        let mut root = KeyMap::new();
        root.set_object("data", data);
        root
    }

    #[test]
    fn parses_segments() {
        let p: ParentPath = "data/rows[]/x[3]".parse().unwrap();
        let idx: Vec<_> = p.segments().iter().map(|s| s.index).collect();
        assert_eq!(idx, [ArrayIndex::None, ArrayIndex::Each, ArrayIndex::At(3)]);
        assert_eq!(p.to_string(), "data/rows[]/x[3]");
        assert!("".parse::<ParentPath>().unwrap().is_root());
        assert!("a[x]".parse::<ParentPath>().is_err());
        assert!("a]".parse::<ParentPath>().is_err());
        assert!("[1]".parse::<ParentPath>().is_err());
    }

    #[test]
    fn indexed_segment_selects_one_element() {
        let doc = document();
        let p: ParentPath = "data/sensorData[2]".parse().unwrap();
        assert_eq!(resolve(&doc, &p, "port").unwrap(), Resolved::Found(&Value::Int32(3)));
        let p: ParentPath = "data/sensorData[9]".parse().unwrap();
        assert_eq!(resolve(&doc, &p, "port").unwrap(), Resolved::Missing);
    }

    #[test]
    fn trailing_unindexed_segment_broadcasts() {
        let doc = document();
        let p: ParentPath = "data/sensorData[]".parse().unwrap();
        assert_eq!(
            resolve(&doc, &p, "port").unwrap(),
            Resolved::Broadcast(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)])
        );
        assert_eq!(
            resolve(&doc, &p, "unit").unwrap(),
            Resolved::Broadcast(vec![Value::from("C"), Value::Absent, Value::from("C")])
        );
    }

    #[test]
    fn inner_unindexed_segment_is_ambiguous() {
        let doc = document();
        let p: ParentPath = "data/sensorData[]/deeper".parse().unwrap();
        assert!(matches!(resolve(&doc, &p, "x"), Err(PathError::AmbiguousBroadcast { .. })));
        assert!(p.check_unambiguous().is_err());
    }

    #[test]
    fn kind_mismatch_aborts_lookup() {
        let doc = document();
        let p: ParentPath = "data/timestamp".parse().unwrap();
        assert!(matches!(
            resolve(&doc, &p, "x"),
            Err(PathError::KindMismatch { expected: ValueKind::Object, found: ValueKind::String, .. })
        ));
        let p: ParentPath = "data[0]".parse().unwrap();
        assert!(matches!(
            resolve(&doc, &p, "x"),
            Err(PathError::KindMismatch { expected: ValueKind::Array, .. })
        ));
    }

    #[test]
    fn missing_segment_is_not_an_error() {
        let doc = document();
        let p: ParentPath = "nope/deeper".parse().unwrap();
        assert_eq!(resolve(&doc, &p, "x").unwrap(), Resolved::Missing);
    }
}
