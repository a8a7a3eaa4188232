//! Rule-driven validation of a decoded [`KeyMap`] that populates a typed
//! destination object through bound setters.
//!
//! A [`RuleTable`] is checked once when it is built: setter kinds,
//! comparison values, rules on composite fields and broadcast paths are all
//! configuration errors. [`RuleTable::analyze`] then walks the entries in
//! declaration order and stops at the first one that fails.
//!
//! ```ignore
//! static RULES: Lazy<RuleTable<Report>> = Lazy::new(|| {
//!     RuleTable::new(vec![
//!         RuleEntry::new("data", InputKind::Object, Rule::MustExist),
//!         RuleEntry::new("port", InputKind::ArrayInteger32, Rule::MustExist)
//!             .under("data/sensorData")
//!             .broadcast()
//!             .setter(Setter::array_int32(|r: &mut Report, v| r.ports = v)),
//!     ])
//!     .expect("sensor rules")
//! });
//! ```
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::descriptor::InputKind;
use crate::error::{AnalyzeError, ConfigError, Violation};
use crate::keymap::KeyMap;
use crate::path::{self, ParentPath, Resolved};
use crate::value::{Scalar, Value};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    Any,
    MustExist,
    MustNotExist,
    MustEqual(Value),
    MustNotEqual(Value),
    IsOneOf(Vec<Value>),
    IsNotOneOf(Vec<Value>),
}

type Apply<T, V> = Box<dyn Fn(&mut T, V) -> anyhow::Result<()> + Send + Sync>;

/// A destination-object setter, tagged with the value type it takes.
pub enum Setter<T> {
    String(Apply<T, String>),
    Int32(Apply<T, i32>),
    Int64(Apply<T, i64>),
    Bool(Apply<T, bool>),
    Real(Apply<T, f64>),
    ArrayString(Apply<T, Vec<String>>),
    ArrayInt32(Apply<T, Vec<i32>>),
    ArrayInt64(Apply<T, Vec<i64>>),
    ArrayBool(Apply<T, Vec<bool>>),
    ArrayReal(Apply<T, Vec<f64>>),
}

pub struct RuleEntry<T> {
    key: String,
    parent: String,
    kind: InputKind,
    rule: Rule,
    setter: Option<Setter<T>>,
    broadcast: bool,
}

/// A validated, immutable rule list bound to one destination type.
pub struct RuleTable<T> {
    entries: Vec<Bound<T>>,
}

struct Bound<T> {
    entry: RuleEntry<T>,
    path: ParentPath,
}

/// What a rule entry found in the document.
enum Extracted {
    Missing,
    Present(Value),
    /// Broadcast where element `.0` lacks the field.
    Partial(usize),
}

pub trait Analyzer {
    type Target;

    fn rules(&self) -> &RuleTable<Self::Target>;

    /// Validate `content` and populate `target`. Fails at the first entry
    /// that does not hold.
    fn analyze(&self, content: &KeyMap, target: &mut Self::Target) -> Result<(), AnalyzeError> {
        self.rules().analyze(content, target)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SETTERS
// ————————————————————————————————————————————————————————————————————————————

macro_rules! setter_constructors {
    ($($variant:ident($ty:ty) => $plain:ident, $fallible:ident;)*) => {
        impl<T: 'static> Setter<T> {
            $(
                pub fn $plain(f: impl Fn(&mut T, $ty) + Send + Sync + 'static) -> Self {
                    Self::$variant(Box::new(move |target: &mut T, value: $ty| -> anyhow::Result<()> {
                        f(target, value);
                        Ok(())
                    }))
                }
                pub fn $fallible(f: impl Fn(&mut T, $ty) -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
                    Self::$variant(Box::new(f))
                }
            )*
        }
    };
}

setter_constructors! {
    String(String) => string, try_string;
    Int32(i32) => int32, try_int32;
    Int64(i64) => int64, try_int64;
    Bool(bool) => bool, try_bool;
    Real(f64) => real, try_real;
    ArrayString(Vec<String>) => array_string, try_array_string;
    ArrayInt32(Vec<i32>) => array_int32, try_array_int32;
    ArrayInt64(Vec<i64>) => array_int64, try_array_int64;
    ArrayBool(Vec<bool>) => array_bool, try_array_bool;
    ArrayReal(Vec<f64>) => array_real, try_array_real;
}

impl<T> Setter<T> {
    pub fn input_kind(&self) -> InputKind {
        match self {
            Self::String(_) => InputKind::String,
            Self::Int32(_) => InputKind::Integer32,
            Self::Int64(_) => InputKind::Integer64,
            Self::Bool(_) => InputKind::Boolean,
            Self::Real(_) => InputKind::Real,
            Self::ArrayString(_) => InputKind::ArrayString,
            Self::ArrayInt32(_) => InputKind::ArrayInteger32,
            Self::ArrayInt64(_) => InputKind::ArrayInteger64,
            Self::ArrayBool(_) => InputKind::ArrayBoolean,
            Self::ArrayReal(_) => InputKind::ArrayReal,
        }
    }

    fn accepts(&self, kind: InputKind) -> bool {
        let kind = if kind == InputKind::Coordinates { InputKind::String } else { kind };
        self.input_kind() == kind
    }

    fn apply(&self, target: &mut T, value: &Value, declared: InputKind) -> Result<(), Violation> {
        match self {
            Self::String(f) => invoke(f, target, scalar(value, declared)?),
            Self::Int32(f) => invoke(f, target, scalar(value, declared)?),
            Self::Int64(f) => invoke(f, target, scalar(value, declared)?),
            Self::Bool(f) => invoke(f, target, scalar(value, declared)?),
            Self::Real(f) => invoke(f, target, scalar(value, declared)?),
            Self::ArrayString(f) => invoke(f, target, array(value, declared)?),
            Self::ArrayInt32(f) => invoke(f, target, array(value, declared)?),
            Self::ArrayInt64(f) => invoke(f, target, array(value, declared)?),
            Self::ArrayBool(f) => invoke(f, target, array(value, declared)?),
            Self::ArrayReal(f) => invoke(f, target, array(value, declared)?),
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Setter<{}>", self.input_kind())
    }
}

/// Run a setter, folding both returned errors and panics into a violation.
/// The panic hook still runs first, so a panicking setter is printed to
/// stderr before it is folded.
fn invoke<T, V>(f: &Apply<T, V>, target: &mut T, value: V) -> Result<(), Violation> {
    match panic::catch_unwind(AssertUnwindSafe(|| f(target, value))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(Violation::Setter(format!("{error:#}"))),
        Err(payload) => Err(Violation::Setter(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "setter panicked".to_owned()
    }
}

fn scalar<V: Scalar>(value: &Value, declared: InputKind) -> Result<V, Violation> {
    value.extract::<V>().ok_or(Violation::Kind { declared, found: value.kind() })
}

fn array<V: Scalar>(value: &Value, declared: InputKind) -> Result<Vec<V>, Violation> {
    value.extract_array::<V>().ok_or(Violation::Kind { declared, found: value.kind() })
}

// ————————————————————————————————————————————————————————————————————————————
// RULE ENTRIES
// ————————————————————————————————————————————————————————————————————————————

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::MustExist => "MUST_EXIST",
            Self::MustNotExist => "MUST_NOT_EXIST",
            Self::MustEqual(_) => "MUST_EQUAL",
            Self::MustNotEqual(_) => "MUST_NOT_EQUAL",
            Self::IsOneOf(_) => "IS_ONE_OF",
            Self::IsNotOneOf(_) => "IS_NOT_ONE_OF",
        }
    }
    fn comparison_values(&self) -> &[Value] {
        match self {
            Self::MustEqual(x) | Self::MustNotEqual(x) => std::slice::from_ref(x),
            Self::IsOneOf(xs) | Self::IsNotOneOf(xs) => xs,
            Self::Any | Self::MustExist | Self::MustNotExist => &[],
        }
    }
}

impl<T> RuleEntry<T> {
    pub fn new(key: impl Into<String>, kind: InputKind, rule: Rule) -> Self {
        Self {
            key: key.into(),
            parent: String::new(),
            kind,
            rule,
            setter: None,
            broadcast: false,
        }
    }
    /// Slash-delimited ancestor path; empty for the document root.
    pub fn under(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }
    /// Collect the field from every element of the last path segment.
    pub fn broadcast(mut self) -> Self {
        self.broadcast = true;
        self
    }
    pub fn setter(mut self, setter: Setter<T>) -> Self {
        self.setter = Some(setter);
        self
    }
    pub fn key(&self) -> &str {
        &self.key
    }
    pub fn parent(&self) -> &str {
        &self.parent
    }
    pub fn kind(&self) -> InputKind {
        self.kind
    }
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    fn bind(self) -> Result<Bound<T>, ConfigError> {
        let key = self.key.clone();
        let mut path = self
            .parent
            .parse::<ParentPath>()
            .map_err(|source| ConfigError::Path { key: key.clone(), source })?;
        if self.broadcast {
            if self.kind.element().is_none() {
                return Err(ConfigError::Broadcast { key });
            }
            path = path.broadcast().ok_or_else(|| ConfigError::Broadcast { key: key.clone() })?;
        }
        path.check_unambiguous().map_err(|source| ConfigError::Path { key: key.clone(), source })?;
        if path.is_broadcast() && self.kind.element().is_none() {
            return Err(ConfigError::Broadcast { key });
        }

        if self.kind.is_composite() {
            if !matches!(self.rule, Rule::MustExist | Rule::MustNotExist) {
                return Err(rule_not_allowed(key, &self.rule, self.kind));
            }
            if self.setter.is_some() {
                return Err(ConfigError::CompositeSetter { key, declared: self.kind });
            }
        }
        if self.kind.is_array() && matches!(self.rule, Rule::IsOneOf(_) | Rule::IsNotOneOf(_)) {
            return Err(rule_not_allowed(key, &self.rule, self.kind));
        }
        if let Some(bad) = self.rule.comparison_values().iter().find(|v| !fits(self.kind, v)) {
            tracing::debug!(key = %key, found = %bad.kind(), "comparison value rejected");
            return Err(ConfigError::CompareKind { key, declared: self.kind });
        }
        if let Some(setter) = &self.setter {
            if !setter.accepts(self.kind) {
                return Err(ConfigError::SetterKind { key, setter: setter.input_kind(), declared: self.kind });
            }
        }
        Ok(Bound { entry: self, path })
    }
}

fn rule_not_allowed(key: String, rule: &Rule, declared: InputKind) -> ConfigError {
    ConfigError::RuleNotAllowed { key, rule: rule.name(), declared }
}

impl<T> fmt::Debug for RuleEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEntry")
            .field("key", &self.key)
            .field("parent", &self.parent)
            .field("kind", &self.kind)
            .field("rule", &self.rule)
            .field("setter", &self.setter)
            .field("broadcast", &self.broadcast)
            .finish()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RULE TABLE
// ————————————————————————————————————————————————————————————————————————————

impl<T> RuleTable<T> {
    pub fn new(entries: Vec<RuleEntry<T>>) -> Result<Self, ConfigError> {
        let entries = entries.into_iter().map(RuleEntry::bind).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn entries(&self) -> impl Iterator<Item = &RuleEntry<T>> {
        self.entries.iter().map(|b| &b.entry)
    }

    pub fn analyze(&self, content: &KeyMap, target: &mut T) -> Result<(), AnalyzeError> {
        for bound in &self.entries {
            let entry = &bound.entry;
            if let Err(violation) = check(bound, content, target) {
                tracing::error!(key = %entry.key, parent = %entry.parent, %violation, "analysis failed");
                return Err(AnalyzeError {
                    key: entry.key.clone(),
                    parent: entry.parent.clone(),
                    violation,
                });
            }
        }
        Ok(())
    }
}

impl<T> Analyzer for RuleTable<T> {
    type Target = T;
    fn rules(&self) -> &RuleTable<T> {
        self
    }
}

fn check<T>(bound: &Bound<T>, content: &KeyMap, target: &mut T) -> Result<(), Violation> {
    let entry = &bound.entry;
    tracing::trace!(key = %entry.key, path = %bound.path, kind = %entry.kind, rule = entry.rule.name(), "rule");
    let extracted = extract(content, &bound.path, &entry.key, entry.kind)?;
    match (&entry.rule, &extracted) {
        (Rule::Any, _) => {}
        (Rule::MustNotExist, Extracted::Missing) => {}
        (Rule::MustNotExist, _) => return Err(Violation::Present),
        (_, Extracted::Missing) => return Err(Violation::Missing),
        (_, Extracted::Partial(index)) => return Err(Violation::IncompleteBroadcast { index: *index }),
        (Rule::MustExist, Extracted::Present(_)) => {}
        (Rule::MustEqual(expected), Extracted::Present(value)) => {
            if value != expected {
                return Err(Violation::NotEqual);
            }
        }
        (Rule::MustNotEqual(forbidden), Extracted::Present(value)) => {
            if value == forbidden {
                return Err(Violation::Equal);
            }
        }
        (Rule::IsOneOf(allowed), Extracted::Present(value)) => {
            if !allowed.contains(value) {
                return Err(Violation::NotOneOf);
            }
        }
        (Rule::IsNotOneOf(forbidden), Extracted::Present(value)) => {
            if forbidden.contains(value) {
                return Err(Violation::OneOf);
            }
        }
    }
    if let (Some(setter), Extracted::Present(value)) = (&entry.setter, &extracted) {
        setter.apply(target, value, entry.kind)?;
    }
    Ok(())
}

fn extract(content: &KeyMap, path: &ParentPath, key: &str, kind: InputKind) -> Result<Extracted, Violation> {
    match path::resolve(content, path, key)? {
        Resolved::Missing | Resolved::Found(Value::Absent) => Ok(Extracted::Missing),
        Resolved::Found(value) => {
            expect_kind(kind, value)?;
            Ok(Extracted::Present(value.clone()))
        }
        Resolved::Broadcast(values) => {
            if let Some(index) = values.iter().position(Value::is_absent) {
                if values.iter().all(Value::is_absent) {
                    return Ok(Extracted::Missing);
                }
                return Ok(Extracted::Partial(index));
            }
            let value = Value::Array(values);
            expect_kind(kind, &value)?;
            Ok(Extracted::Present(value))
        }
    }
}

fn expect_kind(kind: InputKind, value: &Value) -> Result<(), Violation> {
    if fits(kind, value) {
        Ok(())
    } else {
        Err(Violation::Kind { declared: kind, found: value.kind() })
    }
}

/// Whether `value` is a legal cell for a field declared `kind`.
fn fits(kind: InputKind, value: &Value) -> bool {
    match (kind, value) {
        (InputKind::String | InputKind::Coordinates, Value::String(_)) => true,
        (InputKind::Integer32, Value::Int32(_)) => true,
        (InputKind::Integer64, Value::Int64(_)) => true,
        (InputKind::Boolean, Value::Bool(_)) => true,
        (InputKind::Real, Value::Real(_)) => true,
        (InputKind::Object, Value::Object(_)) => true,
        (InputKind::ArrayObject, Value::Array(xs)) => xs.iter().all(|x| matches!(x, Value::Object(_))),
        (kind, Value::Array(xs)) => match kind.element() {
            Some(element) => xs.iter().all(|x| fits(element, x)),
            None => false,
        },
        _ => false,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    #[derive(Debug, Default)]
    struct Report {
        timestamp: String,
        cistern: String,
        ports: Vec<i32>,
        values: Vec<f64>,
        units: Vec<String>,
        enabled: bool,
    }

    static SENSOR_RULES: Lazy<RuleTable<Report>> = Lazy::new(|| {
        RuleTable::new(vec![
            RuleEntry::new("data", InputKind::Object, Rule::MustExist),
            RuleEntry::new("timestamp", InputKind::String, Rule::MustExist)
                .under("data")
                .setter(Setter::string(|r: &mut Report, v| r.timestamp = v)),
            RuleEntry::new("cisternCode", InputKind::String, Rule::Any)
                .under("data")
                .setter(Setter::string(|r: &mut Report, v| r.cistern = v)),
            RuleEntry::new("sensorData", InputKind::ArrayObject, Rule::MustExist).under("data"),
            RuleEntry::new("port", InputKind::ArrayInteger32, Rule::MustExist)
                .under("data/sensorData")
                .broadcast()
                .setter(Setter::array_int32(|r: &mut Report, v| r.ports = v)),
            RuleEntry::new("value", InputKind::ArrayReal, Rule::MustExist)
                .under("data/sensorData")
                .broadcast()
                .setter(Setter::array_real(|r: &mut Report, v| r.values = v)),
            RuleEntry::new("unit", InputKind::ArrayString, Rule::Any)
                .under("data/sensorData")
                .broadcast()
                .setter(Setter::array_string(|r: &mut Report, v| r.units = v)),
        ])
        .expect("sensor rules")
    });

    fn row(port: i32, value: Option<f64>, unit: &str) -> Value {
        let mut m = KeyMap::new();
        m.set("port", port);
        if let Some(value) = value {
            m.set("value", value);
        }
        m.set("unit", unit);
        Value::Object(m)
    }

    fn sensor_document(rows: Vec<Value>) -> KeyMap {
        let mut data = KeyMap::new();
        data.set("timestamp", "2021-01-01T00:00:00.000+09:00");
        data.set("sensorData", rows);
        let mut root = KeyMap::new();
        root.set_object("data", data);
        root
    }

    #[test]
    fn broadcast_populates_in_element_order() {
        let doc = sensor_document(vec![row(3, Some(1.5), "C"), row(1, Some(2.5), "%"), row(2, Some(0.5), "C")]);
        let mut report = Report::default();
        SENSOR_RULES.analyze(&doc, &mut report).unwrap();
        assert_eq!(report.timestamp, "2021-01-01T00:00:00.000+09:00");
        assert_eq!(report.cistern, "");
        assert_eq!(report.ports, [3, 1, 2]);
        assert_eq!(report.values, [1.5, 2.5, 0.5]);
        assert_eq!(report.units, ["C", "%", "C"]);
    }

    #[test]
    fn broadcast_fails_at_entry_key_when_an_element_lacks_the_field() {
        let doc = sensor_document(vec![row(1, Some(1.0), "C"), row(2, None, "C"), row(3, Some(3.0), "C")]);
        let err = SENSOR_RULES.analyze(&doc, &mut Report::default()).unwrap_err();
        assert_eq!(err.key, "value");
        assert_eq!(err.parent, "data/sensorData");
        assert!(matches!(err.violation, Violation::IncompleteBroadcast { index: 1 }));
    }

    #[test]
    fn first_failing_entry_wins() {
        let table = RuleTable::<Report>::new(vec![
            RuleEntry::new("a", InputKind::String, Rule::MustExist),
            RuleEntry::new("b", InputKind::String, Rule::Any),
            RuleEntry::new("c", InputKind::String, Rule::MustExist),
        ])
        .unwrap();
        let err = table.analyze(&KeyMap::new(), &mut Report::default()).unwrap_err();
        assert_eq!(err.key, "a");
    }

    #[test]
    fn comparison_rules() {
        let mut doc = KeyMap::new();
        doc.set("mode", "auto");
        doc.set("level", 3);
        doc.set("flags", vec![true, false]);
        let run = |entry: RuleEntry<Report>| {
            RuleTable::new(vec![entry]).unwrap().analyze(&doc, &mut Report::default()).map_err(|e| e.violation)
        };
        assert!(run(RuleEntry::new("mode", InputKind::String, Rule::MustEqual("auto".into()))).is_ok());
        assert!(matches!(
            run(RuleEntry::new("mode", InputKind::String, Rule::MustNotEqual("auto".into()))),
            Err(Violation::Equal)
        ));
        assert!(run(RuleEntry::new("level", InputKind::Integer32, Rule::IsOneOf(vec![1.into(), 3.into()]))).is_ok());
        assert!(matches!(
            run(RuleEntry::new("level", InputKind::Integer32, Rule::IsNotOneOf(vec![3.into()]))),
            Err(Violation::OneOf)
        ));
        assert!(run(RuleEntry::new("flags", InputKind::ArrayBoolean, Rule::MustEqual(vec![true, false].into()))).is_ok());
        assert!(matches!(
            run(RuleEntry::new("flags", InputKind::ArrayBoolean, Rule::MustEqual(vec![true].into()))),
            Err(Violation::NotEqual)
        ));
        assert!(matches!(run(RuleEntry::new("mode", InputKind::String, Rule::MustNotExist)), Err(Violation::Present)));
        assert!(run(RuleEntry::new("nope", InputKind::String, Rule::MustNotExist)).is_ok());
        assert!(matches!(
            run(RuleEntry::new("nope", InputKind::String, Rule::MustEqual("x".into()))),
            Err(Violation::Missing)
        ));
    }

    #[test]
    fn declared_kind_is_strict() {
        let mut doc = KeyMap::new();
        doc.set("level", 3i64);
        let table = RuleTable::<Report>::new(vec![RuleEntry::new("level", InputKind::Integer32, Rule::Any)]).unwrap();
        let err = table.analyze(&doc, &mut Report::default()).unwrap_err();
        assert!(matches!(err.violation, Violation::Kind { declared: InputKind::Integer32, .. }));
    }

    #[test]
    fn misconfigured_entries_are_rejected() {
        let table = |entry: RuleEntry<Report>| RuleTable::new(vec![entry]).err();
        assert!(matches!(
            table(RuleEntry::new("x", InputKind::Integer32, Rule::Any).setter(Setter::string(|r: &mut Report, v| r.cistern = v))),
            Some(ConfigError::SetterKind { .. })
        ));
        assert!(matches!(
            table(RuleEntry::new("x", InputKind::Integer32, Rule::MustEqual("1".into()))),
            Some(ConfigError::CompareKind { .. })
        ));
        assert!(matches!(
            table(RuleEntry::new("x", InputKind::Object, Rule::Any)),
            Some(ConfigError::RuleNotAllowed { .. })
        ));
        assert!(matches!(
            table(RuleEntry::new("x", InputKind::ArrayObject, Rule::IsOneOf(vec![]))),
            Some(ConfigError::RuleNotAllowed { .. })
        ));
        assert!(matches!(
            table(RuleEntry::new("x", InputKind::ArrayInteger32, Rule::IsNotOneOf(vec![]))),
            Some(ConfigError::RuleNotAllowed { .. })
        ));
        assert!(matches!(
            table(RuleEntry::new("x", InputKind::Integer32, Rule::MustExist).under("rows").broadcast()),
            Some(ConfigError::Broadcast { .. })
        ));
        assert!(matches!(
            table(RuleEntry::new("x", InputKind::ArrayInteger32, Rule::MustExist).broadcast()),
            Some(ConfigError::Broadcast { .. })
        ));
        assert!(matches!(
            table(RuleEntry::new("x", InputKind::ArrayInteger32, Rule::MustExist).under("rows[]/inner")),
            Some(ConfigError::Path { .. })
        ));
    }

    #[test]
    fn composite_setter_is_rejected() {
        // no composite setter type exists, so the only way in is a scalar setter
        let entry = RuleEntry::<Report>::new("data", InputKind::Object, Rule::MustExist)
            .setter(Setter::bool(|r: &mut Report, v| r.enabled = v));
        assert!(matches!(RuleTable::new(vec![entry]), Err(ConfigError::CompositeSetter { .. })));
    }

    #[test]
    fn setter_failures_fold_into_the_entry_key() {
        let mut doc = KeyMap::new();
        doc.set("enabled", true);
        doc.set("name", "tank");
        let failing = RuleTable::<Report>::new(vec![
            RuleEntry::new("enabled", InputKind::Boolean, Rule::MustExist)
                .setter(Setter::try_bool(|_r: &mut Report, _v| anyhow::bail!("read-only"))),
        ])
        .unwrap();
        let err = failing.analyze(&doc, &mut Report::default()).unwrap_err();
        assert_eq!(err.key, "enabled");
        assert!(matches!(&err.violation, Violation::Setter(msg) if msg == "read-only"));

        let panicking = RuleTable::<Report>::new(vec![
            RuleEntry::new("name", InputKind::String, Rule::MustExist)
                .setter(Setter::string(|_r: &mut Report, v| panic!("cannot store {v}"))),
        ])
        .unwrap();
        let err = panicking.analyze(&doc, &mut Report::default()).unwrap_err();
        assert_eq!(err.key, "name");
        assert!(matches!(&err.violation, Violation::Setter(msg) if msg == "cannot store tank"));
    }

    #[test]
    fn indexed_path_reads_one_element() {
        let doc = sensor_document(vec![row(7, Some(1.0), "C"), row(8, Some(2.0), "F")]);
        let table = RuleTable::<Report>::new(vec![
            RuleEntry::new("unit", InputKind::String, Rule::MustEqual("F".into()))
                .under("data/sensorData[1]")
                .setter(Setter::string(|r: &mut Report, v| r.cistern = v)),
        ])
        .unwrap();
        let mut report = Report::default();
        table.analyze(&doc, &mut report).unwrap();
        assert_eq!(report.cistern, "F");
    }
}
