//! Field descriptors: static per-field schema metadata.
//!
//! A schema is a flat, depth-ordered list. A descriptor at depth `d + 1`
//! directly after an object (or array-of-object) descriptor at depth `d`
//! describes one of its children:
//!
//! ```text
//! data          0  Object
//!   timestamp   1  String
//!   sensorData  1  ArrayObject
//!     port      2  Integer32
//! ```
//!
//! Lists are validated once by [`DescriptorSet::new`] and shared read-only
//! afterwards.
use std::fmt;

use chrono::{DateTime, FixedOffset};
use regex::Regex;

use crate::error::ConfigError;
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Declared kind of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputKind {
    String,
    Integer32,
    Integer64,
    Boolean,
    Real,
    Object,
    ArrayString,
    ArrayInteger32,
    ArrayInteger64,
    ArrayBoolean,
    ArrayReal,
    ArrayObject,
    /// A non-empty nested array of numbers, kept as its compact text form.
    Coordinates,
}

/// Inclusive bounds. For strings the bound applies to the number of
/// characters, for numbers to the value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateFormat {
    /// `yyyy-MM-ddTHH:mm:ss.SSS±hh:mm`
    Iso8601Fraction,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub key: String,
    pub depth: usize,
    pub kind: InputKind,
    pub range: Option<Range>,
    pub enumeration: Vec<i64>,
    pub pattern: Option<String>,
    pub date_format: Option<DateFormat>,
    pub omit: bool,
    pub nullable: bool,
    pub allow_empty: bool,
    pub error_continue: bool,
    pub default: Option<Value>,
}

/// A validated descriptor list.
#[derive(Debug)]
pub struct DescriptorSet {
    fields: Vec<Field>,
}

/// A descriptor with its pattern compiled.
#[derive(Debug)]
pub(crate) struct Field {
    pub descriptor: FieldDescriptor,
    pub matcher: Option<Matcher>,
}

#[derive(Debug)]
pub(crate) enum Matcher {
    Whole(Regex),
    LonLat { lon: Regex, lat: Regex },
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputKind {
    pub fn is_composite(self) -> bool {
        matches!(self, Self::Object | Self::ArrayObject)
    }
    pub fn is_array(self) -> bool {
        self.element().is_some() || self == Self::ArrayObject
    }
    /// Element kind of an array of scalars.
    pub fn element(self) -> Option<InputKind> {
        match self {
            Self::ArrayString => Some(Self::String),
            Self::ArrayInteger32 => Some(Self::Integer32),
            Self::ArrayInteger64 => Some(Self::Integer64),
            Self::ArrayBoolean => Some(Self::Boolean),
            Self::ArrayReal => Some(Self::Real),
            _ => None,
        }
    }
    fn is_integer(self) -> bool {
        matches!(self, Self::Integer32 | Self::Integer64 | Self::ArrayInteger32 | Self::ArrayInteger64)
    }
    fn accepts_range(self) -> bool {
        !matches!(self, Self::Boolean | Self::ArrayBoolean | Self::Object | Self::ArrayObject | Self::Coordinates)
    }
    fn accepts_pattern(self) -> bool {
        matches!(self, Self::String | Self::ArrayString | Self::Real | Self::ArrayReal | Self::Coordinates)
    }
    /// Whether `value` is a legal default for this kind.
    fn fits_default(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String | Self::Coordinates, Value::String(_))
                | (Self::Integer32, Value::Int32(_))
                | (Self::Integer64, Value::Int64(_))
                | (Self::Boolean, Value::Bool(_))
                | (Self::Real, Value::Real(_))
        )
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer32 => "integer32",
            Self::Integer64 => "integer64",
            Self::Boolean => "boolean",
            Self::Real => "real",
            Self::Object => "object",
            Self::ArrayString => "array<string>",
            Self::ArrayInteger32 => "array<integer32>",
            Self::ArrayInteger64 => "array<integer64>",
            Self::ArrayBoolean => "array<boolean>",
            Self::ArrayReal => "array<real>",
            Self::ArrayObject => "array<object>",
            Self::Coordinates => "coordinates",
        };
        f.write_str(name)
    }
}

impl Range {
    pub fn contains(&self, x: f64) -> bool {
        self.min <= x && x <= self.max
    }
}

impl DateFormat {
    /// Map a configuration format name onto a supported format.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "yyyy-MM-ddTHH:mm:ss.SSSZ+09:00"
            | "yyyy-MM-ddTHH:mm:ss.SSS+09:00"
            | "yyyy-MM-ddTHH:mm:ss.SSSZ" => Some(Self::Iso8601Fraction),
            _ => None,
        }
    }
    pub fn parse(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Iso8601Fraction => DateTime::parse_from_rfc3339(text).ok(),
        }
    }
}

impl FieldDescriptor {
    pub fn new(key: impl Into<String>, depth: usize, kind: InputKind) -> Self {
        Self {
            key: key.into(),
            depth,
            kind,
            range: None,
            enumeration: Vec::new(),
            pattern: None,
            date_format: None,
            omit: false,
            nullable: false,
            allow_empty: false,
            error_continue: false,
            default: None,
        }
    }
    pub fn omittable(mut self) -> Self {
        self.omit = true;
        self
    }
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }
    pub fn error_continue(mut self) -> Self {
        self.error_continue = true;
        self
    }
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(Range { min, max });
        self
    }
    pub fn one_of(mut self, values: impl IntoIterator<Item = i64>) -> Self {
        self.enumeration = values.into_iter().collect();
        self
    }
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
    pub fn date_format(mut self, format: DateFormat) -> Self {
        self.date_format = Some(format);
        self
    }
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn invalid(&self, detail: impl Into<String>) -> ConfigError {
        ConfigError::Descriptor { key: self.key.clone(), detail: detail.into() }
    }

    fn compile(&self) -> Result<Option<Matcher>, ConfigError> {
        let Some(source) = self.pattern.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        if !self.kind.accepts_pattern() {
            return Err(self.invalid(format!("pattern is not supported for {}", self.kind)));
        }
        if self.kind == InputKind::Coordinates {
            let parts: Vec<&str> = source
                .split("//")
                .map(|p| p.trim_matches('/'))
                .filter(|p| !p.is_empty())
                .collect();
            let [lon, lat] = parts.as_slice() else {
                return Err(ConfigError::Pattern {
                    key: self.key.clone(),
                    detail: "coordinates pattern must be `lon//lat`".to_owned(),
                });
            };
            return Ok(Some(Matcher::LonLat {
                lon: anchored(&self.key, lon)?,
                lat: anchored(&self.key, lat)?,
            }));
        }
        Ok(Some(Matcher::Whole(anchored(&self.key, source)?)))
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.key.is_empty() {
            return Err(self.invalid("empty key"));
        }
        if self.range.is_some() && !self.kind.accepts_range() {
            return Err(self.invalid(format!("range is not supported for {}", self.kind)));
        }
        if let Some(Range { min, max }) = self.range {
            if !(min <= max) {
                return Err(self.invalid(format!("range {min}..={max} is empty")));
            }
        }
        if !self.enumeration.is_empty() && !self.kind.is_integer() {
            return Err(self.invalid(format!("enumeration is not supported for {}", self.kind)));
        }
        if self.date_format.is_some() && !matches!(self.kind, InputKind::String | InputKind::ArrayString) {
            return Err(self.invalid(format!("date format is not supported for {}", self.kind)));
        }
        if let Some(default) = &self.default {
            if !self.kind.fits_default(default) {
                return Err(self.invalid(format!("default {} does not fit {}", default.kind(), self.kind)));
            }
        }
        Ok(())
    }
}

impl DescriptorSet {
    /// Validate a depth-ordered descriptor list.
    pub fn new(descriptors: Vec<FieldDescriptor>) -> Result<Self, ConfigError> {
        let mut fields = Vec::with_capacity(descriptors.len());
        let mut previous: Option<&FieldDescriptor> = None;
        for descriptor in &descriptors {
            descriptor.check()?;
            let max_depth = match previous {
                None => 0,
                Some(p) if p.kind.is_composite() => p.depth + 1,
                Some(p) => p.depth,
            };
            if descriptor.depth > max_depth {
                return Err(descriptor.invalid(format!(
                    "depth {} does not follow a parent at depth {}",
                    descriptor.depth,
                    descriptor.depth - 1,
                )));
            }
            previous = Some(descriptor);
        }
        for descriptor in descriptors {
            let matcher = descriptor.compile()?;
            fields.push(Field { descriptor, matcher });
        }
        tracing::debug!(fields = fields.len(), "descriptor set ready");
        Ok(Self { fields })
    }
    pub fn len(&self) -> usize {
        self.fields.len()
    }
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
    pub fn descriptors(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().map(|f| &f.descriptor)
    }
    pub(crate) fn fields(&self) -> &[Field] {
        &self.fields
    }
}

impl Matcher {
    /// For [`Matcher::LonLat`], `text` is the compact coordinates text; every
    /// number in it is checked, alternating lon and lat.
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Whole(rx) => rx.is_match(text),
            Self::LonLat { lon, lat } => {
                let tokens: Vec<&str> = text
                    .split(|c: char| c == ',' || c == '[' || c == ']' || c.is_whitespace())
                    .filter(|t| !t.is_empty())
                    .collect();
                if tokens.is_empty() || tokens.len() % 2 != 0 {
                    return false;
                }
                tokens.chunks(2).all(|pair| lon.is_match(pair[0]) && lat.is_match(pair[1]))
            }
        }
    }
}

fn anchored(key: &str, source: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{source})$")).map_err(|error| ConfigError::Pattern {
        key: key.to_owned(),
        detail: error.to_string(),
    })
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
