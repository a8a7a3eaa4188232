//! JSON grammar for [`StructuralDecoder`].
use serde_json::{Map, Value as JsonValue};

use super::StructuralDecoder;
use crate::descriptor::{DescriptorSet, Field, InputKind};
use crate::error::{DecodeError, EncodeError, FieldFault};
use crate::keymap::KeyMap;
use crate::value::Value;

// ---- Policy ----

/// Offset, in hours, that date-formatted strings must carry.
pub const DEFAULT_TIME_ZONE_HOURS: i32 = 9;

/// Decimal places used when matching a real against its pattern.
const REAL_PATTERN_PRECISION: usize = 8;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Debug)]
pub struct JsonDecoder {
    time_zone_hours: i32,
    pretty: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Default for JsonDecoder {
    fn default() -> Self {
        Self { time_zone_hours: DEFAULT_TIME_ZONE_HOURS, pretty: false }
    }
}

impl JsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_time_zone(mut self, hours: i32) -> Self {
        self.time_zone_hours = hours;
        self
    }
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl StructuralDecoder for JsonDecoder {
    fn decode_at(&self, text: &str, fields: &DescriptorSet, base_key: &str) -> Result<KeyMap, DecodeError> {
        tracing::info!(fields = fields.len(), base_key, "decode start");
        let root = serde_json::from_str::<JsonValue>(text).map_err(|error| syntax_error(text, &error))?;
        let base = locate_base(&root, base_key)?;
        let mut out = KeyMap::new();
        let result = self.decode_level(fields.fields(), 0, 0, base, "", &mut out);
        if let Err(error) = &result {
            tracing::error!(key = error.key(), %error, "decode failed");
        }
        result?;
        tracing::info!(entries = out.len(), "decode complete");
        Ok(out)
    }

    fn encode(&self, content: &KeyMap) -> Result<String, EncodeError> {
        let json = JsonValue::Object(object_to_json(content, "")?);
        let text = if self.pretty {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        };
        let text = text.map_err(|error| EncodeError::Serialize(error.to_string()))?;
        tracing::debug!(%text, "encoded");
        Ok(text)
    }
}

// ---- Decoding ----

impl JsonDecoder {
    /// Decode every descriptor at `depth` starting from `start`, stopping at
    /// the first descriptor that climbs back above `depth`.
    fn decode_level(
        &self,
        fields: &[Field],
        depth: usize,
        start: usize,
        node: &Map<String, JsonValue>,
        prefix: &str,
        out: &mut KeyMap,
    ) -> Result<(), DecodeError> {
        for (index, field) in fields.iter().enumerate().skip(start) {
            let descriptor = &field.descriptor;
            if descriptor.depth > depth {
                continue;
            }
            if descriptor.depth < depth {
                break;
            }
            let key_path = full_key(prefix, &descriptor.key);
            match self.decode_field(fields, index, node, &key_path, out) {
                Ok(()) => {}
                Err(error) if descriptor.error_continue => {
                    tracing::warn!(key = %key_path, %error, "field skipped");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    fn decode_field(
        &self,
        fields: &[Field],
        index: usize,
        node: &Map<String, JsonValue>,
        key_path: &str,
        out: &mut KeyMap,
    ) -> Result<(), DecodeError> {
        let field = &fields[index];
        let descriptor = &field.descriptor;
        let raw = match node.get(&descriptor.key) {
            None => return absent(field, key_path, out),
            Some(JsonValue::Null) => return null(field, key_path, out),
            Some(raw) => raw,
        };
        let value = match descriptor.kind {
            InputKind::Object => {
                let object = expect_object(descriptor.kind, raw, key_path)?;
                let mut child = KeyMap::new();
                self.decode_level(fields, descriptor.depth + 1, index + 1, object, key_path, &mut child)?;
                Value::Object(child)
            }
            InputKind::ArrayObject => {
                let elements = expect_array(descriptor.kind, raw, key_path)?;
                let mut objects = Vec::with_capacity(elements.len());
                for (i, element) in elements.iter().enumerate() {
                    let element_key = format!("{key_path}.[{i}]");
                    let object = expect_object(InputKind::Object, element, &element_key)?;
                    let mut child = KeyMap::new();
                    self.decode_level(fields, descriptor.depth + 1, index + 1, object, &element_key, &mut child)?;
                    objects.push(Value::Object(child));
                }
                Value::Array(objects)
            }
            kind => match kind.element() {
                Some(element_kind) => {
                    let elements = expect_array(kind, raw, key_path)?;
                    let values = elements
                        .iter()
                        .enumerate()
                        .map(|(i, element)| self.scalar(field, element_kind, element, &format!("{key_path}.[{i}]")))
                        .collect::<Result<Vec<_>, _>>()?;
                    Value::Array(values)
                }
                None => self.scalar(field, kind, raw, key_path)?,
            },
        };
        out.set(descriptor.key.clone(), value);
        Ok(())
    }

    fn scalar(&self, field: &Field, kind: InputKind, raw: &JsonValue, key: &str) -> Result<Value, DecodeError> {
        let descriptor = &field.descriptor;
        let fail = |fault: FieldFault, value: Option<Value>| DecodeError::Field {
            key: key.to_owned(),
            fault,
            value,
        };
        let mismatch = || fail(FieldFault::Kind { expected: kind, found: json_kind(raw) }, None);
        match kind {
            InputKind::String => {
                let JsonValue::String(text) = raw else {
                    return Err(mismatch());
                };
                if text.is_empty() {
                    if descriptor.allow_empty {
                        return Ok(descriptor.default.clone().unwrap_or_else(|| Value::String(String::new())));
                    }
                    return Err(fail(FieldFault::Empty, Some(Value::String(String::new()))));
                }
                let offending = || Some(Value::String(text.clone()));
                if let Some(range) = descriptor.range {
                    if !range.contains(text.chars().count() as f64) {
                        return Err(fail(FieldFault::OutOfRange, offending()));
                    }
                }
                if let Some(matcher) = &field.matcher {
                    if !matcher.is_match(text) {
                        return Err(fail(FieldFault::Pattern, offending()));
                    }
                }
                if let Some(format) = descriptor.date_format {
                    let date = format.parse(text).ok_or_else(|| fail(FieldFault::DateFormat, offending()))?;
                    if date.offset().local_minus_utc() != self.time_zone_hours * 3600 {
                        let fault = FieldFault::TimeZone { expected_hours: self.time_zone_hours };
                        return Err(fail(fault, offending()));
                    }
                }
                Ok(Value::String(text.clone()))
            }
            InputKind::Integer32 | InputKind::Integer64 => {
                let JsonValue::Number(number) = raw else {
                    return Err(mismatch());
                };
                if number.is_f64() {
                    return Err(mismatch());
                }
                let Some(wide) = number.as_i64() else {
                    return Err(fail(FieldFault::OutOfRange, None));
                };
                let value = if kind == InputKind::Integer32 {
                    let narrow = i32::try_from(wide).map_err(|_| fail(FieldFault::OutOfRange, Some(Value::Int64(wide))))?;
                    Value::Int32(narrow)
                } else {
                    Value::Int64(wide)
                };
                if let Some(range) = descriptor.range {
                    if !range.contains(wide as f64) {
                        return Err(fail(FieldFault::OutOfRange, Some(value)));
                    }
                }
                if !descriptor.enumeration.is_empty() && !descriptor.enumeration.contains(&wide) {
                    return Err(fail(FieldFault::NotInEnum, Some(value)));
                }
                Ok(value)
            }
            InputKind::Boolean => match raw {
                JsonValue::Bool(b) => Ok(Value::Bool(*b)),
                _ => Err(mismatch()),
            },
            InputKind::Real => {
                let JsonValue::Number(number) = raw else {
                    return Err(mismatch());
                };
                let Some(real) = number.as_f64().filter(|_| number.is_f64()) else {
                    return Err(mismatch());
                };
                if let Some(range) = descriptor.range {
                    if !range.contains(real) {
                        return Err(fail(FieldFault::OutOfRange, Some(Value::Real(real))));
                    }
                }
                if let Some(matcher) = &field.matcher {
                    if !matcher.is_match(&format_real(real)) {
                        return Err(fail(FieldFault::Pattern, Some(Value::Real(real))));
                    }
                }
                Ok(Value::Real(real))
            }
            InputKind::Coordinates => {
                let non_empty = raw.as_array().is_some_and(|xs| !xs.is_empty());
                if !non_empty {
                    return Err(fail(FieldFault::Coordinates, None));
                }
                let text = serde_json::to_string(raw).map_err(|_| fail(FieldFault::Coordinates, None))?;
                if let Some(matcher) = &field.matcher {
                    if !matcher.is_match(&text) {
                        return Err(fail(FieldFault::Pattern, Some(Value::String(text))));
                    }
                }
                Ok(Value::String(text))
            }
            InputKind::Object
            | InputKind::ArrayObject
            | InputKind::ArrayString
            | InputKind::ArrayInteger32
            | InputKind::ArrayInteger64
            | InputKind::ArrayBoolean
            | InputKind::ArrayReal => Err(mismatch()),
        }
    }
}

/// Key missing from the input object.
fn absent(field: &Field, key_path: &str, out: &mut KeyMap) -> Result<(), DecodeError> {
    let descriptor = &field.descriptor;
    if descriptor.omit {
        tracing::debug!(key = %key_path, "omitted");
        return Ok(());
    }
    if descriptor.nullable {
        if let Some(default) = &descriptor.default {
            tracing::debug!(key = %key_path, "absent, default written");
            out.set(descriptor.key.clone(), default.clone());
        }
        return Ok(());
    }
    Err(DecodeError::Field { key: key_path.to_owned(), fault: FieldFault::Missing, value: None })
}

/// Key present with an explicit `null`.
fn null(field: &Field, key_path: &str, out: &mut KeyMap) -> Result<(), DecodeError> {
    let descriptor = &field.descriptor;
    if !descriptor.nullable {
        return Err(DecodeError::Field { key: key_path.to_owned(), fault: FieldFault::Null, value: None });
    }
    if descriptor.kind.is_composite() {
        tracing::debug!(key = %key_path, "null composite skipped");
        return Ok(());
    }
    out.set(descriptor.key.clone(), descriptor.default.clone().unwrap_or_default());
    Ok(())
}

// ---- Encoding ----

fn object_to_json(content: &KeyMap, prefix: &str) -> Result<Map<String, JsonValue>, EncodeError> {
    let mut out = Map::with_capacity(content.len());
    for (key, value) in content.iter() {
        out.insert(key.to_owned(), value_to_json(value, &full_key(prefix, key))?);
    }
    Ok(out)
}

fn value_to_json(value: &Value, key: &str) -> Result<JsonValue, EncodeError> {
    Ok(match value {
        Value::Absent => JsonValue::Null,
        Value::String(x) => JsonValue::String(x.clone()),
        Value::Int32(x) => JsonValue::from(*x),
        Value::Int64(x) => JsonValue::from(*x),
        Value::Bool(x) => JsonValue::Bool(*x),
        Value::Real(x) => serde_json::Number::from_f64(*x)
            .map(JsonValue::Number)
            .ok_or_else(|| EncodeError::NonFiniteReal { key: key.to_owned() })?,
        Value::Object(map) => JsonValue::Object(object_to_json(map, key)?),
        Value::Array(xs) => JsonValue::Array(
            xs.iter()
                .enumerate()
                .map(|(i, x)| value_to_json(x, &format!("{key}.[{i}]")))
                .collect::<Result<_, _>>()?,
        ),
    })
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn full_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() { key.to_owned() } else { format!("{prefix}.{key}") }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_f64() => "real",
        JsonValue::Number(_) => "integer",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn expect_object<'a>(kind: InputKind, raw: &'a JsonValue, key: &str) -> Result<&'a Map<String, JsonValue>, DecodeError> {
    raw.as_object().ok_or_else(|| DecodeError::Field {
        key: key.to_owned(),
        fault: FieldFault::Kind { expected: kind, found: json_kind(raw) },
        value: None,
    })
}

fn expect_array<'a>(kind: InputKind, raw: &'a JsonValue, key: &str) -> Result<&'a [JsonValue], DecodeError> {
    raw.as_array().map(Vec::as_slice).ok_or_else(|| DecodeError::Field {
        key: key.to_owned(),
        fault: FieldFault::Kind { expected: kind, found: json_kind(raw) },
        value: None,
    })
}

fn locate_base<'a>(root: &'a JsonValue, base_key: &str) -> Result<&'a Map<String, JsonValue>, DecodeError> {
    let not_found = || DecodeError::BaseKeyNotFound(base_key.to_owned());
    let mut cursor = root;
    for segment in base_key.split('/').filter(|s| !s.is_empty()) {
        cursor = cursor.as_object().and_then(|m| m.get(segment)).ok_or_else(not_found)?;
    }
    match cursor {
        JsonValue::Object(map) => Ok(map),
        _ if base_key.split('/').any(|s| !s.is_empty()) => Err(not_found()),
        other => Err(DecodeError::Field {
            key: String::new(),
            fault: FieldFault::Kind { expected: InputKind::Object, found: json_kind(other) },
            value: None,
        }),
    }
}

/// Render a real the way its pattern sees it: fixed precision with trailing
/// zeros trimmed, keeping at least one decimal.
fn format_real(x: f64) -> String {
    let mut text = format!("{x:.prec$}", prec = REAL_PATTERN_PRECISION);
    while text.ends_with('0') && !text.ends_with(".0") {
        text.pop();
    }
    text
}

fn syntax_error(text: &str, error: &serde_json::Error) -> DecodeError {
    let offset = byte_offset(text, error.line(), error.column());
    let key = guess_error_key(&text[..offset]);
    DecodeError::Syntax {
        key,
        line: error.line(),
        column: error.column(),
        message: error.to_string(),
    }
}

fn byte_offset(text: &str, line: usize, column: usize) -> usize {
    let line_start: usize = text.split_inclusive('\n').take(line.saturating_sub(1)).map(str::len).sum();
    let mut offset = (line_start + column).min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// The last object key written before the error position.
fn guess_error_key(prefix: &str) -> String {
    let Some(colon) = prefix.rfind(':') else {
        return String::new();
    };
    let before = prefix[..colon].trim_end();
    let Some(before) = before.strip_suffix('"') else {
        return String::new();
    };
    match before.rfind('"') {
        Some(open) => before[open + 1..].to_owned(),
        None => String::new(),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
