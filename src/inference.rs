//! Descriptor inference from sample documents.
//!
//! Samples are folded into a least-upper-bound shape (`U`) that keeps at most
//! one arm per JSON kind. The join is associative, commutative and
//! idempotent, so sample order never changes the result. [`describe`] lowers
//! a shape onto a depth-ordered descriptor list, and [`emit_schema`] renders a
//! list as a Body schema that [`ContentConfig`](crate::config::ContentConfig)
//! loads back unchanged.
pub mod arr;
pub mod num;
pub mod obj;
pub mod str;

use serde_json::{Map, Value as JsonValue, json};

pub use arr::ArrC;
pub use num::NumC;
pub use obj::{FieldC, ObjC};
pub use str::StrC;

use crate::descriptor::{DateFormat, FieldDescriptor, InputKind, Range};
use crate::error::ConfigError;
use crate::value::Value;

// ------------------------------- Policy ---------------------------------- //

const STRING_ENUM_MAX: usize = 8;       // small, human-ish enum threshold
const STRING_ENUM_MAX_LEN: usize = 16;  // max literal length for enum
const NUM_ENUM_MAX: usize = 8;

// literal caps to avoid ballooning
const MAX_STR_LITS: usize = 64;
const MAX_NUM_LITS: usize = 64;

const COORDINATES_KEY: &str = "coordinates";
const DATE_FORMAT_NAME: &str = "yyyy-MM-ddTHH:mm:ss.SSS+09:00";
const ROOT_KEY: &str = "$";

// ------------------------------ State ------------------------------------ //

#[derive(Clone, Debug, Default)]
pub struct U {
    pub nullable: bool,
    pub has_bool: bool,
    pub num: Option<NumC>,
    pub str_: Option<StrC>,
    pub arr: Option<ArrC>,
    pub obj: Option<ObjC>,
}

impl U {
    pub fn empty() -> Self { Self::default() }

    pub fn is_bottom(&self) -> bool {
        !self.nullable && self.arms() == 0
    }

    /// Number of non-null kinds observed.
    fn arms(&self) -> usize {
        usize::from(self.has_bool)
            + usize::from(self.num.is_some())
            + usize::from(self.str_.is_some())
            + usize::from(self.arr.is_some())
            + usize::from(self.obj.is_some())
    }

    pub fn join(a: &Self, b: &Self) -> Self {
        Self {
            nullable: a.nullable || b.nullable,
            has_bool: a.has_bool || b.has_bool,
            num: join_arm(&a.num, &b.num, NumC::join),
            str_: join_arm(&a.str_, &b.str_, StrC::join),
            arr: join_arm(&a.arr, &b.arr, ArrC::join),
            obj: join_arm(&a.obj, &b.obj, ObjC::join),
        }
    }
}

fn join_arm<T: Clone>(a: &Option<T>, b: &Option<T>, join: fn(&T, &T) -> T) -> Option<T> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => Some(join(x, y)),
    }
}

// ------------------------------ Observe ---------------------------------- //

pub fn observe_value(v: &JsonValue) -> U {
    match v {
        JsonValue::Null => U { nullable: true, ..U::default() },
        JsonValue::Bool(_) => U { has_bool: true, ..U::default() },
        JsonValue::Number(n) => U { num: Some(NumC::observe(n)), ..U::default() },
        JsonValue::String(s) => U { str_: Some(StrC::observe(s)), ..U::default() },
        JsonValue::Array(xs) => {
            let item = xs.iter().fold(U::empty(), |acc, x| U::join(&acc, &observe_value(x)));
            let len = xs.len() as u32;
            let arr = ArrC { len_min: len, len_max: len, item: Box::new(item), samples: 1 };
            U { arr: Some(arr), ..U::default() }
        }
        JsonValue::Object(map) => {
            let fields = map
                .iter()
                .map(|(k, v)| (k.clone(), FieldC { ty: observe_value(v), present_in: 1 }))
                .collect();
            U { obj: Some(ObjC { fields, seen_objects: 1 }), ..U::default() }
        }
    }
}

// ------------------------------ Describe --------------------------------- //

/// Lower an object shape onto a descriptor list.
///
/// A field missing from some samples is omittable; a field seen as `null` is
/// nullable. With `strict`, observed bounds, small integer sets and string
/// shapes become range, enumeration and pattern constraints.
pub fn describe(u: &U, strict: bool) -> Result<Vec<FieldDescriptor>, ConfigError> {
    let obj = match &u.obj {
        Some(obj) if u.arms() == 1 && !u.nullable => obj,
        _ => return Err(schema_error(ROOT_KEY, "sample root must be an object")),
    };
    let mut out = Vec::new();
    lower_object(obj, 0, strict, &mut out)?;
    tracing::debug!(fields = out.len(), strict, "descriptors inferred");
    Ok(out)
}

fn lower_object(obj: &ObjC, depth: usize, strict: bool, out: &mut Vec<FieldDescriptor>) -> Result<(), ConfigError> {
    for (key, field) in &obj.fields {
        lower_field(key, field, obj.seen_objects, depth, strict, out)?;
    }
    Ok(())
}

fn lower_field(
    key: &str,
    field: &FieldC,
    seen: u64,
    depth: usize,
    strict: bool,
    out: &mut Vec<FieldDescriptor>,
) -> Result<(), ConfigError> {
    let ty = &field.ty;
    let kind = kind_of(key, ty)?;
    let element = ty.arr.as_ref().map(|a| a.item.as_ref());

    let mut descriptor = FieldDescriptor::new(key, depth, kind);
    descriptor.omit = field.present_in < seen;
    descriptor.nullable = ty.nullable;
    match kind {
        InputKind::String => refine_string(&mut descriptor, ty.str_.as_ref(), strict),
        InputKind::ArrayString => refine_string(&mut descriptor, element.and_then(|i| i.str_.as_ref()), strict),
        InputKind::Integer32 | InputKind::Integer64 | InputKind::Real => {
            refine_number(&mut descriptor, ty.num.as_ref(), strict)
        }
        InputKind::ArrayInteger32 | InputKind::ArrayInteger64 | InputKind::ArrayReal => {
            refine_number(&mut descriptor, element.and_then(|i| i.num.as_ref()), strict)
        }
        _ => {}
    }
    tracing::trace!(key, depth, kind = %kind, omit = descriptor.omit, nullable = descriptor.nullable, "inferred");
    out.push(descriptor);

    let children = match kind {
        InputKind::Object => ty.obj.as_ref(),
        InputKind::ArrayObject => element.and_then(|i| i.obj.as_ref()),
        _ => None,
    };
    match children {
        Some(obj) => lower_object(obj, depth + 1, strict, out),
        None => Ok(()),
    }
}

fn kind_of(key: &str, ty: &U) -> Result<InputKind, ConfigError> {
    match ty.arms() {
        0 => {
            tracing::warn!(key, "only null observed, assuming string");
            return Ok(InputKind::String);
        }
        1 => {}
        _ => return Err(schema_error(key, "conflicting types across samples")),
    }
    if ty.has_bool {
        return Ok(InputKind::Boolean);
    }
    if let Some(num) = &ty.num {
        return number_kind(key, num);
    }
    if ty.str_.is_some() {
        return Ok(InputKind::String);
    }
    if let Some(arr) = &ty.arr {
        return array_kind(key, arr);
    }
    Ok(InputKind::Object)
}

fn number_kind(key: &str, num: &NumC) -> Result<InputKind, ConfigError> {
    if num.is_mixed() {
        return Err(schema_error(key, "integer and real literals are mixed"));
    }
    Ok(num.kind())
}

fn array_kind(key: &str, arr: &ArrC) -> Result<InputKind, ConfigError> {
    let item = arr.item.as_ref();
    if key == COORDINATES_KEY && item.arr.is_some() && is_number_nest(item) {
        return Ok(InputKind::Coordinates);
    }
    if item.nullable {
        return Err(schema_error(key, "null array element"));
    }
    match item.arms() {
        0 => {
            tracing::warn!(key, "only empty arrays observed, assuming array<string>");
            return Ok(InputKind::ArrayString);
        }
        1 => {}
        _ => return Err(schema_error(key, "conflicting array element types")),
    }
    if item.has_bool {
        return Ok(InputKind::ArrayBoolean);
    }
    if let Some(num) = &item.num {
        return Ok(match number_kind(key, num)? {
            InputKind::Integer32 => InputKind::ArrayInteger32,
            InputKind::Integer64 => InputKind::ArrayInteger64,
            _ => InputKind::ArrayReal,
        });
    }
    if item.str_.is_some() {
        return Ok(InputKind::ArrayString);
    }
    if item.obj.is_some() {
        return Ok(InputKind::ArrayObject);
    }
    Err(schema_error(key, "nested arrays are only supported for coordinates"))
}

fn is_number_nest(u: &U) -> bool {
    !u.nullable
        && u.arms() == 1
        && (u.num.is_some() || u.arr.as_ref().is_some_and(|a| is_number_nest(&a.item)))
}

fn refine_string(descriptor: &mut FieldDescriptor, s: Option<&StrC>, strict: bool) {
    let Some(s) = s else { return };
    descriptor.allow_empty = s.saw_empty;
    if !strict {
        return;
    }
    let all_dates = !s.overflow
        && !s.lits.is_empty()
        && s.lits.iter().all(|x| DateFormat::Iso8601Fraction.parse(x).is_some());
    if descriptor.kind == InputKind::String && all_dates {
        descriptor.date_format = Some(DateFormat::Iso8601Fraction);
        return;
    }
    descriptor.pattern = s.pattern();
}

fn refine_number(descriptor: &mut FieldDescriptor, n: Option<&NumC>, strict: bool) {
    let Some(n) = n.filter(|_| strict) else { return };
    descriptor.range = Some(Range { min: n.min.0, max: n.max.0 });
    // the loader only reads `enum` on scalar integers
    if matches!(descriptor.kind, InputKind::Integer32 | InputKind::Integer64) {
        descriptor.enumeration = n.integer_enum().unwrap_or_default();
    }
}

fn schema_error(key: &str, detail: &str) -> ConfigError {
    ConfigError::Schema { key: key.to_owned(), detail: detail.to_owned() }
}

// ------------------------------- Emission --------------------------------- //

/// Render a descriptor list as a Body schema.
///
/// `allow_empty` is written as `minLength: 0`, so on a string that also has a
/// range the loaded minimum becomes zero.
pub fn emit_schema(fields: &[FieldDescriptor]) -> JsonValue {
    let mut cursor = 0;
    object_schema(fields, &mut cursor, 0)
}

/// A complete configuration document with one route.
pub fn emit_document(route: &str, method: &str, fields: &[FieldDescriptor]) -> JsonValue {
    let parameters = json!([{ "name": "Body", "in": "body", "schema": emit_schema(fields) }]);
    let mut operation = Map::new();
    operation.insert("parameters".to_owned(), parameters);
    let mut methods = Map::new();
    methods.insert(method.to_ascii_lowercase(), JsonValue::Object(operation));
    let mut paths = Map::new();
    paths.insert(route.to_owned(), JsonValue::Object(methods));
    json!({ "swagger": "2.0", "basePath": "", "paths": paths })
}

fn object_schema(fields: &[FieldDescriptor], cursor: &mut usize, depth: usize) -> JsonValue {
    let mut properties = Map::new();
    let mut required = Vec::new();
    while let Some(field) = fields.get(*cursor).filter(|f| f.depth == depth) {
        *cursor += 1;
        let node = node_schema(field, fields, cursor);
        if !field.omit {
            required.push(JsonValue::from(field.key.clone()));
        }
        properties.insert(field.key.clone(), node);
    }
    let mut o = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        o["required"] = JsonValue::Array(required);
    }
    o
}

fn node_schema(field: &FieldDescriptor, fields: &[FieldDescriptor], cursor: &mut usize) -> JsonValue {
    let mut node = match field.kind {
        InputKind::Object => object_schema(fields, cursor, field.depth + 1),
        InputKind::ArrayObject => json!({ "type": "array", "items": object_schema(fields, cursor, field.depth + 1) }),
        InputKind::Coordinates => coordinates_schema(field.pattern.as_deref()),
        kind => match kind.element() {
            Some(element) => json!({ "type": "array", "items": scalar_schema(element) }),
            None => scalar_schema(kind),
        },
    };

    // constraints of a scalar array live on its items schema
    let target = if field.kind.element().is_some() { &mut node["items"] } else { &mut node };
    if let Some(range) = field.range {
        let (lo, hi) = match field.kind {
            InputKind::String | InputKind::ArrayString => ("minLength", "maxLength"),
            _ => ("minimum", "maximum"),
        };
        target[lo] = json_num_pref_i64(range.min);
        target[hi] = json_num_pref_i64(range.max);
    }
    if let Some(pattern) = field.pattern.as_deref().filter(|_| field.kind != InputKind::Coordinates) {
        target["pattern"] = JsonValue::from(format!("/{pattern}/"));
    }

    if !field.enumeration.is_empty() {
        node["enum"] = field.enumeration.iter().copied().map(JsonValue::from).collect();
    }
    if field.date_format.is_some() {
        node["format"] = JsonValue::from(DATE_FORMAT_NAME);
    }
    if field.allow_empty {
        node["minLength"] = JsonValue::from(0);
    }
    if field.nullable {
        node["x-nullable"] = JsonValue::Bool(true);
    }
    if field.error_continue {
        node["x-errorContinue"] = JsonValue::Bool(true);
    }
    if let Some(default) = field.default.as_ref().and_then(default_json) {
        node["default"] = default;
    }
    node
}

fn scalar_schema(kind: InputKind) -> JsonValue {
    match kind {
        InputKind::Integer32 => json!({ "type": "integer", "format": "int32" }),
        InputKind::Integer64 => json!({ "type": "integer", "format": "int64" }),
        InputKind::Boolean => json!({ "type": "boolean" }),
        InputKind::Real => json!({ "type": "number" }),
        _ => json!({ "type": "string" }),
    }
}

fn coordinates_schema(pattern: Option<&str>) -> JsonValue {
    let parts: Vec<&str> = pattern
        .map(|p| p.split("//").map(|s| s.trim_matches('/')).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let pair = match parts.as_slice() {
        [lon, lat] => json!([
            { "type": "number", "pattern": format!("/{lon}/") },
            { "type": "number", "pattern": format!("/{lat}/") },
        ]),
        _ => json!({ "type": "number" }),
    };
    json!({ "type": "array", "items": { "type": "array", "items": pair } })
}

fn default_json(value: &Value) -> Option<JsonValue> {
    match value {
        Value::String(s) => Some(JsonValue::from(s.clone())),
        Value::Int32(x) => Some(JsonValue::from(*x)),
        Value::Int64(x) => Some(JsonValue::from(*x)),
        Value::Bool(b) => Some(JsonValue::from(*b)),
        Value::Real(x) => serde_json::Number::from_f64(*x).map(JsonValue::Number),
        Value::Absent | Value::Object(_) | Value::Array(_) => None,
    }
}

// Helper: prefer emitting integers when exact
fn json_num_pref_i64(n: f64) -> JsonValue {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(JsonValue::Null, JsonValue::Number)
    }
}

// ------------------------------- Front API -------------------------------- //

#[derive(Debug, Default)]
pub struct Inference { state: U }

impl Inference {
    pub fn new() -> Self { Self::default() }

    pub fn observe_value(&mut self, v: &JsonValue) {
        let obs = observe_value(v);
        self.state = U::join(&self.state, &obs);
    }

    pub fn solve(&self) -> U {
        self.state.clone()
    }
}

pub fn infer_from_values<'a, I>(values: I) -> U
where
    I: IntoIterator<Item = &'a JsonValue>,
{
    values.into_iter().fold(U::empty(), |st, v| U::join(&st, &observe_value(v)))
}

// ------------------------------- Tests ------------------------------------ //
