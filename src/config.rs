//! Descriptor lists loaded from a Swagger-style API document.
//!
//! Each route/method pair names a `Body` parameter whose `schema` is
//! flattened into a depth-ordered [`FieldDescriptor`] list. The body schema
//! itself is not emitted; its properties sit at depth 0.
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::descriptor::{DateFormat, FieldDescriptor, InputKind};
use crate::error::ConfigError;
use crate::path_de;
use crate::value::Value;

// ---- Policy ----

const BODY_PARAMETER: &str = "Body";

/// Property name that maps to [`InputKind::Coordinates`] when its type is
/// not otherwise resolvable.
const COORDINATES_KEY: &str = "coordinates";

/// `format` values that describe a type rather than a date layout.
const TYPE_FORMATS: &[&str] = &[
    "array", "integer", "boolean", "number", "string", "object", "null", "int32", "int64",
];

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Deserialize)]
pub struct ContentConfig {
    #[serde(rename = "basePath", default)]
    base_path: String,
    #[serde(default)]
    paths: IndexMap<String, IndexMap<String, JsonValue>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Parameter {
    name: String,
    schema: Option<Schema>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Schema {
    #[serde(rename = "type")]
    ty: Option<String>,
    format: Option<String>,
    properties: Option<IndexMap<String, Schema>>,
    items: Option<Items>,
    required: Vec<String>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    #[serde(rename = "minLength")]
    min_length: Option<u64>,
    #[serde(rename = "maxLength")]
    max_length: Option<u64>,
    pattern: Option<String>,
    #[serde(rename = "enum")]
    enumeration: Option<Vec<JsonValue>>,
    default: Option<JsonValue>,
    #[serde(rename = "x-nullable")]
    nullable: bool,
    #[serde(rename = "x-errorContinue")]
    error_continue: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Items {
    Tuple(Vec<Schema>),
    One(Box<Schema>),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ContentConfig {
    pub fn from_str(src: &str) -> Result<Self, ConfigError> {
        path_de::from_str_with_path(src)
    }
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading content config");
        Self::from_str(&src)
    }

    /// Every `(route, method)` pair in document order. Routes include the
    /// base path.
    pub fn routes(&self) -> impl Iterator<Item = (String, &str)> {
        self.paths.iter().flat_map(move |(path, methods)| {
            methods.keys().map(move |method| (format!("{}{path}", self.base_path), method.as_str()))
        })
    }

    /// Flatten the `Body` schema of `route`/`method` into a descriptor list.
    pub fn format(&self, route: &str, method: &str) -> Result<Vec<FieldDescriptor>, ConfigError> {
        let no_route = || ConfigError::Route { route: route.to_owned(), method: method.to_owned() };
        let (path, methods) = self
            .paths
            .iter()
            .find(|(path, _)| format!("{}{path}", self.base_path) == route)
            .ok_or_else(no_route)?;
        let (method_key, operation) = methods
            .iter()
            .find(|(m, _)| m.eq_ignore_ascii_case(method))
            .ok_or_else(no_route)?;
        let parameters = operation.get("parameters").ok_or_else(no_route)?;
        let context = format!("paths.{path}.{method_key}.parameters");
        let parameters: Vec<Parameter> = path_de::from_value_with_path(parameters, &context)?;
        let schema = parameters
            .into_iter()
            .find(|p| p.name == BODY_PARAMETER)
            .and_then(|p| p.schema)
            .ok_or_else(no_route)?;

        let mut out = Vec::new();
        let root = schema.properties.as_ref().ok_or_else(|| ConfigError::Schema {
            key: BODY_PARAMETER.to_owned(),
            detail: "body schema has no properties".to_owned(),
        })?;
        flatten(root, &schema.required, 0, &mut out)?;
        tracing::debug!(route, method, fields = out.len(), "descriptors loaded");
        Ok(out)
    }
}

fn flatten(
    properties: &IndexMap<String, Schema>,
    required: &[String],
    depth: usize,
    out: &mut Vec<FieldDescriptor>,
) -> Result<(), ConfigError> {
    for (key, node) in properties {
        parse_node(key, node, depth, required.contains(key), out)?;
    }
    Ok(())
}

fn parse_node(
    key: &str,
    node: &Schema,
    depth: usize,
    required: bool,
    out: &mut Vec<FieldDescriptor>,
) -> Result<(), ConfigError> {
    let invalid = |detail: &str| ConfigError::Schema { key: key.to_owned(), detail: detail.to_owned() };
    let kind = match node_kind(node) {
        Ok(kind) => kind,
        Err(_) if key == COORDINATES_KEY => InputKind::Coordinates,
        Err(detail) => return Err(invalid(detail)),
    };

    let mut descriptor = FieldDescriptor::new(key, depth, kind);
    descriptor.omit = !required;
    descriptor.nullable = node.nullable;
    descriptor.allow_empty = node.min_length == Some(0);
    descriptor.error_continue = node.error_continue;
    descriptor.range = range(node, kind);
    descriptor.pattern = pattern(node, kind);
    if matches!(kind, InputKind::Integer32 | InputKind::Integer64) {
        if let Some(values) = &node.enumeration {
            descriptor.enumeration = values
                .iter()
                .map(JsonValue::as_i64)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid("enum values must be integers"))?;
        }
    }
    if let Some(default) = &node.default {
        descriptor.default = Some(default_value(kind, default).ok_or_else(|| invalid("default does not fit type"))?);
    }
    if kind == InputKind::String {
        descriptor.date_format = date_format(key, node.format.as_deref())?;
    }
    tracing::trace!(key, depth, kind = %kind, omit = descriptor.omit, nullable = descriptor.nullable, "descriptor");
    out.push(descriptor);

    match kind {
        InputKind::Object => {
            let properties = node.properties.as_ref().ok_or_else(|| invalid("object without properties"))?;
            flatten(properties, &node.required, depth + 1, out)
        }
        InputKind::ArrayObject => {
            let Some(Items::One(items)) = &node.items else {
                return Err(invalid("array of objects without items"));
            };
            let properties = items.properties.as_ref().ok_or_else(|| invalid("array items without properties"))?;
            flatten(properties, &items.required, depth + 1, out)
        }
        _ => Ok(()),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn node_kind(node: &Schema) -> Result<InputKind, &'static str> {
    match node.ty.as_deref() {
        Some("string") => Ok(InputKind::String),
        Some("boolean") => Ok(InputKind::Boolean),
        Some("number") => Ok(InputKind::Real),
        Some("integer") => integer_kind(node.format.as_deref()),
        Some("object") => Ok(InputKind::Object),
        Some("array") => {
            let Some(Items::One(items)) = &node.items else {
                return Err("array without a single items schema");
            };
            match items.ty.as_deref() {
                Some("string") => Ok(InputKind::ArrayString),
                Some("boolean") => Ok(InputKind::ArrayBoolean),
                Some("number") => Ok(InputKind::ArrayReal),
                Some("integer") => match integer_kind(items.format.as_deref())? {
                    InputKind::Integer32 => Ok(InputKind::ArrayInteger32),
                    _ => Ok(InputKind::ArrayInteger64),
                },
                Some("object") => Ok(InputKind::ArrayObject),
                _ => Err("unsupported array items type"),
            }
        }
        Some(_) => Err("unsupported type"),
        None => Err("missing type"),
    }
}

fn integer_kind(format: Option<&str>) -> Result<InputKind, &'static str> {
    match format {
        Some("int32") => Ok(InputKind::Integer32),
        Some("int64") => Ok(InputKind::Integer64),
        _ => Err("integer needs format int32 or int64"),
    }
}

fn range(node: &Schema, kind: InputKind) -> Option<crate::descriptor::Range> {
    let bounds = |min: Option<f64>, max: Option<f64>| Some(crate::descriptor::Range { min: min?, max: max? });
    let items = match &node.items {
        Some(Items::One(items)) => Some(items.as_ref()),
        _ => None,
    };
    match kind {
        InputKind::Integer32 | InputKind::Integer64 | InputKind::Real => bounds(node.minimum, node.maximum),
        InputKind::String => bounds(node.min_length.map(|x| x as f64), node.max_length.map(|x| x as f64)),
        InputKind::ArrayInteger32 | InputKind::ArrayInteger64 | InputKind::ArrayReal => {
            items.and_then(|i| bounds(i.minimum, i.maximum))
        }
        InputKind::ArrayString => {
            items.and_then(|i| bounds(i.min_length.map(|x| x as f64), i.max_length.map(|x| x as f64)))
        }
        _ => None,
    }
}

fn pattern(node: &Schema, kind: InputKind) -> Option<String> {
    let items = match &node.items {
        Some(Items::One(items)) => Some(items.as_ref()),
        _ => None,
    };
    match kind {
        InputKind::String | InputKind::Real => node.pattern.as_deref().map(strip_slashes),
        InputKind::ArrayString | InputKind::ArrayReal => items?.pattern.as_deref().map(strip_slashes),
        InputKind::Coordinates => {
            let Some(Items::Tuple(parts)) = &items?.items else {
                tracing::debug!("coordinates without a lon/lat tuple, no pattern");
                return None;
            };
            let parts = parts
                .iter()
                .map(|p| p.pattern.as_deref().map(strip_slashes))
                .collect::<Option<Vec<_>>>()?;
            Some(parts.join("//"))
        }
        _ => None,
    }
}

fn strip_slashes(pattern: &str) -> String {
    let trimmed = pattern.trim();
    match trimmed.strip_prefix('/').and_then(|p| p.strip_suffix('/')) {
        Some(inner) => inner.to_owned(),
        None => trimmed.to_owned(),
    }
}

fn default_value(kind: InputKind, raw: &JsonValue) -> Option<Value> {
    match kind {
        InputKind::String | InputKind::Coordinates => raw.as_str().map(Value::from),
        InputKind::Integer32 => raw.as_i64().and_then(|x| i32::try_from(x).ok()).map(Value::Int32),
        InputKind::Integer64 => raw.as_i64().map(Value::Int64),
        InputKind::Boolean => raw.as_bool().map(Value::Bool),
        InputKind::Real => raw.as_f64().map(Value::Real),
        _ => None,
    }
}

fn date_format(key: &str, format: Option<&str>) -> Result<Option<DateFormat>, ConfigError> {
    let Some(format) = format.map(str::trim).filter(|f| !f.is_empty()) else {
        return Ok(None);
    };
    if TYPE_FORMATS.contains(&format) {
        return Ok(None);
    }
    DateFormat::from_name(format).map(Some).ok_or_else(|| ConfigError::DateFormat {
        key: key.to_owned(),
        format: format.to_owned(),
    })
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor_api() -> ContentConfig {
        let doc = json!({
            "basePath": "/api/v1",
            "paths": {
                "/sensor": {
                    "post": {
                        "parameters": [
                            {"name": "Authorization", "in": "header"},
                            {"name": "Body", "in": "body", "schema": {
                                "type": "object",
                                "required": ["data"],
                                "properties": {
                                    "data": {
                                        "type": "object",
                                        "required": ["timestamp", "sensorData"],
                                        "properties": {
                                            "timestamp": {"type": "string", "format": "yyyy-MM-ddTHH:mm:ss.SSS+09:00"},
                                            "cisternCode": {"type": "string", "minLength": 0, "maxLength": 8, "x-nullable": true},
                                            "sensorData": {
                                                "type": "array",
                                                "items": {
                                                    "type": "object",
                                                    "required": ["port"],
                                                    "properties": {
                                                        "port": {"type": "integer", "format": "int32", "enum": [1, 2, 3]},
                                                        "value": {"type": "number", "minimum": -50, "maximum": 150, "pattern": "/-?\\d+\\.\\d{1,2}/"}
                                                    }
                                                }
                                            },
                                            "coordinates": {
                                                "type": "array",
                                                "items": {"type": "array", "items": [
                                                    {"type": "number", "pattern": "/-?\\d{1,3}(\\.\\d+)?/"},
                                                    {"type": "number", "pattern": "/-?\\d{1,2}(\\.\\d+)?/"}
                                                ]}
                                            },
                                            "retries": {"type": "integer", "format": "int64", "default": 3, "x-errorContinue": true}
                                        }
                                    }
                                }
                            }}
                        ]
                    }
                }
            }
        });
        ContentConfig::from_str(&doc.to_string()).unwrap()
    }

    #[test]
    fn flattens_body_schema_depth_first() {
        let fields = sensor_api().format("/api/v1/sensor", "POST").unwrap();
        let layout: Vec<_> = fields.iter().map(|f| (f.key.as_str(), f.depth, f.kind)).collect();
        assert_eq!(layout, [
            ("data", 0, InputKind::Object),
            ("timestamp", 1, InputKind::String),
            ("cisternCode", 1, InputKind::String),
            ("sensorData", 1, InputKind::ArrayObject),
            ("port", 2, InputKind::Integer32),
            ("value", 2, InputKind::Real),
            ("coordinates", 1, InputKind::Coordinates),
            ("retries", 1, InputKind::Integer64),
        ]);
    }

    #[test]
    fn maps_flags_and_constraints() {
        let fields = sensor_api().format("/api/v1/sensor", "post").unwrap();
        let by_key = |k: &str| fields.iter().find(|f| f.key == k).unwrap();
        assert!(!by_key("data").omit);
        assert!(!by_key("timestamp").omit);
        assert_eq!(by_key("timestamp").date_format, Some(DateFormat::Iso8601Fraction));
        let cistern = by_key("cisternCode");
        assert!(cistern.omit && cistern.nullable && cistern.allow_empty);
        assert_eq!(cistern.range, Some(crate::descriptor::Range { min: 0.0, max: 8.0 }));
        assert_eq!(by_key("port").enumeration, [1, 2, 3]);
        assert!(by_key("value").omit);
        assert_eq!(by_key("value").pattern.as_deref(), Some(r"-?\d+\.\d{1,2}"));
        assert_eq!(by_key("coordinates").pattern.as_deref(), Some(r"-?\d{1,3}(\.\d+)?//-?\d{1,2}(\.\d+)?"));
        let retries = by_key("retries");
        assert!(retries.error_continue);
        assert_eq!(retries.default, Some(Value::Int64(3)));
    }

    #[test]
    fn loaded_descriptors_validate() {
        let fields = sensor_api().format("/api/v1/sensor", "post").unwrap();
        assert!(crate::descriptor::DescriptorSet::new(fields).is_ok());
    }

    #[test]
    fn unknown_route_or_method() {
        let api = sensor_api();
        assert!(matches!(api.format("/api/v1/other", "post"), Err(ConfigError::Route { .. })));
        assert!(matches!(api.format("/api/v1/sensor", "get"), Err(ConfigError::Route { .. })));
        assert_eq!(api.routes().collect::<Vec<_>>(), [("/api/v1/sensor".to_owned(), "post")]);
    }

    #[test]
    fn integer_without_width_is_rejected() {
        let doc = json!({"paths": {"/x": {"put": {"parameters": [{"name": "Body", "schema": {
            "type": "object",
            "properties": {"n": {"type": "integer"}}
        }}]}}}});
        let api = ContentConfig::from_str(&doc.to_string()).unwrap();
        assert!(matches!(api.format("/x", "put"), Err(ConfigError::Schema { key, .. }) if key == "n"));
    }

    #[test]
    fn unsupported_date_format_is_rejected() {
        let doc = json!({"paths": {"/x": {"put": {"parameters": [{"name": "Body", "schema": {
            "type": "object",
            "properties": {"d": {"type": "string", "format": "dd/MM/yyyy"}, "s": {"type": "string", "format": "string"}}
        }}]}}}});
        let api = ContentConfig::from_str(&doc.to_string()).unwrap();
        assert!(matches!(api.format("/x", "put"), Err(ConfigError::DateFormat { key, .. }) if key == "d"));
    }

    #[test]
    fn malformed_document_reports_json_path() {
        let err = ContentConfig::from_str(r#"{"basePath": 3}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Document { path, .. } if path == "basePath"));
    }
}
