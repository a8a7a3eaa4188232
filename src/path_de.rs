use serde::de::DeserializeOwned;

use crate::error::ConfigError;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, ConfigError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| ConfigError::Document {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

/// Same as [`from_str_with_path`] for an already parsed subtree. `context`
/// is the location of `value` inside its document.
pub fn from_value_with_path<T: DeserializeOwned>(value: &serde_json::Value, context: &str) -> Result<T, ConfigError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| {
        let inner = err.path().to_string();
        let path = if inner == "." { context.to_owned() } else { format!("{context}.{inner}") };
        ConfigError::Document { path, message: err.into_inner().to_string() }
    })
}
