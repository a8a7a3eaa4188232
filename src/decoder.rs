//! Structural decoding: document text ⇄ [`KeyMap`].
//!
//! The trait is grammar-agnostic. [`JsonDecoder`] is the JSON grammar.
pub mod json;

use crate::descriptor::DescriptorSet;
use crate::error::{DecodeError, EncodeError};
use crate::keymap::KeyMap;

pub use json::JsonDecoder;

pub trait StructuralDecoder {
    /// Decode starting at the slash-delimited object path `base_key`
    /// (empty for the document root). Stops at the first hard failure.
    fn decode_at(&self, text: &str, fields: &DescriptorSet, base_key: &str) -> Result<KeyMap, DecodeError>;

    /// Serialize `content` in insertion order.
    fn encode(&self, content: &KeyMap) -> Result<String, EncodeError>;

    fn decode(&self, text: &str, fields: &DescriptorSet) -> Result<KeyMap, DecodeError> {
        self.decode_at(text, fields, "")
    }
}
