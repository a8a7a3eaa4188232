//! Structural content engine.
//!
//! Text documents are decoded into an ordered tree of typed [`Value`] cells
//! ([`KeyMap`]) under the control of a flat, depth-ordered list of
//! [`FieldDescriptor`]s, and re-encoded from such a tree. An [`Analyzer`]
//! then walks a [`RuleTable`] over the tree, checking presence and value
//! rules at nested paths and handing each extracted value to a setter bound
//! to the caller's target type. Every operation stops at the first failure
//! and names the offending key.
//!
//! ```text
//! text ──decode──▶ KeyMap ──analyze(RuleTable)──▶ &mut Target
//!   ▲                 │
//!   └────encode───────┘
//! ```
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod descriptor;
pub mod error;
pub mod inference;
pub mod keymap;
pub mod path;
pub mod value;

mod path_de;

pub use analyzer::{Analyzer, Rule, RuleEntry, RuleTable, Setter};
pub use config::ContentConfig;
pub use decoder::{JsonDecoder, StructuralDecoder};
pub use descriptor::{DateFormat, DescriptorSet, FieldDescriptor, InputKind, Range};
pub use error::{AnalyzeError, ConfigError, DecodeError, EncodeError, FieldFault, PathError, Violation};
pub use keymap::KeyMap;
pub use path::ParentPath;
pub use value::{Scalar, Value, ValueKind};
