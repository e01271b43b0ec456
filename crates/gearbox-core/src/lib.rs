//! gearbox-core: resolves environment manifests into flat configuration
//!
//! A manifest is a TOML file with one table per environment. Each entry is
//! either a literal or a reference into a YAML, JSON or dotenv source file,
//! optionally encrypted. Resolving an environment reads every referenced
//! file once and produces an ordered map of names to values.
//!
//! # Example
//!
//! ```rust
//! use gearbox_core::{Manifest, GearOptions, Value};
//!
//! let manifest = Manifest::from_toml(r#"
//! name = "svc"
//!
//! [qa]
//! VAR = "hello"
//! "#).unwrap();
//!
//! let cfg = manifest.resolve("qa", GearOptions::default()).unwrap();
//! assert_eq!(cfg["VAR"], Value::from("hello"));
//! ```

pub mod decrypt;
pub mod entry;
pub mod error;
pub mod format;
pub mod gear;
pub mod manifest;
pub mod output;
pub mod query;
pub mod read_type;
pub mod source;
pub mod value;
pub mod visitor;

pub use decrypt::{DecryptError, Decrypter, SopsDecrypter};
pub use entry::{decode_environment, ConfigEntry, EntryMap};
pub use error::{Error, ErrorKind, Result};
pub use format::Format;
pub use gear::{CfgMap, Gear, GearOptions};
pub use manifest::{generate, Manifest};
pub use output::{render, KeyFilter, OutputFormat, RenderOptions};
pub use read_type::ReadType;
pub use source::{FsReader, SourceReader};
#[cfg(feature = "http")]
pub use source::HttpReader;
pub use value::Value;
pub use visitor::{FlatMap, Visitor};
