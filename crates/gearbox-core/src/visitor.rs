//! Document visitor
//!
//! A [`Visitor`] wraps one parsed document and fills in entry values from
//! it. Decoded sub-documents are cached per visitor, so any number of
//! entries pointing at the same sub-path cost a single query and decode.
//! A visitor and its cache live exactly as long as one path group.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_yaml::Value as Node;

use crate::entry::ConfigEntry;
use crate::error::{Error, Result};
use crate::format::{dotenv_pairs, Format};
use crate::query::{self, kind_name};
use crate::read_type::ReadType;
use crate::value::{scalar_text, Value};

/// Flat string map decoded from one sub-path
pub type FlatMap = IndexMap<String, String>;

/// Cache key: sub-path plus read type, so different decodes of the same
/// node never alias
type CacheKey = (String, ReadType);

/// Decoded sub-documents owned by a single visitor
#[derive(Debug, Default)]
pub struct VisitorCache {
    flat: HashMap<CacheKey, FlatMap>,
    complex: HashMap<CacheKey, Value>,
}

impl VisitorCache {
    /// Number of flat maps decoded so far
    pub fn flat_len(&self) -> usize {
        self.flat.len()
    }

    /// Number of structured values decoded so far
    pub fn complex_len(&self) -> usize {
        self.complex.len()
    }

    /// Whether a flat map is cached for this sub-path and read type
    pub fn has_flat(&self, sub_path: &str, read_type: ReadType) -> bool {
        self.flat.contains_key(&(sub_path.to_string(), read_type))
    }
}

/// Resolves entries against one parsed document
#[derive(Debug)]
pub struct Visitor {
    root: Node,
    cache: VisitorCache,
}

impl Visitor {
    /// Create a visitor over an already parsed document
    pub fn new(root: Node) -> Self {
        Self {
            root,
            cache: VisitorCache::default(),
        }
    }

    /// Parse document bytes in the given format
    pub fn from_bytes(buf: &[u8], format: Format) -> Result<Self> {
        Ok(Self::new(format.parse(buf)?))
    }

    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_bytes(yaml.as_bytes(), Format::Yaml)
    }

    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_bytes(json.as_bytes(), Format::Json)
    }

    /// The cache built so far
    pub fn cache(&self) -> &VisitorCache {
        &self.cache
    }

    /// Fill in `entry.value` or `entry.complex_value` from this document.
    ///
    /// Exactly one of the two is assigned on success.
    pub fn resolve(&mut self, entry: &mut ConfigEntry) -> Result<()> {
        if entry.read_type.is_complex() {
            let value = self.ensure_complex(&entry.sub_path, entry.read_type)?;
            entry.complex_value = Some(value.clone());
            return Ok(());
        }

        let flat = self.ensure_flat(&entry.sub_path, entry.read_type)?;
        entry.value = lookup(flat, &entry.name, &entry.sub_path)?.to_string();
        Ok(())
    }

    fn ensure_flat(&mut self, sub_path: &str, read_type: ReadType) -> Result<&FlatMap> {
        let key = (sub_path.to_string(), read_type);
        if self.cache.flat.contains_key(&key) {
            log::trace!("cache hit for '{}' ({})", sub_path, read_type);
        } else {
            log::trace!("cache miss for '{}' ({})", sub_path, read_type);
            let node = query::select_one(&self.root, sub_path)?;
            let flat = decode_flat(node, read_type)?;
            self.cache.flat.insert(key.clone(), flat);
        }
        self.cache
            .flat
            .get(&key)
            .ok_or_else(|| Error::decode(format!("no decoded map for '{}'", sub_path)))
    }

    fn ensure_complex(&mut self, sub_path: &str, read_type: ReadType) -> Result<&Value> {
        let sub_path = if read_type == ReadType::Whole {
            ""
        } else {
            sub_path
        };
        let key = (sub_path.to_string(), read_type);
        if !self.cache.complex.contains_key(&key) {
            let value = match read_type {
                ReadType::Whole => Value::from_node(&self.root)?,
                _ => decode_json_complex(query::select_one(&self.root, sub_path)?)?,
            };
            self.cache.complex.insert(key.clone(), value);
        }
        self.cache
            .complex
            .get(&key)
            .ok_or_else(|| Error::decode(format!("no decoded value for '{}'", sub_path)))
    }
}

fn lookup<'a>(flat: &'a FlatMap, name: &str, sub_path: &str) -> Result<&'a str> {
    flat.get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::lookup(name, sub_path))
}

fn decode_flat(node: &Node, read_type: ReadType) -> Result<FlatMap> {
    match read_type {
        ReadType::Deferred => decode_mapping(node),
        ReadType::Dotenv => {
            let text = assemble_text(node, read_type)?;
            decode_dotenv(&text)
        }
        ReadType::Json => {
            let text = assemble_text(node, read_type)?;
            decode_flat_json(&text)
        }
        ReadType::JsonComplex | ReadType::Whole => Err(Error::shape(
            kind_name(node),
            read_type.display_name(),
        )),
    }
}

/// Decode a mapping node as string to string
fn decode_mapping(node: &Node) -> Result<FlatMap> {
    let Node::Mapping(map) = node else {
        return Err(Error::shape(
            kind_name(node),
            ReadType::Deferred.display_name(),
        ));
    };
    let mut flat = FlatMap::with_capacity(map.len());
    for (k, v) in map {
        let key = scalar_text(k).ok_or_else(|| {
            Error::decode(format!("{} cannot be used as a key", kind_name(k)))
        })?;
        let value = scalar_text(v).ok_or_else(|| {
            Error::decode(format!(
                "value for '{}' is a {}, expected a scalar",
                key,
                kind_name(v)
            ))
        })?;
        flat.insert(key, value);
    }
    Ok(flat)
}

/// Text held by a node: a string scalar, or a sequence of strings joined
/// by newlines
fn assemble_text(node: &Node, read_type: ReadType) -> Result<String> {
    let unable = || {
        Error::shape(kind_name(node), read_type.display_name()).with_help(format!(
            "Unable to decode node kind {} to {} format; expected a string or a list of strings",
            kind_name(node),
            read_type.display_name()
        ))
    };
    match node {
        Node::String(s) => Ok(s.clone()),
        Node::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(unable))
            .collect::<Result<Vec<_>>>()
            .map(|lines| lines.join("\n")),
        _ => Err(unable()),
    }
}

fn decode_dotenv(text: &str) -> Result<FlatMap> {
    let mut flat = FlatMap::new();
    for (key, value) in dotenv_pairs(text).map_err(Error::decode)? {
        flat.insert(key, value);
    }
    Ok(flat)
}

fn decode_flat_json(text: &str) -> Result<FlatMap> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)
        .map_err(|e| {
            Error::decode(format!(
                "Invalid flat JSON at line {}, column {}: {}",
                e.line(),
                e.column(),
                e
            ))
        })?;
    object
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                nested => {
                    return Err(Error::decode(format!(
                        "value for '{}' is nested ({}); use type \"json{{}}\" for structured values",
                        key,
                        if nested.is_array() { "array" } else { "object" }
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}

/// A string node is parsed as JSON text; any other node is already
/// structured and converted as is
fn decode_json_complex(node: &Node) -> Result<Value> {
    match node {
        Node::String(text) => serde_json::from_str(text).map_err(|e| {
            Error::decode(format!(
                "Invalid JSON at line {}, column {}: {}",
                e.line(),
                e.column(),
                e
            ))
        }),
        other => Value::from_node(other),
    }
}
