//! Configuration entries and the environment decoder
//!
//! An environment table from the manifest is untyped: every key maps either
//! to a literal string or to a small descriptor table. [`decode_environment`]
//! classifies each raw value once, builds typed [`ConfigEntry`] values, and
//! folds the encrypted `enc` namespace into the same map.
//!
//! ```toml
//! [qa]
//! VAR = "hello"
//! db_host = { path = ["cfg.yaml", "db"], type = "dotenv" }
//!
//! [qa.enc]
//! token = { path = "secrets.enc.yaml" }
//! ```

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::read_type::ReadType;
use crate::value::Value;

/// Key holding the encrypted namespace inside an environment table
pub const ENC_KEY: &str = "enc";

/// Decoded entries keyed by output name, in declaration order
pub type EntryMap = IndexMap<String, ConfigEntry>;

/// One named configuration item to be resolved to a final value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigEntry {
    /// Output key, and the key looked up in the decoded source map
    pub name: String,
    /// Literal value, or the resolved value of a flat read
    pub value: String,
    /// Source document, empty for literals
    pub path: String,
    /// Query narrowing the source document
    pub sub_path: String,
    /// Whether the entry was declared under `enc`
    pub encrypted: bool,
    /// How the selected node is decoded
    pub read_type: ReadType,
    /// Resolved value of a `whole` or `json{}` read
    pub complex_value: Option<Value>,
}

impl ConfigEntry {
    /// Create a literal entry
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Create an entry sourced from a document
    pub fn from_path(
        name: impl Into<String>,
        path: impl Into<String>,
        sub_path: impl Into<String>,
        read_type: ReadType,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            sub_path: sub_path.into(),
            read_type,
            ..Default::default()
        }
    }

    /// Mark the entry as sourced from ciphertext
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    /// True when the entry must be read from a source document.
    ///
    /// A literal value always wins over a path.
    pub fn needs_source(&self) -> bool {
        self.value.is_empty() && !self.path.is_empty()
    }

    /// The resolved output value
    pub fn output(&self) -> Value {
        match &self.complex_value {
            Some(complex) => complex.clone(),
            None => Value::String(self.value.clone()),
        }
    }
}

/// A raw environment value, classified once before decoding
enum RawEntry<'a> {
    Literal(&'a str),
    Structured(&'a toml::Table),
    Invalid(&'static str),
}

impl<'a> RawEntry<'a> {
    fn classify(value: &'a toml::Value) -> Self {
        match value {
            toml::Value::String(s) => RawEntry::Literal(s),
            toml::Value::Table(t) => RawEntry::Structured(t),
            other => RawEntry::Invalid(other.type_str()),
        }
    }
}

/// Decode a raw environment table into typed entries.
///
/// The `enc` sub-table is decoded first and its entries are marked
/// encrypted. A name declared in both namespaces is a collision and fails
/// the whole decode; nothing is returned partially.
pub fn decode_environment(env: &toml::Table) -> Result<EntryMap> {
    let mut entries = EntryMap::new();

    if let Some(enc) = env.get(ENC_KEY) {
        let enc_table = enc.as_table().ok_or_else(|| {
            Error::schema(format!(
                "'{}' must be a table, found {}",
                ENC_KEY,
                enc.type_str()
            ))
        })?;
        for (key, raw) in enc_table {
            let entry = parse_entry(key, raw)?.encrypted();
            insert_unique(&mut entries, entry)?;
        }
    }

    for (key, raw) in env.iter().filter(|(k, _)| k.as_str() != ENC_KEY) {
        let entry = parse_entry(key, raw)?;
        insert_unique(&mut entries, entry)?;
    }

    Ok(entries)
}

fn insert_unique(entries: &mut EntryMap, entry: ConfigEntry) -> Result<()> {
    if entries.contains_key(&entry.name) {
        return Err(Error::collision(entry.name));
    }
    entries.insert(entry.name.clone(), entry);
    Ok(())
}

fn parse_entry(key: &str, raw: &toml::Value) -> Result<ConfigEntry> {
    match RawEntry::classify(raw) {
        RawEntry::Literal(s) => Ok(ConfigEntry::literal(key, s)),
        RawEntry::Structured(table) => parse_descriptor(key, table).map_err(|e| e.with_entry(key)),
        RawEntry::Invalid(kind) => Err(Error::schema(format!(
            "Entry must be a string or a table, found {}",
            kind
        ))
        .with_entry(key)),
    }
}

fn parse_descriptor(key: &str, table: &toml::Table) -> Result<ConfigEntry> {
    let mut entry = ConfigEntry {
        name: key.to_string(),
        ..Default::default()
    };
    let mut explicit_type = false;

    for (field, value) in table {
        match field.as_str() {
            "name" => {
                entry.name = value
                    .as_str()
                    .ok_or_else(|| {
                        Error::schema(format!(
                            "`name` must be a string, found {}",
                            value.type_str()
                        ))
                    })?
                    .to_string();
            }
            "path" => {
                let (path, sub_path) = parse_path_field(value)?;
                entry.path = path;
                entry.sub_path = sub_path;
            }
            "type" => {
                let tag = value.as_str().ok_or_else(|| {
                    Error::schema(format!(
                        "`type` must be a string, found {}",
                        value.type_str()
                    ))
                })?;
                let read_type: ReadType = tag.parse()?;
                read_type.validate()?;
                entry.read_type = read_type;
                explicit_type = true;
            }
            other => {
                return Err(Error::schema(format!("Unknown field `{}`", other))
                    .with_help("Entry tables accept only `name`, `path` and `type`"));
            }
        }
    }

    if explicit_type && entry.path.is_empty() {
        return Err(Error::schema("`type` requires a `path`")
            .with_help("Remove `type` from literal entries, or add the `path` to read from"));
    }

    if entry.path.is_empty() {
        return Err(Error::schema("Entry table requires a `path`")
            .with_help("Use a plain string for literal values, or add the `path` to read from"));
    }

    if entry.read_type == ReadType::Whole && !entry.sub_path.is_empty() {
        log::debug!(
            "entry '{}' is read whole; sub-path '{}' is ignored",
            entry.name,
            entry.sub_path
        );
        entry.sub_path.clear();
    }

    Ok(entry)
}

/// `path` is either `"file"` or `["file", "sub.path"]`
fn parse_path_field(value: &toml::Value) -> Result<(String, String)> {
    match value {
        toml::Value::String(path) => Ok((path.clone(), String::new())),
        toml::Value::Array(items) => match items.as_slice() {
            [toml::Value::String(path), toml::Value::String(sub_path)] => {
                Ok((path.clone(), sub_path.clone()))
            }
            _ => Err(Error::schema(format!(
                "`path` array must hold exactly two strings [path, subPath], found {} item(s)",
                items.len()
            ))),
        },
        other => Err(Error::schema(format!(
            "`path` must be a string or a [path, subPath] array, found {}",
            other.type_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn table(src: &str) -> toml::Table {
        src.parse::<toml::Table>().unwrap()
    }

    #[test]
    fn test_literal_entries() {
        let entries = decode_environment(&table(r#"VAR = "hello""#)).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries["VAR"], ConfigEntry::literal("VAR", "hello"));
        assert!(!entries["VAR"].needs_source());
    }

    #[test]
    fn test_structured_entry() {
        let entries = decode_environment(&table(
            r#"var = { path = ["cfg.yaml", "db"], type = "dotenv" }"#,
        ))
        .unwrap();

        assert_eq!(
            entries["var"],
            ConfigEntry::from_path("var", "cfg.yaml", "db", ReadType::Dotenv)
        );
        assert!(entries["var"].needs_source());
    }

    #[test]
    fn test_string_path_defaults_to_deferred() {
        let entries = decode_environment(&table(r#"host = { path = "cfg.yaml" }"#)).unwrap();

        assert_eq!(entries["host"].path, "cfg.yaml");
        assert_eq!(entries["host"].sub_path, "");
        assert_eq!(entries["host"].read_type, ReadType::Deferred);
    }

    #[test]
    fn test_name_overrides_key() {
        let entries = decode_environment(&table(
            r#"local_key = { name = "REMOTE_KEY", path = "cfg.yaml" }"#,
        ))
        .unwrap();

        assert!(entries.contains_key("REMOTE_KEY"));
        assert!(!entries.contains_key("local_key"));
        assert_eq!(entries["REMOTE_KEY"].name, "REMOTE_KEY");
    }

    #[test]
    fn test_enc_entries_marked_encrypted() {
        let entries = decode_environment(&table(
            r#"
plain = "p"

[enc]
token = "T"
secret = { path = ["secrets.enc.yaml", "app"] }
"#,
        ))
        .unwrap();

        assert!(entries["token"].encrypted);
        assert!(entries["secret"].encrypted);
        assert!(!entries["plain"].encrypted);
        assert!(!entries.contains_key(ENC_KEY));
    }

    #[test]
    fn test_collision_between_namespaces() {
        let err = decode_environment(&table(
            r#"
token = "T"

[enc]
token = "T"
"#,
        ))
        .unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::Collision {
                name: "token".into()
            }
        );
    }

    #[test]
    fn test_collision_via_renamed_entry() {
        let err = decode_environment(&table(
            r#"
a = "1"
b = { name = "a", path = "cfg.yaml" }
"#,
        ))
        .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Collision { .. }));
    }

    #[test]
    fn test_enc_must_be_table() {
        let err = decode_environment(&table(r#"enc = "nope""#)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Schema);
    }

    #[test]
    fn test_invalid_top_level_value() {
        let err = decode_environment(&table("port = 5432")).unwrap_err();

        assert_eq!(err.kind, ErrorKind::Schema);
        assert_eq!(err.entry, Some("port".into()));
        assert!(err.to_string().contains("integer"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err =
            decode_environment(&table(r#"x = { path = "cfg.yaml", value = "v" }"#)).unwrap_err();

        assert_eq!(err.kind, ErrorKind::Schema);
        assert!(err.to_string().contains("Unknown field `value`"));
    }

    #[test]
    fn test_malformed_path_shapes() {
        for src in [
            r#"x = { path = ["only-one"] }"#,
            r#"x = { path = ["a", "b", "c"] }"#,
            r#"x = { path = ["a", 1] }"#,
            r#"x = { path = 7 }"#,
        ] {
            let err = decode_environment(&table(src)).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Schema, "{}", src);
        }
    }

    #[test]
    fn test_invalid_type_tag() {
        let err = decode_environment(&table(r#"x = { path = "cfg.yaml", type = "xml" }"#))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Schema);

        let err = decode_environment(&table(r#"x = { path = "cfg.yaml", type = "" }"#))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Schema);
    }

    #[test]
    fn test_type_without_path_rejected() {
        let err = decode_environment(&table(r#"x = { type = "dotenv" }"#)).unwrap_err();

        assert_eq!(err.kind, ErrorKind::Schema);
        assert!(err.to_string().contains("`type` requires a `path`"));
    }

    #[test]
    fn test_table_without_path_rejected() {
        for src in [r#"x = {}"#, r#"y = { name = "Z" }"#, r#"z = { path = "" }"#] {
            let err = decode_environment(&table(src)).unwrap_err();

            assert_eq!(err.kind, ErrorKind::Schema, "{}", src);
            assert!(err.to_string().contains("requires a `path`"), "{}", src);
        }
    }

    #[test]
    fn test_whole_clears_sub_path() {
        let entries = decode_environment(&table(
            r#"all = { path = ["cfg.yaml", "ignored"], type = "whole" }"#,
        ))
        .unwrap();

        assert_eq!(entries["all"].sub_path, "");
    }

    #[test]
    fn test_literal_value_wins_over_path() {
        let mut entry = ConfigEntry::from_path("k", "cfg.yaml", "", ReadType::Deferred);
        entry.value = "already".into();

        assert!(!entry.needs_source());
        assert_eq!(entry.output(), Value::String("already".into()));
    }
}
