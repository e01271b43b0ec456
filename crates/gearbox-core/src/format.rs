//! Source document formats
//!
//! The format of a referenced document is derived from its file suffix and
//! decides both how it is parsed and which hint the decrypter receives.

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Format of a source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Yaml,
    Json,
    Dotenv,
}

impl Format {
    /// Pick the format for a path by its extension, defaulting to YAML
    pub fn for_path(path: impl AsRef<Path>) -> Format {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str());
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        match ext {
            Some("json") => Format::Json,
            Some("env") => Format::Dotenv,
            _ if name == ".env" => Format::Dotenv,
            _ => Format::Yaml,
        }
    }

    /// Name understood by sops' `--input-type`/`--output-type`
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
            Format::Dotenv => "dotenv",
        }
    }

    /// Parse document bytes into a node tree.
    ///
    /// JSON and dotenv documents end up in the same tree type as YAML so the
    /// visitor never has to care where a node came from.
    pub fn parse(self, buf: &[u8]) -> Result<serde_yaml::Value> {
        match self {
            Format::Yaml => serde_yaml::from_slice(buf).map_err(|e| {
                let location = e
                    .location()
                    .map(|loc| format!(" at line {}, column {}", loc.line(), loc.column()))
                    .unwrap_or_default();
                Error::parse(format!("Invalid YAML{}: {}", location, e))
            }),
            Format::Json => serde_json::from_slice(buf).map_err(|e| {
                Error::parse(format!(
                    "Invalid JSON at line {}, column {}: {}",
                    e.line(),
                    e.column(),
                    e
                ))
            }),
            Format::Dotenv => {
                let text = String::from_utf8_lossy(buf);
                let mut map = serde_yaml::Mapping::new();
                for (key, value) in dotenv_pairs(&text).map_err(Error::parse)? {
                    map.insert(key.into(), value.into());
                }
                Ok(serde_yaml::Value::Mapping(map))
            }
        }
    }
}

/// Parse dotenv text into ordered pairs without variable substitution.
///
/// `$` is always literal: a value never depends on the process
/// environment or on keys defined earlier in the same text.
pub(crate) fn dotenv_pairs(text: &str) -> std::result::Result<Vec<(String, String)>, String> {
    let literal = escape_dollars(text);
    dotenvy::from_read_iter(literal.as_bytes())
        .map(|item| item.map_err(|e| format!("Invalid dotenv: {}", e)))
        .collect()
}

/// Escape every `$` the dotenv parser would otherwise expand. Single-quoted
/// regions are taken verbatim by the parser and comments are dropped by it,
/// so both pass through untouched.
fn escape_dollars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut single = false;
    let mut double = false;
    let mut escaped = false;
    let mut comment = false;
    let mut after_space = true;

    for c in text.chars() {
        if comment {
            comment = c != '\n';
        } else if single {
            single = c != '\'';
        } else if escaped {
            escaped = false;
        } else {
            match c {
                '\\' => escaped = true,
                '\'' if !double => single = true,
                '"' => double = !double,
                '#' if !double && after_space => comment = true,
                '$' => out.push('\\'),
                _ => {}
            }
        }
        after_space = c.is_whitespace() && !single && !double;
        out.push(c);
    }
    out
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_path() {
        assert_eq!(Format::for_path("cfg.yaml"), Format::Yaml);
        assert_eq!(Format::for_path("cfg.yml"), Format::Yaml);
        assert_eq!(Format::for_path("dir/cfg.json"), Format::Json);
        assert_eq!(Format::for_path("secrets.enc.json"), Format::Json);
        assert_eq!(Format::for_path("app.env"), Format::Dotenv);
        assert_eq!(Format::for_path(".env"), Format::Dotenv);
        assert_eq!(Format::for_path("no_extension"), Format::Yaml);
    }

    #[test]
    fn test_parse_json_into_tree() {
        let root = Format::Json.parse(br#"{"db": {"host": "h"}}"#).unwrap();
        assert_eq!(root["db"]["host"].as_str(), Some("h"));
    }

    #[test]
    fn test_parse_dotenv_into_mapping() {
        let root = Format::Dotenv
            .parse(b"# comment\nA=1\nB=\"two words\"\n")
            .unwrap();
        assert_eq!(root["A"].as_str(), Some("1"));
        assert_eq!(root["B"].as_str(), Some("two words"));
    }

    #[test]
    fn test_dotenv_dollar_is_literal() {
        std::env::set_var("GEARBOX_TEST_WORD", "expanded");
        let pairs = dotenv_pairs(
            "PASS=pa$word\n\
             DQ=\"x$GEARBOX_TEST_WORD\"\n\
             SQ='y$GEARBOX_TEST_WORD'\n\
             ESC=\"z\\$HOME\"\n\
             BRACED=${PASS}\n",
        )
        .unwrap();

        assert_eq!(
            pairs,
            vec![
                ("PASS".to_string(), "pa$word".to_string()),
                ("DQ".to_string(), "x$GEARBOX_TEST_WORD".to_string()),
                ("SQ".to_string(), "y$GEARBOX_TEST_WORD".to_string()),
                ("ESC".to_string(), "z$HOME".to_string()),
                ("BRACED".to_string(), "${PASS}".to_string()),
            ]
        );
    }

    #[test]
    fn test_dotenv_comments_do_not_leak_quotes() {
        let pairs = dotenv_pairs("# don't expand\nA=1$x # it's fine\nB=2$y\n").unwrap();

        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "1$x".to_string()),
                ("B".to_string(), "2$y".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_dotenv_keeps_dollar() {
        let root = Format::Dotenv.parse(b"TOKEN=a$b$c\n").unwrap();
        assert_eq!(root["TOKEN"].as_str(), Some("a$b$c"));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = Format::Yaml.parse(b"key: [unclosed").unwrap_err();
        assert!(err.to_string().contains("Invalid YAML"));
    }
}
