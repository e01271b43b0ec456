//! Rendering resolved maps as dotenv, JSON or raw text

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::gear::CfgMap;
use crate::value::Value;

/// Output format for a resolved environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `KEY="value"` lines
    #[default]
    Dotenv,
    /// Pretty-printed JSON object
    Json,
    /// Bare values joined by a delimiter
    Raw,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Dotenv => "dotenv",
            OutputFormat::Json => "json",
            OutputFormat::Raw => "raw",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dotenv" => Ok(OutputFormat::Dotenv),
            "json" => Ok(OutputFormat::Json),
            "raw" => Ok(OutputFormat::Raw),
            other => Err(Error::output(format!("Unknown output format '{}'", other))
                .with_help("Use one of: dotenv, json, raw")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a resolved map is rendered
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub format: OutputFormat,
    /// Prefix dotenv lines with `export `
    pub export: bool,
    /// Keep dotenv key case instead of upper-casing
    pub preserve: bool,
    /// Raw output separator; newline when unset
    pub delimiter: Option<String>,
}

impl RenderOptions {
    /// Reject flags that do not apply to the chosen format
    pub fn validate(&self) -> Result<()> {
        if self.format != OutputFormat::Raw && self.delimiter.is_some() {
            return Err(Error::output("--sep only applies to raw output")
                .with_help("Add `-o raw` or drop --sep"));
        }
        if self.format != OutputFormat::Dotenv {
            if self.export {
                return Err(Error::output("--export only applies to dotenv output"));
            }
            if self.preserve {
                return Err(Error::output("--preserve only applies to dotenv output"));
            }
        }
        Ok(())
    }
}

/// Render `map` according to `options`
pub fn render(map: &CfgMap, options: &RenderOptions) -> Result<String> {
    options.validate()?;
    match options.format {
        OutputFormat::Dotenv => render_dotenv(map, options),
        OutputFormat::Json => {
            serde_json::to_string_pretty(map).map_err(|e| Error::output(e.to_string()))
        }
        OutputFormat::Raw => render_raw(map, options.delimiter.as_deref().unwrap_or("\n")),
    }
}

fn render_dotenv(map: &CfgMap, options: &RenderOptions) -> Result<String> {
    let prefix = if options.export { "export " } else { "" };
    let mut out = String::new();
    let mut written: HashMap<String, &str> = HashMap::with_capacity(map.len());
    for (name, value) in map {
        let key = if options.preserve {
            name.clone()
        } else {
            name.to_uppercase()
        };
        if let Some(first) = written.insert(key.clone(), name) {
            return Err(Error::output(format!(
                "Keys '{}' and '{}' both render as '{}'",
                first, name, key
            ))
            .with_help("Rename one of the entries or pass --preserve"));
        }
        let text = value.to_flat_string().map_err(|e| e.with_entry(key.as_str()))?;
        out.push_str(&format!("{}{}=\"{}\"\n", prefix, key, escape_dotenv(&text)));
    }
    Ok(out)
}

fn escape_dotenv(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '$' => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out
}

fn render_raw(map: &CfgMap, delimiter: &str) -> Result<String> {
    let values = map
        .iter()
        .map(|(key, value)| value.to_flat_string().map_err(|e| e.with_entry(key.as_str())))
        .collect::<Result<Vec<_>>>()?;
    Ok(values.join(delimiter))
}

/// Turn the literal escapes `\n` and `\t` typed on a command line into the
/// characters they name
pub fn unescape_delimiter(delimiter: &str) -> String {
    match delimiter {
        "\\n" => "\n".to_string(),
        "\\t" => "\t".to_string(),
        other => other.to_string(),
    }
}

/// Drop every key in `keys`
pub fn exclude(keys: &[String], mut map: CfgMap) -> CfgMap {
    for key in keys {
        map.shift_remove(key);
    }
    map
}

/// Keep only `keys`, in the order given
pub fn retain(keys: &[String], map: &CfgMap) -> Result<CfgMap> {
    let mut out = CfgMap::new();
    for key in keys {
        let value: &Value = map
            .get(key)
            .ok_or_else(|| Error::output(format!("Key '{}' missing from generated config", key)))?;
        out.insert(key.clone(), value.clone());
    }
    Ok(out)
}

/// Key selection applied to a resolved map before rendering.
///
/// Exclusion runs first, so a key both excluded and requested is reported
/// as missing.
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    /// Keys to keep (`--keys`); empty keeps everything
    pub keys: Vec<String>,
    /// Keys to drop (`--not`)
    pub not: Vec<String>,
    /// Encrypted entries were skipped during resolution
    pub skip_encrypted: bool,
}

impl KeyFilter {
    pub fn apply(&self, map: CfgMap) -> Result<CfgMap> {
        let map = exclude(&self.not, map);
        if self.keys.is_empty() {
            return Ok(map);
        }

        retain(&self.keys, &map).map_err(|err| {
            let missing = self.keys.iter().find(|k| !map.contains_key(*k));
            let mut hints = Vec::new();
            if let Some(key) = missing {
                if self.not.contains(key) {
                    hints.push(format!(
                        "'{}' was passed to both --keys and --not; exclusion runs first",
                        key
                    ));
                }
            }
            if self.skip_encrypted {
                hints.push("--no-enc was set: was it an encrypted value?".to_string());
            }
            if hints.is_empty() {
                err
            } else {
                err.with_help(hints.join("; "))
            }
        })
    }
}
