//! Decode strategies for path-bearing entries

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// How the node selected by an entry's sub-path is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadType {
    /// Decode the node as a string to string mapping
    #[default]
    Deferred,
    /// Decode the node's text as dotenv assignments
    Dotenv,
    /// Decode the node's text as a flat JSON object
    Json,
    /// Decode the node's JSON content as a nested structure (`json{}`)
    JsonComplex,
    /// Take the whole document, ignoring the sub-path
    Whole,
}

impl ReadType {
    /// Every variant, in declaration order
    pub const ALL: [ReadType; 5] = [
        ReadType::Deferred,
        ReadType::Dotenv,
        ReadType::Json,
        ReadType::JsonComplex,
        ReadType::Whole,
    ];

    /// Manifest spelling of the type tag. `Deferred` is the empty tag.
    pub fn tag(self) -> &'static str {
        match self {
            ReadType::Deferred => "",
            ReadType::Dotenv => "dotenv",
            ReadType::Json => "json",
            ReadType::JsonComplex => "json{}",
            ReadType::Whole => "whole",
        }
    }

    /// Validate an explicitly requested read type.
    ///
    /// `Deferred` is the implicit default and is rejected here: a manifest
    /// that spells out an empty `type` tag is treated as a mistake.
    pub fn validate(self) -> Result<()> {
        match self {
            ReadType::Dotenv | ReadType::Json | ReadType::JsonComplex | ReadType::Whole => Ok(()),
            ReadType::Deferred => Err(Error::schema(format!(
                "'{}' is an invalid read type",
                self.tag()
            ))
            .with_help("Omit `type` to use the default, or use one of: dotenv, json, json{}, whole")),
        }
    }

    /// Human readable name used in error messages
    pub fn display_name(self) -> &'static str {
        match self {
            ReadType::Deferred => "deferred",
            ReadType::Dotenv => "dotenv",
            ReadType::Json => "flat json",
            ReadType::JsonComplex => "complex json",
            ReadType::Whole => "whole file",
        }
    }

    /// True for read types that produce a nested value instead of a string
    pub fn is_complex(self) -> bool {
        matches!(self, ReadType::JsonComplex | ReadType::Whole)
    }
}

impl FromStr for ReadType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ReadType::ALL
            .into_iter()
            .find(|t| t.tag() == s)
            .ok_or_else(|| {
                Error::schema(format!("'{}' is an invalid read type", s))
                    .with_help("Use one of: dotenv, json, json{}, whole")
            })
    }
}

impl fmt::Display for ReadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!("dotenv".parse::<ReadType>().unwrap(), ReadType::Dotenv);
        assert_eq!("json".parse::<ReadType>().unwrap(), ReadType::Json);
        assert_eq!("json{}".parse::<ReadType>().unwrap(), ReadType::JsonComplex);
        assert_eq!("whole".parse::<ReadType>().unwrap(), ReadType::Whole);
        assert!("yaml".parse::<ReadType>().is_err());
        assert!("deferred".parse::<ReadType>().is_err());
    }

    #[test]
    fn test_validate_rejects_explicit_deferred() {
        assert!(ReadType::Deferred.validate().is_err());
        for t in [
            ReadType::Dotenv,
            ReadType::Json,
            ReadType::JsonComplex,
            ReadType::Whole,
        ] {
            assert!(t.validate().is_ok(), "{} should validate", t);
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ReadType::Deferred.to_string(), "deferred");
        assert_eq!(ReadType::Json.to_string(), "flat json");
        assert_eq!(ReadType::JsonComplex.to_string(), "complex json");
        assert_eq!(ReadType::Whole.to_string(), "whole file");
    }

    #[test]
    fn test_is_complex() {
        assert!(ReadType::Whole.is_complex());
        assert!(ReadType::JsonComplex.is_complex());
        assert!(!ReadType::Deferred.is_complex());
        assert!(!ReadType::Dotenv.is_complex());
    }
}
