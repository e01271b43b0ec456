//! Error types for gearbox
//!
//! Every failure aborts the whole resolution pass. Errors carry the entry
//! name and source document they were raised for, so the message printed by
//! the CLI points at the exact manifest line that needs fixing.

use std::fmt;

/// Result type alias for gearbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gearbox operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Name of the configuration entry being resolved, if any
    pub entry: Option<String>,
    /// Manifest or source document the error relates to
    pub source_path: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Manifest or environment table does not have the expected shape
    Schema,
    /// Entry name declared in both the plain and the `enc` namespace
    Collision { name: String },
    /// A sub-path query matched zero or several nodes, or was malformed
    Query { sub_path: String, matches: usize },
    /// Node kind cannot be decoded with the requested read type
    Shape { kind: String, read_type: String },
    /// dotenv / JSON text failed to decode
    Decode,
    /// Decoded map for a sub-path lacks the requested key
    Lookup { key: String, sub_path: String },
    /// Manifest or document syntax error
    Parse,
    /// Source file could not be opened or read
    Io,
    /// Decrypt collaborator failed
    Crypto,
    /// Render options or key filters cannot be applied
    Output,
}

impl Error {
    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            entry: None,
            source_path: None,
            help: None,
            cause: None,
        }
    }

    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Schema)
        }
    }

    /// Create a collision error for a name declared twice
    pub fn collision(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            entry: Some(name.clone()),
            help: Some(format!(
                "Declare '{}' either under [<env>.enc] or directly under [<env>], not both",
                name
            )),
            ..Self::from_kind(ErrorKind::Collision { name })
        }
    }

    /// Create a query error for a path that did not match exactly one node
    pub fn query(sub_path: impl Into<String>, matches: usize) -> Self {
        let sub_path = sub_path.into();
        let help = if matches == 0 {
            format!("Check that '{}' exists in the source document", sub_path)
        } else {
            "Narrow the path so that it selects a single node".to_string()
        };
        Self {
            help: Some(help),
            ..Self::from_kind(ErrorKind::Query { sub_path, matches })
        }
    }

    /// Create a query error for a malformed path expression
    pub fn query_syntax(sub_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Query {
                sub_path: sub_path.into(),
                matches: 0,
            })
        }
    }

    /// Create a shape error naming the offending node kind
    pub fn shape(kind: impl Into<String>, read_type: impl Into<String>) -> Self {
        let read_type = read_type.into();
        Self {
            help: Some(format!(
                "Point the path at a node that can be read as {}, or change the entry's type",
                read_type
            )),
            ..Self::from_kind(ErrorKind::Shape {
                kind: kind.into(),
                read_type,
            })
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Decode)
        }
    }

    /// Create a lookup error for a key missing from a decoded map
    pub fn lookup(key: impl Into<String>, sub_path: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            entry: Some(key.clone()),
            help: Some(format!(
                "Add '{}' to the source document or set `name` on the entry",
                key
            )),
            ..Self::from_kind(ErrorKind::Lookup {
                key,
                sub_path: sub_path.into(),
            })
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Parse)
        }
    }

    /// Create an I/O error for a source that could not be read
    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_path: Some(path.into()),
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Io)
        }
    }

    /// Create a decryption error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Crypto)
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Output)
        }
    }

    /// Add entry context unless a more specific entry is already recorded
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        if self.entry.is_none() {
            self.entry = Some(entry.into());
        }
        self
    }

    /// Add source document context unless already recorded
    pub fn with_source(mut self, path: impl Into<String>) -> Self {
        if self.source_path.is_none() {
            self.source_path = Some(path.into());
        }
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Schema => write!(f, "Invalid manifest")?,
            ErrorKind::Collision { name } => write!(
                f,
                "Duplicate entry '{}' declared in both plain and encrypted namespaces",
                name
            )?,
            ErrorKind::Query { sub_path, matches } => write!(
                f,
                "Returned non-singular result for path '{}' ({} matches)",
                sub_path, matches
            )?,
            ErrorKind::Shape { kind, read_type } => {
                write!(f, "NodeKind/readType unsupported: {}/{}", kind, read_type)?
            }
            ErrorKind::Decode => write!(f, "Decode error")?,
            ErrorKind::Lookup { key, sub_path } => {
                write!(f, "Value not found for key '{}' at path '{}'", key, sub_path)?
            }
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::Io => write!(f, "I/O error")?,
            ErrorKind::Crypto => write!(f, "Decryption failed")?,
            ErrorKind::Output => write!(f, "Cannot render output")?,
        }

        if let Some(entry) = &self.entry {
            write!(f, "\n  Entry: {}", entry)?;
        }

        if let Some(source) = &self.source_path {
            write!(f, "\n  Source: {}", source)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
