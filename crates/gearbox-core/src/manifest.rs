//! Manifest loading
//!
//! A manifest is a TOML document with a required top-level `name` and one
//! table per environment:
//!
//! ```toml
//! name = "svc"
//!
//! [qa]
//! VAR = "hello"
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::gear::{CfgMap, Gear, GearOptions};

/// A parsed manifest
#[derive(Debug, Clone)]
pub struct Manifest {
    name: String,
    table: toml::Table,
    base_path: Option<PathBuf>,
}

impl Manifest {
    /// Parse a manifest from TOML text
    pub fn from_toml(src: &str) -> Result<Self> {
        let table: toml::Table = src
            .parse()
            .map_err(|e: toml::de::Error| Error::parse(format!("Invalid TOML: {}", e)))?;

        let name = match table.get("name") {
            Some(toml::Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(Error::schema(format!(
                    "`name` must be a string, found {}",
                    other.type_str()
                )))
            }
            None => {
                return Err(Error::schema("Manifest is missing the top-level `name`")
                    .with_help("Add `name = \"<service>\"` at the top of the manifest"))
            }
        };

        Ok(Self {
            name,
            table,
            base_path: None,
        })
    }

    /// Load a manifest file; relative source paths resolve against its
    /// directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(path.display().to_string(), e.to_string()))?;

        let mut manifest =
            Self::from_toml(&content).map_err(|e| e.with_source(path.display().to_string()))?;
        manifest.base_path = path.parent().map(Path::to_path_buf);
        Ok(manifest)
    }

    /// The manifest's `name`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory relative source paths are resolved against
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// Names of all declared environments
    pub fn environment_names(&self) -> Vec<&str> {
        self.table
            .iter()
            .filter(|(_, v)| v.is_table())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// The raw table for one environment
    pub fn environment(&self, env: &str) -> Result<&toml::Table> {
        match self.table.get(env) {
            Some(toml::Value::Table(table)) => Ok(table),
            Some(other) => Err(Error::schema(format!(
                "Environment '{}' must be a table, found {}",
                env,
                other.type_str()
            ))),
            None => {
                let known = self.environment_names().join(", ");
                Err(
                    Error::schema(format!("Environment '{}' not found", env)).with_help(
                        if known.is_empty() {
                            "The manifest declares no environments".to_string()
                        } else {
                            format!("Known environments: {}", known)
                        },
                    ),
                )
            }
        }
    }

    /// A gear for this manifest. `options.base_path` defaults to the
    /// manifest's directory.
    pub fn gear(&self, mut options: GearOptions) -> Gear {
        if options.base_path.is_none() {
            options.base_path = self.base_path.clone();
        }
        Gear::with_options(&self.name, options)
    }

    /// Resolve one environment with default collaborators
    pub fn resolve(&self, env: &str, options: GearOptions) -> Result<CfgMap> {
        let table = self.environment(env)?;
        self.gear(options).resolve_map(table)
    }
}

/// Load `manifest_path` and resolve environment `env`
pub fn generate(env: &str, manifest_path: impl AsRef<Path>) -> Result<CfgMap> {
    let manifest = Manifest::load(manifest_path)?;
    manifest.resolve(env, GearOptions::default())
}
