//! Environment resolution
//!
//! A [`Gear`] turns one environment table into a flat output map:
//!
//! 1. decode the table into entries (collisions fail here, before any I/O)
//! 2. split literal entries from entries that need a source document
//! 3. group the latter by `(path, encrypted)` so every document is read,
//!    decrypted and parsed once
//! 4. resolve each group through its own [`Visitor`]
//! 5. assemble the output in declaration order
//!
//! Resolution is all or nothing: the first error aborts the pass.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::decrypt::{Decrypter, SopsDecrypter};
use crate::entry::{decode_environment, ConfigEntry, EntryMap};
use crate::error::{Error, Result};
use crate::format::Format;
#[cfg(feature = "http")]
use crate::source::HttpReader;
use crate::source::{is_remote, suffix_path, FsReader, SourceReader};
use crate::value::Value;
use crate::visitor::Visitor;

/// Thread cap when the core count cannot be queried
const DEFAULT_WORKERS: usize = 4;

/// Resolved output: entry name to value, in declaration order
pub type CfgMap = IndexMap<String, Value>;

/// Options controlling a resolution pass
#[derive(Debug, Clone)]
pub struct GearOptions {
    /// Base directory for relative source paths
    pub base_path: Option<PathBuf>,
    /// Resolve distinct source documents on separate threads
    pub parallel: bool,
    /// Drop every encrypted entry before resolving
    pub skip_encrypted: bool,
    /// Upper bound on concurrent document threads; the core count when unset
    pub max_workers: Option<usize>,
}

impl Default for GearOptions {
    fn default() -> Self {
        Self {
            base_path: None,
            parallel: true,
            skip_encrypted: false,
            max_workers: None,
        }
    }
}

/// Entries sharing one source document
#[derive(Debug)]
struct PathGroup {
    path: String,
    encrypted: bool,
    entries: Vec<ConfigEntry>,
}

/// Resolves environments of one manifest
#[derive(Clone)]
pub struct Gear {
    name: String,
    options: GearOptions,
    reader: Arc<dyn SourceReader>,
    remote: Option<Arc<dyn SourceReader>>,
    decrypter: Arc<dyn Decrypter>,
}

impl std::fmt::Debug for Gear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gear")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Gear {
    /// Create a gear reading from disk and decrypting through sops
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, GearOptions::default())
    }

    /// Create a gear with custom options
    pub fn with_options(name: impl Into<String>, options: GearOptions) -> Self {
        Self {
            name: name.into(),
            options,
            reader: Arc::new(FsReader),
            remote: default_remote_reader(),
            decrypter: Arc::new(SopsDecrypter::default()),
        }
    }

    /// Replace the source reader
    pub fn with_reader(mut self, reader: Arc<dyn SourceReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Replace the reader used for `http://` and `https://` paths
    pub fn with_remote_reader(mut self, reader: Arc<dyn SourceReader>) -> Self {
        self.remote = Some(reader);
        self
    }

    /// Replace the decrypter
    pub fn with_decrypter(mut self, decrypter: Arc<dyn Decrypter>) -> Self {
        self.decrypter = decrypter;
        self
    }

    /// Name of the manifest this gear belongs to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options in effect
    pub fn options(&self) -> &GearOptions {
        &self.options
    }

    /// Resolve an environment table into a flat map
    pub fn resolve_map(&self, env: &toml::Table) -> Result<CfgMap> {
        let mut entries = decode_environment(env)?;

        if self.options.skip_encrypted {
            entries.retain(|name, entry| {
                if entry.encrypted {
                    log::debug!("skipping encrypted entry '{}'", name);
                }
                !entry.encrypted
            });
        }

        let groups = group_by_path(&entries);
        let resolved = if self.options.parallel && groups.len() > 1 {
            self.resolve_groups_parallel(groups)?
        } else {
            groups
                .into_iter()
                .map(|group| self.resolve_group(group))
                .collect::<Result<Vec<_>>>()?
        };

        for entry in resolved.into_iter().flatten() {
            entries.insert(entry.name.clone(), entry);
        }

        Ok(entries
            .into_iter()
            .map(|(name, entry)| {
                let value = entry.output();
                (name, value)
            })
            .collect())
    }

    /// Resolve groups on scoped threads, at most one per available core at
    /// a time. Results come back in group order.
    fn resolve_groups_parallel(&self, groups: Vec<PathGroup>) -> Result<Vec<Vec<ConfigEntry>>> {
        let workers = self
            .options
            .max_workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(usize::from)
                    .unwrap_or(DEFAULT_WORKERS)
            })
            .max(1);
        let mut resolved = Vec::with_capacity(groups.len());
        let mut pending = groups.into_iter().peekable();

        while pending.peek().is_some() {
            let batch: Vec<PathGroup> = pending.by_ref().take(workers).collect();
            log::trace!("resolving a batch of {} path groups", batch.len());
            let results = std::thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .into_iter()
                    .map(|group| scope.spawn(move || self.resolve_group(group)))
                    .collect();

                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|_| Err(Error::decode("path group worker panicked")))
                    })
                    .collect::<Result<Vec<_>>>()
            })?;
            resolved.extend(results);
        }

        Ok(resolved)
    }

    /// Read, decrypt and parse one document, then resolve its entries
    fn resolve_group(&self, group: PathGroup) -> Result<Vec<ConfigEntry>> {
        let PathGroup {
            path,
            encrypted,
            mut entries,
        } = group;
        let full_path = self.source_path(&path);
        let format = Format::for_path(suffix_path(&path));
        log::debug!(
            "resolving {} entr{} from {} ({}{})",
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" },
            full_path.display(),
            format,
            if encrypted { ", encrypted" } else { "" }
        );

        let mut buf = self.reader_for(&path)?.read(&full_path)?;
        if encrypted {
            buf = self
                .decrypter
                .decrypt(&buf, format)
                .map_err(|e| e.with_source(&path))?;
        }
        let mut visitor = Visitor::from_bytes(&buf, format).map_err(|e| e.with_source(&path))?;

        for entry in &mut entries {
            visitor
                .resolve(entry)
                .map_err(|e| e.with_entry(&entry.name).with_source(&path))?;
        }

        Ok(entries)
    }

    fn reader_for(&self, path: &str) -> Result<&dyn SourceReader> {
        if !is_remote(path) {
            return Ok(self.reader.as_ref());
        }
        self.remote.as_deref().ok_or_else(|| {
            Error::io(path, "HTTP sources are not supported by this build")
                .with_help("Enable the `http` feature of gearbox-core")
        })
    }

    fn source_path(&self, path: &str) -> PathBuf {
        if is_remote(path) {
            return PathBuf::from(path);
        }
        let path = Path::new(path);
        match &self.options.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(feature = "http")]
fn default_remote_reader() -> Option<Arc<dyn SourceReader>> {
    Some(Arc::new(HttpReader::default()))
}

#[cfg(not(feature = "http"))]
fn default_remote_reader() -> Option<Arc<dyn SourceReader>> {
    None
}

/// Group every entry that needs a source document by that document.
/// Literals are left out.
fn group_by_path(entries: &EntryMap) -> Vec<PathGroup> {
    let mut groups: IndexMap<(String, bool), Vec<ConfigEntry>> = IndexMap::new();

    for entry in entries.values() {
        if !entry.value.is_empty() && !entry.path.is_empty() {
            log::warn!(
                "entry '{}' has a literal value and a path; path '{}' is ignored",
                entry.name,
                entry.path
            );
        }
        if entry.needs_source() {
            groups
                .entry((entry.path.clone(), entry.encrypted))
                .or_default()
                .push(entry.clone());
        }
    }

    groups
        .into_iter()
        .map(|((path, encrypted), entries)| PathGroup {
            path,
            encrypted,
            entries,
        })
        .collect()
}
