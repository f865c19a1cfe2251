//! Host overlays
//!
//! An overlay maps a virtual path prefix onto a directory of the host file
//! system. Operations under a mapped prefix are mirrored to the host; the
//! virtual tree acts as a cache that is refreshed whenever the host is
//! touched.
//!
//! When several prefixes match a path, the longest one (counted in
//! segments) wins, so resolution does not depend on registration order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::path;

/// One virtual prefix → host directory mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayMapping {
    /// Canonical virtual prefix (`/mnt/data`)
    pub virtual_prefix: String,
    /// Host directory the prefix mirrors
    pub host_root: PathBuf,
}

impl OverlayMapping {
    pub fn new(host_root: impl Into<PathBuf>, virtual_prefix: &str) -> Self {
        Self {
            virtual_prefix: path::normalize(virtual_prefix),
            host_root: host_root.into(),
        }
    }

    /// Parse a `hostPath:virtualPath` pair
    ///
    /// The split happens on the last `:` so host paths carrying a drive
    /// letter (`C:\data:/mnt/c`) still parse.
    pub fn parse(pair: &str) -> Option<Self> {
        let (host, virt) = pair.trim().rsplit_once(':')?;
        let (host, virt) = (host.trim(), virt.trim());
        if host.is_empty() || virt.is_empty() {
            return None;
        }
        Some(Self::new(host, virt))
    }

    /// Parse a comma separated list of pairs, skipping malformed entries
    pub fn parse_list(list: &str) -> Vec<Self> {
        list.split(',')
            .filter(|pair| !pair.trim().is_empty())
            .filter_map(|pair| {
                let parsed = Self::parse(pair);
                if parsed.is_none() {
                    log::warn!("[vfs] ignoring malformed overlay mapping '{}'", pair.trim());
                }
                parsed
            })
            .collect()
    }
}

/// Set of registered overlay mappings
#[derive(Debug, Clone, Default)]
pub struct OverlayTable {
    mappings: Vec<OverlayMapping>,
}

impl OverlayTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapping, replacing any mapping for the same prefix
    pub fn insert(&mut self, mapping: OverlayMapping) {
        self.mappings
            .retain(|existing| existing.virtual_prefix != mapping.virtual_prefix);
        self.mappings.push(mapping);
    }

    pub fn mappings(&self) -> &[OverlayMapping] {
        &self.mappings
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Host path backing `virtual_path`, using longest-prefix match
    pub fn host_path(&self, virtual_path: &str) -> Option<PathBuf> {
        self.mappings
            .iter()
            .filter_map(|mapping| {
                path::strip_prefix(virtual_path, &mapping.virtual_prefix)
                    .map(|rest| (path::segments(&mapping.virtual_prefix).len(), mapping, rest))
            })
            .max_by_key(|(depth, _, _)| *depth)
            .map(|(_, mapping, rest)| {
                let mut host = mapping.host_root.clone();
                host.extend(rest);
                host
            })
    }
}

/// Snapshot of one host directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEntry {
    Directory(String),
    File(String, Vec<u8>),
}

/// Read every regular file and directory directly under `dir`
///
/// Entries that are neither (sockets, broken links) are skipped.
pub fn read_host_dir(dir: &Path) -> io::Result<Vec<HostEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = fs::metadata(entry.path())?;
        if meta.is_dir() {
            entries.push(HostEntry::Directory(name));
        } else if meta.is_file() {
            entries.push(HostEntry::File(name, fs::read(entry.path())?));
        }
    }
    Ok(entries)
}

/// Read a host file, refusing directories
pub fn read_host_file(file: &Path) -> io::Result<Vec<u8>> {
    fs::read(file)
}

/// Write a host file, replacing its content
pub fn write_host_file(file: &Path, data: &[u8]) -> io::Result<()> {
    fs::write(file, data)
}

/// Create a host directory and its missing parents
pub fn create_host_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)
}
