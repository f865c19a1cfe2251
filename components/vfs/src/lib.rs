//! Virtual File System (VFS) - In-memory hierarchical file system
//!
//! # Purpose
//! Provides a tree of directories and files with POSIX-like open/read/write
//! semantics, plus overlays that mirror a virtual subtree to a directory of
//! the host file system.
//!
//! # Integration Points
//! - Depends on: host file system (overlays only)
//! - Provides to: kernel syscall router (`open`, `read`, `write`, `close`, `ls`)
//! - Shared state: the tree and the open-handle table, owned by [`Vfs`]
//!
//! # Architecture
//! - Strict tree rooted at `/`, every node owned by exactly one directory
//! - Paths resolved from the root, empty segments ignored
//! - Handle table with monotonic descriptors starting at 3
//! - Overlay table with longest-prefix matching; host I/O failures fall
//!   back to the virtual tree and are never surfaced
//!
//! # Testing Strategy
//! - Unit tests: path resolution, handles, overlays, tree operations
//! - Integration tests: host overlays against a scratch directory

use std::io;
use std::path::Path;

use thiserror::Error;

pub mod handle;
pub mod node;
pub mod overlay;
pub mod path;

pub use handle::{Fd, FileHandle, HandleTable, OpenMode, FIRST_FD};
pub use node::{Directory, File, Inode, Node, NodeKind};
pub use overlay::{HostEntry, OverlayMapping, OverlayTable};

/// VFS error types
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Is a directory: {path}")]
    IsADirectory { path: String },

    #[error("Bad file descriptor: {fd}")]
    BadDescriptor { fd: Fd },

    #[error("File descriptor {fd} is open in mode '{mode}'")]
    WrongMode { fd: Fd, mode: OpenMode },

    #[error("Invalid open mode: '{mode}'")]
    InvalidMode { mode: String },
}

pub type Result<T> = core::result::Result<T, VfsError>;

/// Directories created by [`Vfs::mount`]
pub const SEED_DIRECTORIES: [&str; 4] = ["/bin", "/etc", "/home", "/tmp"];

/// Files created by [`Vfs::mount`]
pub const SEED_FILES: [(&str, &str); 2] = [
    ("/etc/passwd", "root:x:0:0:root:/root:/bin/sh\n"),
    ("/etc/hostname", "edukern\n"),
];

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
    /// Byte length for files, 0 for directories
    pub size: usize,
}

impl DirEntry {
    fn of(node: &Node) -> Self {
        Self {
            name: node.name().to_string(),
            kind: node.kind(),
            size: node.size(),
        }
    }
}

/// Virtual File System
pub struct Vfs {
    root: Directory,
    handles: HandleTable,
    overlays: OverlayTable,
}

impl Vfs {
    /// Create an empty VFS holding only the root directory
    pub fn new() -> Self {
        Self {
            root: Directory::new("/"),
            handles: HandleTable::new(),
            overlays: OverlayTable::new(),
        }
    }

    /// Create the standard directory layout and seed files
    pub fn mount(&mut self) -> Result<()> {
        for dir in SEED_DIRECTORIES {
            self.mkdir(dir)?;
        }
        for (path, content) in SEED_FILES {
            self.write_file(path, content.as_bytes())?;
        }
        log::info!("[vfs] mounted root with {} top-level entries", self.root.len());
        Ok(())
    }

    /// Root directory
    pub fn root(&self) -> &Directory {
        &self.root
    }

    /// Registered overlays
    pub fn overlays(&self) -> &OverlayTable {
        &self.overlays
    }

    /// Open handle table
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Register an overlay and import the host directory into the tree
    ///
    /// The virtual prefix is created if missing. The import only populates
    /// the virtual tree; nothing is written back to the host. An unreadable
    /// host directory leaves the mapping registered with nothing imported.
    ///
    /// # Errors
    /// `PathNotFound` if a file occupies part of the virtual prefix.
    pub fn register_overlay(&mut self, mapping: OverlayMapping) -> Result<()> {
        let prefix = mapping.virtual_prefix.clone();
        let host = mapping.host_root.clone();

        ensure_dir(&mut self.root, &path::segments(&prefix)).ok_or_else(|| {
            VfsError::PathNotFound {
                path: prefix.clone(),
            }
        })?;
        self.overlays.insert(mapping);

        match self.import_host_tree(&host, &prefix) {
            Ok(count) => log::info!(
                "[vfs] overlay {} -> {} ({} entries imported)",
                prefix,
                host.display(),
                count
            ),
            Err(err) => log::debug!("[vfs] overlay import from {} skipped: {}", host.display(), err),
        }
        Ok(())
    }

    /// Create a directory and every missing parent
    ///
    /// Creating an existing directory is not an error.
    ///
    /// # Errors
    /// `PathNotFound` if a file occupies one of the components.
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let path = path::normalize(path);
        ensure_dir(&mut self.root, &path::segments(&path))
            .ok_or_else(|| VfsError::PathNotFound { path: path.clone() })?;

        if let Some(host) = self.overlays.host_path(&path) {
            if let Err(err) = overlay::create_host_dir(&host) {
                log::debug!("[vfs] host mkdir {} failed: {}", host.display(), err);
            }
        }
        Ok(())
    }

    /// Write a whole file, replacing any existing content
    ///
    /// # Errors
    /// - `PathNotFound` if the parent directory does not exist
    /// - `IsADirectory` if `path` names a directory
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let path = path::normalize(path);
        let (dir_parts, name) = path::split_parent(&path).ok_or_else(|| {
            VfsError::IsADirectory { path: path.clone() }
        })?;

        let dir = dir_at_mut(&mut self.root, &dir_parts).ok_or_else(|| {
            VfsError::PathNotFound {
                path: path::join_segments(&dir_parts),
            }
        })?;
        if let Some(Node::Directory(_)) = dir.child(name) {
            return Err(VfsError::IsADirectory { path: path.clone() });
        }

        if let Some(host) = self.overlays.host_path(&path) {
            if let Err(err) = overlay::write_host_file(&host, data) {
                log::debug!("[vfs] host write {} failed: {}", host.display(), err);
            }
        }

        upsert_file(dir, name, data.to_vec());
        Ok(())
    }

    /// Read a whole file
    ///
    /// Under an overlay the host file is read first and copied into the
    /// virtual tree.
    ///
    /// # Errors
    /// - `PathNotFound` if the parent directory does not exist
    /// - `FileNotFound` if the target is missing or is a directory
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let path = path::normalize(path);

        if let Some(host) = self.overlays.host_path(&path) {
            match overlay::read_host_file(&host) {
                Ok(data) => {
                    if let Some((dir_parts, name)) = path::split_parent(&path) {
                        if let Some(dir) = dir_at_mut(&mut self.root, &dir_parts) {
                            if dir.child(name).and_then(Node::as_dir).is_none() {
                                upsert_file(dir, name, data.clone());
                            }
                        }
                    }
                    return Ok(data);
                }
                Err(err) => log::debug!("[vfs] host read {} failed: {}", host.display(), err),
            }
        }

        let (dir_parts, name) = path::split_parent(&path).ok_or_else(|| {
            VfsError::FileNotFound { path: path.clone() }
        })?;
        let dir = dir_at(&self.root, &dir_parts).ok_or_else(|| VfsError::PathNotFound {
            path: path::join_segments(&dir_parts),
        })?;

        match dir.child(name) {
            Some(Node::File(file)) => Ok(file.data().to_vec()),
            _ => Err(VfsError::FileNotFound { path: path.clone() }),
        }
    }

    /// Open a file and return its descriptor
    ///
    /// Write and append modes create a missing file (empty) first; read
    /// mode fails on a missing file.
    pub fn open(&mut self, path: &str, mode: OpenMode) -> Result<Fd> {
        let path = path::normalize(path);

        let data = match self.read_file(&path) {
            Ok(data) => data,
            Err(VfsError::FileNotFound { .. }) if mode.is_writable() => {
                self.write_file(&path, &[])?;
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        let fd = self.handles.open(path, mode, data);
        log::debug!("[vfs] open fd={} mode={}", fd, mode);
        Ok(fd)
    }

    /// Read up to `max_len` bytes from a descriptor
    ///
    /// Returns an empty chunk at end of file.
    pub fn read(&mut self, fd: Fd, max_len: usize) -> Result<Vec<u8>> {
        Ok(self.handles.get_mut(fd)?.read(max_len))
    }

    /// Write through a descriptor and persist the full content
    ///
    /// The handle only advances once the content is persisted.
    ///
    /// # Errors
    /// - `BadDescriptor` for unknown descriptors
    /// - `WrongMode` for read-only handles
    /// - `IsADirectory` / `PathNotFound` if the file's place in the tree
    ///   changed since it was opened
    pub fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize> {
        let mut staged = self.handles.get_mut(fd)?.clone();
        let written = staged.write(data)?;
        self.write_file(&staged.path, staged.data())?;

        *self.handles.get_mut(fd)? = staged;
        Ok(written)
    }

    /// Close a descriptor; returns whether it was open
    pub fn close(&mut self, fd: Fd) -> bool {
        self.handles.close(fd)
    }

    /// Close every open descriptor
    pub fn close_all(&mut self) -> usize {
        self.handles.close_all()
    }

    /// List the immediate children of a directory, sorted by name
    ///
    /// Under an overlay the host directory is read first and replaces the
    /// cached children.
    ///
    /// # Errors
    /// `PathNotFound` if `path` does not resolve to a directory.
    pub fn list(&mut self, path: &str) -> Result<Vec<DirEntry>> {
        let path = path::normalize(path);
        let parts = path::segments(&path);

        if let Some(host) = self.overlays.host_path(&path) {
            match overlay::read_host_dir(&host) {
                Ok(entries) => {
                    if let Some(dir) = ensure_dir(&mut self.root, &parts) {
                        refresh_dir(dir, entries);
                    }
                }
                Err(err) => log::debug!("[vfs] host list {} failed: {}", host.display(), err),
            }
        }

        let dir = dir_at(&self.root, &parts).ok_or_else(|| VfsError::PathNotFound {
            path: path.clone(),
        })?;
        Ok(dir.children().map(DirEntry::of).collect())
    }

    /// Whether `path` resolves to any node
    pub fn exists(&self, path: &str) -> bool {
        match path::split_parent(path) {
            None => true,
            Some((dir_parts, name)) => dir_at(&self.root, &dir_parts)
                .and_then(|dir| dir.child(name))
                .is_some(),
        }
    }

    /// Whether `path` resolves to a directory
    pub fn is_dir(&self, path: &str) -> bool {
        dir_at(&self.root, &path::segments(path)).is_some()
    }

    /// Recursively copy a host directory into the virtual tree
    fn import_host_tree(&mut self, host: &Path, virtual_dir: &str) -> io::Result<usize> {
        let mut imported = 0;
        for entry in overlay::read_host_dir(host)? {
            match entry {
                HostEntry::Directory(name) => {
                    let child = path::normalize(&format!("{}/{}", virtual_dir, name));
                    if ensure_dir(&mut self.root, &path::segments(&child)).is_none() {
                        continue;
                    }
                    imported += 1;
                    match self.import_host_tree(&host.join(&name), &child) {
                        Ok(count) => imported += count,
                        Err(err) => log::debug!("[vfs] skipping host dir {}: {}", name, err),
                    }
                }
                HostEntry::File(name, data) => {
                    if let Some(dir) = dir_at_mut(&mut self.root, &path::segments(virtual_dir)) {
                        if dir.child(&name).and_then(Node::as_dir).is_none() {
                            upsert_file(dir, &name, data);
                            imported += 1;
                        }
                    }
                }
            }
        }
        Ok(imported)
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk to the directory named by `parts`
fn dir_at<'a>(root: &'a Directory, parts: &[&str]) -> Option<&'a Directory> {
    let mut current = root;
    for part in parts {
        current = current.child(part)?.as_dir()?;
    }
    Some(current)
}

/// Walk to the directory named by `parts`, mutably
fn dir_at_mut<'a>(root: &'a mut Directory, parts: &[&str]) -> Option<&'a mut Directory> {
    let mut current = root;
    for part in parts {
        current = current.child_mut(part)?.as_dir_mut()?;
    }
    Some(current)
}

/// Walk to the directory named by `parts`, creating missing components
///
/// Returns `None` if a file is in the way.
fn ensure_dir<'a>(root: &'a mut Directory, parts: &[&str]) -> Option<&'a mut Directory> {
    let mut current = root;
    for part in parts {
        current = current.ensure_dir(part)?;
    }
    Some(current)
}

/// Replace the content of `name` in `dir`, creating the file if needed
fn upsert_file(dir: &mut Directory, name: &str, data: Vec<u8>) {
    match dir.child_mut(name).and_then(Node::as_file_mut) {
        Some(file) => file.set_data(data),
        None => {
            dir.insert(Node::File(File::new(name, data)));
        }
    }
}

/// Replace the children of `dir` with a host snapshot
///
/// Cached subdirectories that still exist on the host keep their subtree.
fn refresh_dir(dir: &mut Directory, entries: Vec<HostEntry>) {
    let mut previous = dir.take_children();
    for entry in entries {
        match entry {
            HostEntry::Directory(name) => {
                let node = match previous.remove(&name) {
                    Some(node @ Node::Directory(_)) => node,
                    _ => Node::Directory(Directory::new(name.as_str())),
                };
                dir.insert(node);
            }
            HostEntry::File(name, data) => {
                let node = match previous.remove(&name) {
                    Some(Node::File(mut file)) => {
                        file.set_data(data);
                        Node::File(file)
                    }
                    _ => Node::File(File::new(name.as_str(), data)),
                };
                dir.insert(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted() -> Vfs {
        let mut vfs = Vfs::new();
        vfs.mount().unwrap();
        vfs
    }

    #[test]
    fn test_vfs_creation() {
        let vfs = Vfs::new();
        assert!(vfs.root().is_empty());
        assert!(vfs.is_dir("/"));
    }

    #[test]
    fn test_mount_seeds_layout() {
        let mut vfs = mounted();
        let names: Vec<String> = vfs.list("/").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["bin", "etc", "home", "tmp"]);
        assert_eq!(vfs.read_file("/etc/hostname").unwrap(), b"edukern\n");
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let mut vfs = mounted();
        vfs.write_file("/tmp/a.txt", b"payload").unwrap();
        assert_eq!(vfs.read_file("/tmp/a.txt").unwrap(), b"payload");

        // last write wins
        vfs.write_file("/tmp/a.txt", b"second").unwrap();
        assert_eq!(vfs.read_file("//tmp//a.txt").unwrap(), b"second");
    }

    #[test]
    fn test_write_requires_parent() {
        let mut vfs = mounted();
        let err = vfs.write_file("/nope/a.txt", b"x").unwrap_err();
        assert!(matches!(err, VfsError::PathNotFound { path } if path == "/nope"));
    }

    #[test]
    fn test_write_onto_directory_fails() {
        let mut vfs = mounted();
        assert!(matches!(
            vfs.write_file("/tmp", b"x"),
            Err(VfsError::IsADirectory { .. })
        ));
    }

    #[test]
    fn test_read_file_errors() {
        let mut vfs = mounted();
        assert!(matches!(
            vfs.read_file("/tmp/missing"),
            Err(VfsError::FileNotFound { .. })
        ));
        assert!(matches!(
            vfs.read_file("/home"),
            Err(VfsError::FileNotFound { .. })
        ));
        assert!(matches!(
            vfs.read_file("/etc/passwd/x"),
            Err(VfsError::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_mkdir_creates_parents_and_is_idempotent() {
        let mut vfs = mounted();
        vfs.mkdir("/home/u/projects/x").unwrap();
        assert!(vfs.is_dir("/home/u/projects"));

        vfs.write_file("/home/u/keep.txt", b"k").unwrap();
        vfs.mkdir("/home/u").unwrap();
        let entries = vfs.list("/home/u").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(vfs.read_file("/home/u/keep.txt").unwrap(), b"k");
    }

    #[test]
    fn test_mkdir_through_file_fails() {
        let mut vfs = mounted();
        assert!(matches!(
            vfs.mkdir("/etc/passwd/sub"),
            Err(VfsError::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_list_reports_kind_and_size() {
        let mut vfs = mounted();
        vfs.mkdir("/home/u/sub").unwrap();
        vfs.write_file("/home/u/f.txt", b"hello").unwrap();

        let entries = vfs.list("/home/u").unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry { name: "f.txt".into(), kind: NodeKind::File, size: 5 },
                DirEntry { name: "sub".into(), kind: NodeKind::Directory, size: 0 },
            ]
        );
        assert!(matches!(
            vfs.list("/etc/passwd"),
            Err(VfsError::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_open_write_creates_empty_file() {
        let mut vfs = mounted();
        let fd = vfs.open("/tmp/new.txt", OpenMode::Write).unwrap();
        assert!(vfs.close(fd));
        assert!(vfs.read_file("/tmp/new.txt").unwrap().is_empty());
    }

    #[test]
    fn test_open_read_missing_fails() {
        let mut vfs = mounted();
        assert!(matches!(
            vfs.open("/tmp/missing", OpenMode::Read),
            Err(VfsError::FileNotFound { .. })
        ));
        assert!(matches!(
            vfs.open("/missing/dir/f", OpenMode::Write),
            Err(VfsError::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_write_through_handle_persists_immediately() {
        let mut vfs = mounted();
        vfs.write_file("/tmp/f", b"hello world").unwrap();
        let fd = vfs.open("/tmp/f", OpenMode::Write).unwrap();
        assert_eq!(vfs.write(fd, b"HELLO").unwrap(), 5);
        assert_eq!(vfs.read_file("/tmp/f").unwrap(), b"HELLO world");

        let log = vfs.open("/tmp/log", OpenMode::Append).unwrap();
        vfs.write(log, b"a").unwrap();
        vfs.write(log, b"b").unwrap();
        assert_eq!(vfs.read_file("/tmp/log").unwrap(), b"ab");
    }

    #[test]
    fn test_bad_descriptor_and_wrong_mode() {
        let mut vfs = mounted();
        let fd = vfs.open("/etc/hostname", OpenMode::Read).unwrap();
        assert!(matches!(vfs.write(fd, b"x"), Err(VfsError::WrongMode { .. })));
        assert!(vfs.close(fd));
        assert!(!vfs.close(fd));
        assert!(matches!(vfs.read(fd, 10), Err(VfsError::BadDescriptor { .. })));
        assert!(matches!(vfs.write(fd, b"x"), Err(VfsError::BadDescriptor { .. })));
    }

    #[test]
    fn test_read_chunks_until_empty() {
        let mut vfs = mounted();
        vfs.write_file("/tmp/f", b"abcdefg").unwrap();
        let fd = vfs.open("/tmp/f", OpenMode::Read).unwrap();
        assert_eq!(vfs.read(fd, 3).unwrap(), b"abc");
        assert_eq!(vfs.read(fd, 3).unwrap(), b"def");
        assert_eq!(vfs.read(fd, 3).unwrap(), b"g");
        assert!(vfs.read(fd, 3).unwrap().is_empty());
    }

    #[test]
    fn test_exists() {
        let vfs = mounted();
        assert!(vfs.exists("/etc/passwd"));
        assert!(vfs.exists("/"));
        assert!(!vfs.exists("/etc/shadow"));
    }
}
