//! Open file handles
//!
//! A handle keeps a working copy of the file content plus a cursor. Writes
//! go to the working copy first and are then persisted by the VFS, so a
//! handle never buffers data across calls.

use std::collections::HashMap;

use crate::{Result, VfsError};

/// File descriptor
pub type Fd = u32;

/// Descriptors 0..=2 are reserved for the standard streams
pub const FIRST_FD: Fd = 3;

/// Access mode of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    /// Parse a C-style mode string (`"r"`, `"w"`, `"a"`, `"w+"`, ...)
    ///
    /// Append takes precedence over write, write over read.
    pub fn parse(mode: &str) -> Result<Self> {
        if mode.contains('a') {
            Ok(OpenMode::Append)
        } else if mode.contains('w') {
            Ok(OpenMode::Write)
        } else if mode.contains('r') {
            Ok(OpenMode::Read)
        } else {
            Err(VfsError::InvalidMode {
                mode: mode.to_string(),
            })
        }
    }

    /// Whether the mode permits `write`
    pub fn is_writable(&self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::Append)
    }
}

impl core::fmt::Display for OpenMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            OpenMode::Read => "r",
            OpenMode::Write => "w",
            OpenMode::Append => "a",
        };
        f.write_str(s)
    }
}

/// An open file session
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub fd: Fd,
    pub path: String,
    pub mode: OpenMode,
    data: Vec<u8>,
    position: usize,
}

impl FileHandle {
    pub fn new(fd: Fd, path: String, mode: OpenMode, data: Vec<u8>) -> Self {
        Self {
            fd,
            path,
            mode,
            data,
            position: 0,
        }
    }

    /// Working copy of the content
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Cursor position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Read up to `max_len` bytes from the cursor
    ///
    /// An empty chunk signals end of stream.
    pub fn read(&mut self, max_len: usize) -> Vec<u8> {
        let start = self.position.min(self.data.len());
        let end = start.saturating_add(max_len).min(self.data.len());
        self.position = end;
        self.data[start..end].to_vec()
    }

    /// Apply a write to the working copy, returning the bytes written
    ///
    /// Append mode always writes at the end. Write mode splices at the
    /// cursor, overwriting existing bytes and extending past the end.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        match self.mode {
            OpenMode::Read => {
                return Err(VfsError::WrongMode {
                    fd: self.fd,
                    mode: self.mode,
                })
            }
            OpenMode::Append => {
                self.data.extend_from_slice(bytes);
                self.position = self.data.len();
            }
            OpenMode::Write => {
                let start = self.position.min(self.data.len());
                let end = (start + bytes.len()).min(self.data.len());
                self.data.splice(start..end, bytes.iter().copied());
                self.position = start + bytes.len();
            }
        }
        Ok(bytes.len())
    }
}

/// Table of open handles with monotonic descriptor allocation
#[derive(Debug)]
pub struct HandleTable {
    handles: HashMap<Fd, FileHandle>,
    next_fd: Fd,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            next_fd: FIRST_FD,
        }
    }

    /// Register a new handle and return its descriptor
    pub fn open(&mut self, path: String, mode: OpenMode, data: Vec<u8>) -> Fd {
        let fd = self.next_fd;
        self.next_fd += 1;
        self.handles.insert(fd, FileHandle::new(fd, path, mode, data));
        fd
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut FileHandle> {
        self.handles.get_mut(&fd).ok_or(VfsError::BadDescriptor { fd })
    }

    pub fn get(&self, fd: Fd) -> Option<&FileHandle> {
        self.handles.get(&fd)
    }

    /// Drop a handle; returns whether it existed
    pub fn close(&mut self, fd: Fd) -> bool {
        self.handles.remove(&fd).is_some()
    }

    /// Drop every handle
    pub fn close_all(&mut self) -> usize {
        let count = self.handles.len();
        self.handles.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
