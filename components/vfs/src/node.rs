//! VFS nodes - directories and files
//!
//! Every node is owned by exactly one parent directory; the root directory
//! owns the whole tree. There are no hard links and no shared ownership, so
//! the tree is a plain recursive enum.

use std::collections::BTreeMap;
use std::time::SystemTime;

/// Node type as reported by directory listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Directory,
    File,
}

impl NodeKind {
    /// Lower-case name used in listings (`"directory"` / `"file"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Directory => "directory",
            NodeKind::File => "file",
        }
    }
}

impl core::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability shared by every node: it is named, typed and timestamped
pub trait Inode {
    /// Name of the node inside its parent directory
    fn name(&self) -> &str;

    /// Directory or file
    fn kind(&self) -> NodeKind;

    /// Creation time
    fn created_at(&self) -> SystemTime;

    /// Size reported by listings (byte length for files, 0 for directories)
    fn size(&self) -> usize;
}

/// Directory node
#[derive(Debug, Clone)]
pub struct Directory {
    name: String,
    children: BTreeMap<String, Node>,
    created_at: SystemTime,
}

impl Directory {
    /// Create an empty directory
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: BTreeMap::new(),
            created_at: SystemTime::now(),
        }
    }

    /// Look up an immediate child
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    /// Look up an immediate child mutably
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.get_mut(name)
    }

    /// Insert or replace a child, keyed by the node's own name
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        self.children.insert(node.name().to_string(), node)
    }

    /// Remove a child
    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.children.remove(name)
    }

    /// Iterate over children in name order
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.values()
    }

    /// Number of immediate children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Drop every child, returning the previous children
    pub(crate) fn take_children(&mut self) -> BTreeMap<String, Node> {
        core::mem::take(&mut self.children)
    }

    /// Get the child directory `name`, creating it when missing
    ///
    /// Returns `None` if a file already occupies the name.
    pub(crate) fn ensure_dir(&mut self, name: &str) -> Option<&mut Directory> {
        let node = self
            .children
            .entry(name.to_string())
            .or_insert_with(|| Node::Directory(Directory::new(name)));
        node.as_dir_mut()
    }
}

impl Inode for Directory {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Directory
    }

    fn created_at(&self) -> SystemTime {
        self.created_at
    }

    fn size(&self) -> usize {
        0
    }
}

/// File node
#[derive(Debug, Clone)]
pub struct File {
    name: String,
    data: Vec<u8>,
    created_at: SystemTime,
    modified_at: SystemTime,
}

impl File {
    /// Create a file holding `data`
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let now = SystemTime::now();
        Self {
            name: name.into(),
            data,
            created_at: now,
            modified_at: now,
        }
    }

    /// File content
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Last modification time
    pub fn modified_at(&self) -> SystemTime {
        self.modified_at
    }

    /// Replace content and stamp the modification time
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
        self.modified_at = SystemTime::now();
    }
}

impl Inode for File {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::File
    }

    fn created_at(&self) -> SystemTime {
        self.created_at
    }

    fn size(&self) -> usize {
        self.data.len()
    }
}

/// A node in the tree
#[derive(Debug, Clone)]
pub enum Node {
    Directory(Directory),
    File(File),
}

impl Node {
    pub fn as_dir(&self) -> Option<&Directory> {
        match self {
            Node::Directory(dir) => Some(dir),
            Node::File(_) => None,
        }
    }

    pub fn as_dir_mut(&mut self) -> Option<&mut Directory> {
        match self {
            Node::Directory(dir) => Some(dir),
            Node::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&File> {
        match self {
            Node::File(file) => Some(file),
            Node::Directory(_) => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut File> {
        match self {
            Node::File(file) => Some(file),
            Node::Directory(_) => None,
        }
    }

    fn inode(&self) -> &dyn Inode {
        match self {
            Node::Directory(dir) => dir,
            Node::File(file) => file,
        }
    }
}

impl Inode for Node {
    fn name(&self) -> &str {
        self.inode().name()
    }

    fn kind(&self) -> NodeKind {
        self.inode().kind()
    }

    fn created_at(&self) -> SystemTime {
        self.inode().created_at()
    }

    fn size(&self) -> usize {
        self.inode().size()
    }
}
