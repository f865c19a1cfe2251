//! System call names
//!
//! The router accepts exactly this set; anything else is `UnknownSyscall`.

/// Open a file (path, mode) -> descriptor
pub const SYS_OPEN: &str = "open";

/// Read from a descriptor (fd, max_len) -> bytes
pub const SYS_READ: &str = "read";

/// Write to a descriptor (fd, data) -> bytes written
pub const SYS_WRITE: &str = "write";

/// Close a descriptor (fd) -> existed
pub const SYS_CLOSE: &str = "close";

/// Fork a process (parent_pid) -> child pid
pub const SYS_FORK: &str = "fork";

/// Terminate a process (pid, code = 0) -> was live
pub const SYS_EXIT: &str = "exit";

/// Allocate memory (size, owner_pid?) -> block id
pub const SYS_MALLOC: &str = "malloc";

/// Free memory (block_id) -> true
pub const SYS_FREE: &str = "free";

/// List processes
pub const SYS_PS: &str = "ps";

/// List a directory (path = "/")
pub const SYS_LS: &str = "ls";

/// Memory usage
pub const SYS_MEMINFO: &str = "meminfo";

pub const ALL: [&str; 11] = [
    SYS_OPEN, SYS_READ, SYS_WRITE, SYS_CLOSE, SYS_FORK, SYS_EXIT, SYS_MALLOC, SYS_FREE, SYS_PS,
    SYS_LS, SYS_MEMINFO,
];
