//! Kernel-level error type
//!
//! Each component owns its error enum; `KernelError` wraps them so a
//! syscall caller handles one type, and `kind()` flattens everything into
//! the kernel's error taxonomy.

use thiserror::Error;

use crate::memory::MemoryError;
use crate::objects::ProcessError;
use crate::syscall::SyscallError;
use edukern_vfs::VfsError;

/// Error taxonomy shared by all components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    OutOfMemory,
    UnknownBlock,
    OutOfBounds,
    PathNotFound,
    FileNotFound,
    IsADirectory,
    BadDescriptor,
    WrongMode,
    InvalidMode,
    UnknownProcess,
    InvalidPriority,
    UnknownSyscall,
    InvalidArgument,
    NotRunning,
    AlreadyRunning,
    Config,
    Io,
}

/// Error returned by kernel operations and syscalls
#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Syscall(#[from] SyscallError),

    #[error("Kernel is not running")]
    NotRunning,

    #[error("Kernel is already running")]
    AlreadyRunning,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KernelError {
    /// Taxonomy entry for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::Memory(err) => match err {
                MemoryError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
                MemoryError::UnknownBlock { .. } => ErrorKind::UnknownBlock,
                MemoryError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            },
            KernelError::Vfs(err) => match err {
                VfsError::PathNotFound { .. } => ErrorKind::PathNotFound,
                VfsError::FileNotFound { .. } => ErrorKind::FileNotFound,
                VfsError::IsADirectory { .. } => ErrorKind::IsADirectory,
                VfsError::BadDescriptor { .. } => ErrorKind::BadDescriptor,
                VfsError::WrongMode { .. } => ErrorKind::WrongMode,
                VfsError::InvalidMode { .. } => ErrorKind::InvalidMode,
            },
            KernelError::Process(err) => match err {
                ProcessError::UnknownProcess { .. } => ErrorKind::UnknownProcess,
                ProcessError::InvalidPriority { .. } => ErrorKind::InvalidPriority,
            },
            KernelError::Syscall(err) => match err {
                SyscallError::UnknownSyscall { .. } => ErrorKind::UnknownSyscall,
                SyscallError::MissingArgument { .. } | SyscallError::InvalidArgument { .. } => {
                    ErrorKind::InvalidArgument
                }
            },
            KernelError::NotRunning => ErrorKind::NotRunning,
            KernelError::AlreadyRunning => ErrorKind::AlreadyRunning,
            KernelError::Config(_) => ErrorKind::Config,
            KernelError::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = core::result::Result<T, KernelError>;
