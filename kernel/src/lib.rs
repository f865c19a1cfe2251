//! EduKern Kernel
//!
//! An in-memory teaching kernel: cooperative processes, a page allocator, a
//! virtual file system with host overlays, and a serialized interrupt
//! dispatcher, all reached through one syscall router.
//!
//! # Architecture
//!
//! The kernel is organized into the following modules:
//! - `boot`: Kernel context, boot sequence and shutdown
//! - `config`: TOML / environment configuration
//! - `memory`: Page allocator
//! - `objects`: Process records and the process table
//! - `scheduler`: Ready queue, run-to-completion ticks, periodic timer
//! - `interrupts`: Serialized interrupt dispatcher
//! - `syscall`: Syscall router
//! - `program`: Plugin interface for external command programs
//! - `debug`: Feature-gated trace macros
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut kernel = Kernel::new(KernelConfig::default());
//! let k = kernel.boot()?;
//!
//! k.mkdir("/home/u")?;
//! if let Some(fd) = syscall!(k, "open", "/home/u/f.txt", "w")?.descriptor() {
//!     syscall!(k, "write", fd, "hello")?;
//! }
//!
//! kernel.shutdown();
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod boot;
pub mod config;
pub mod debug;
pub mod error;
pub mod interrupts;
pub mod memory;
pub mod objects;
pub mod program;
pub mod scheduler;
pub mod syscall;

pub use boot::{Kernel, KernelHandle};
pub use config::KernelConfig;
pub use error::{ErrorKind, KernelError, Result};
pub use interrupts::{Interrupt, InterruptController, Line};
pub use memory::{BlockId, MemoryError, MemoryInfo, PageAllocator};
pub use objects::{
    Pid, Priority, ProcessContext, ProcessError, ProcessInfo, ProcessState, WorkError, WorkResult,
    DEFAULT_PRIORITY,
};
pub use program::{Completion, Program};
pub use scheduler::{SchedulingPolicy, TickReport};
pub use syscall::{Arg, Syscall, SyscallError, SyscallResult};

pub use edukern_vfs as vfs;

/// Lock a kernel mutex, recovering the data if a holder panicked
///
/// Process work and interrupt handlers run under `catch_unwind`, so a
/// poisoned lock only means a fault was already contained.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
