//! External command programs
//!
//! Utilities such as `ls` or `cat` live outside the kernel and talk to it
//! only through a [`KernelHandle`]. The kernel never resolves programs by
//! name; a driver keeps its own registry and calls [`Program::run`].

use std::io::Write;

use crate::boot::KernelHandle;
use crate::error::Result;

/// How a program run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Exit(i32),
    /// The program handed control back without finishing
    Suspend,
}

/// A command program
pub trait Program: Send + Sync {
    /// Name the driver resolves
    fn name(&self) -> &str;

    /// One-line summary for listings
    fn description(&self) -> &str {
        ""
    }

    /// Run against a booted kernel
    ///
    /// # Arguments
    /// - `kernel`: Handle for syscalls
    /// - `args`: Arguments after the program name
    /// - `cwd`: Working directory for resolving relative paths
    /// - `out`: Standard output
    ///
    /// # Errors
    /// Any kernel error the program does not handle itself
    fn run(
        &self,
        kernel: &KernelHandle,
        args: &[String],
        cwd: &str,
        out: &mut dyn Write,
    ) -> Result<Completion>;
}
