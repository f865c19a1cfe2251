//! System Call Router
//!
//! The single entry point for syscalls. A call arrives as a name plus
//! loosely typed [`Arg`]s, is decoded into a typed [`Syscall`], and is
//! forwarded to the component that owns the operation. The router does no
//! validation of its own beyond decoding.
//!
//! # Integration Points
//! - Every dispatch raises the syscall interrupt line with the name as
//!   payload
//! - `KernelHandle::dispatch` executes the decoded call

pub mod numbers;

use std::fmt;

use thiserror::Error;

use crate::memory::{BlockId, MemoryInfo};
use crate::objects::{Pid, ProcessInfo};
use edukern_vfs::{DirEntry, Fd};

use numbers::*;

/// Router errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyscallError {
    #[error("Unknown syscall: {name}")]
    UnknownSyscall { name: String },

    #[error("{syscall}: missing argument '{arg}'")]
    MissingArgument { syscall: &'static str, arg: &'static str },

    #[error("{syscall}: invalid argument '{arg}'")]
    InvalidArgument { syscall: &'static str, arg: &'static str },
}

pub type Result<T> = core::result::Result<T, SyscallError>;

/// Untyped syscall argument
///
/// Integers are widened to `i128` so that every signed and unsigned
/// source value survives until the typed conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Int(i128),
    Str(String),
    Bytes(Vec<u8>),
}

macro_rules! arg_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::Int(v as i128)
            }
        })*
    };
}

arg_from_int!(i32, i64, u32, u64, usize);

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Str(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Str(v)
    }
}

impl From<&[u8]> for Arg {
    fn from(v: &[u8]) -> Self {
        Arg::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Arg {
    fn from(v: Vec<u8>) -> Self {
        Arg::Bytes(v)
    }
}

/// Decoded syscall
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Syscall {
    Open { path: String, mode: String },
    Read { fd: Fd, max_len: usize },
    Write { fd: Fd, data: Vec<u8> },
    Close { fd: Fd },
    Fork { parent: Pid },
    Exit { pid: Pid, code: i32 },
    Malloc { size: usize, owner: Option<Pid> },
    Free { block: BlockId },
    Ps,
    Ls { path: String },
    Meminfo,
}

struct Args<'a> {
    syscall: &'static str,
    args: &'a [Arg],
}

impl<'a> Args<'a> {
    fn get(&self, index: usize, arg: &'static str) -> Result<&'a Arg> {
        self.args.get(index).ok_or(SyscallError::MissingArgument {
            syscall: self.syscall,
            arg,
        })
    }

    fn invalid(&self, arg: &'static str) -> SyscallError {
        SyscallError::InvalidArgument {
            syscall: self.syscall,
            arg,
        }
    }

    fn int<T: TryFrom<i128>>(&self, index: usize, arg: &'static str) -> Result<T> {
        match self.get(index, arg)? {
            Arg::Int(v) => T::try_from(*v).map_err(|_| self.invalid(arg)),
            _ => Err(self.invalid(arg)),
        }
    }

    fn opt_int<T: TryFrom<i128>>(&self, index: usize, arg: &'static str) -> Result<Option<T>> {
        if index >= self.args.len() {
            return Ok(None);
        }
        self.int(index, arg).map(Some)
    }

    fn string(&self, index: usize, arg: &'static str) -> Result<String> {
        match self.get(index, arg)? {
            Arg::Str(s) => Ok(s.clone()),
            _ => Err(self.invalid(arg)),
        }
    }

    fn bytes(&self, index: usize, arg: &'static str) -> Result<Vec<u8>> {
        match self.get(index, arg)? {
            Arg::Str(s) => Ok(s.as_bytes().to_vec()),
            Arg::Bytes(b) => Ok(b.clone()),
            Arg::Int(_) => Err(self.invalid(arg)),
        }
    }
}

impl Syscall {
    /// Decode a named call
    ///
    /// # Errors
    /// `UnknownSyscall` for names outside the syscall table; missing or
    /// mistyped arguments otherwise
    pub fn from_name(name: &str, args: &[Arg]) -> Result<Self> {
        let syscall = ALL
            .iter()
            .copied()
            .find(|n| *n == name)
            .ok_or_else(|| SyscallError::UnknownSyscall {
                name: name.to_string(),
            })?;
        let a = Args { syscall, args };

        Ok(match syscall {
            SYS_OPEN => Syscall::Open {
                path: a.string(0, "path")?,
                mode: a.string(1, "mode")?,
            },
            SYS_READ => Syscall::Read {
                fd: a.int(0, "fd")?,
                max_len: a.int(1, "max_len")?,
            },
            SYS_WRITE => Syscall::Write {
                fd: a.int(0, "fd")?,
                data: a.bytes(1, "data")?,
            },
            SYS_CLOSE => Syscall::Close { fd: a.int(0, "fd")? },
            SYS_FORK => Syscall::Fork {
                parent: a.int(0, "parent_pid")?,
            },
            SYS_EXIT => Syscall::Exit {
                pid: a.int(0, "pid")?,
                code: a.opt_int(1, "code")?.unwrap_or(0),
            },
            SYS_MALLOC => Syscall::Malloc {
                size: a.int(0, "size")?,
                owner: a.opt_int(1, "owner_pid")?,
            },
            SYS_FREE => Syscall::Free {
                block: a.int(0, "block_id")?,
            },
            SYS_PS => Syscall::Ps,
            SYS_MEMINFO => Syscall::Meminfo,
            SYS_LS => Syscall::Ls {
                path: if args.is_empty() {
                    "/".to_string()
                } else {
                    a.string(0, "path")?
                },
            },
            _ => {
                return Err(SyscallError::UnknownSyscall {
                    name: name.to_string(),
                })
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Syscall::Open { .. } => SYS_OPEN,
            Syscall::Read { .. } => SYS_READ,
            Syscall::Write { .. } => SYS_WRITE,
            Syscall::Close { .. } => SYS_CLOSE,
            Syscall::Fork { .. } => SYS_FORK,
            Syscall::Exit { .. } => SYS_EXIT,
            Syscall::Malloc { .. } => SYS_MALLOC,
            Syscall::Free { .. } => SYS_FREE,
            Syscall::Ps => SYS_PS,
            Syscall::Ls { .. } => SYS_LS,
            Syscall::Meminfo => SYS_MEMINFO,
        }
    }
}

impl fmt::Display for Syscall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Syscall return value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyscallResult {
    Descriptor(Fd),
    Data(Vec<u8>),
    Written(usize),
    Flag(bool),
    Pid(Pid),
    Block(BlockId),
    Processes(Vec<ProcessInfo>),
    Entries(Vec<DirEntry>),
    MemInfo(MemoryInfo),
}

impl SyscallResult {
    pub fn descriptor(&self) -> Option<Fd> {
        match self {
            SyscallResult::Descriptor(fd) => Some(*fd),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&[u8]> {
        match self {
            SyscallResult::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn written(&self) -> Option<usize> {
        match self {
            SyscallResult::Written(n) => Some(*n),
            _ => None,
        }
    }

    pub fn flag(&self) -> Option<bool> {
        match self {
            SyscallResult::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn pid(&self) -> Option<Pid> {
        match self {
            SyscallResult::Pid(p) => Some(*p),
            _ => None,
        }
    }

    pub fn block(&self) -> Option<BlockId> {
        match self {
            SyscallResult::Block(b) => Some(*b),
            _ => None,
        }
    }

    pub fn processes(&self) -> Option<&[ProcessInfo]> {
        match self {
            SyscallResult::Processes(p) => Some(p),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&[DirEntry]> {
        match self {
            SyscallResult::Entries(e) => Some(e),
            _ => None,
        }
    }

    pub fn meminfo(&self) -> Option<MemoryInfo> {
        match self {
            SyscallResult::MemInfo(m) => Some(*m),
            _ => None,
        }
    }
}

/// Issue a named syscall with loosely typed arguments
///
/// ```rust,ignore
/// let fd = syscall!(k, "open", "/tmp/a", "w")?.descriptor();
/// ```
#[macro_export]
macro_rules! syscall {
    ($kernel:expr, $name:expr $(, $arg:expr)* $(,)?) => {
        $kernel.syscall($name, &[$($crate::syscall::Arg::from($arg)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_open() {
        let call = Syscall::from_name("open", &["/tmp/x".into(), "w".into()]).unwrap();
        assert_eq!(
            call,
            Syscall::Open {
                path: "/tmp/x".into(),
                mode: "w".into()
            }
        );
        assert_eq!(call.name(), SYS_OPEN);
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(
            Syscall::from_name("mmap", &[]),
            Err(SyscallError::UnknownSyscall { name: "mmap".into() })
        );
    }

    #[test]
    fn test_optional_arguments() {
        assert_eq!(
            Syscall::from_name("exit", &[4u32.into()]).unwrap(),
            Syscall::Exit { pid: 4, code: 0 }
        );
        assert_eq!(
            Syscall::from_name("malloc", &[100usize.into()]).unwrap(),
            Syscall::Malloc { size: 100, owner: None }
        );
        assert_eq!(
            Syscall::from_name("ls", &[]).unwrap(),
            Syscall::Ls { path: "/".into() }
        );
    }

    #[test]
    fn test_write_accepts_text_or_bytes() {
        let text = Syscall::from_name("write", &[3u32.into(), "hi".into()]).unwrap();
        let raw = Syscall::from_name("write", &[3u32.into(), b"hi".as_slice().into()]).unwrap();
        assert_eq!(text, raw);
    }

    #[test]
    fn test_bad_arguments() {
        assert_eq!(
            Syscall::from_name("read", &[3u32.into()]),
            Err(SyscallError::MissingArgument { syscall: "read", arg: "max_len" })
        );
        assert_eq!(
            Syscall::from_name("read", &[(-1i64).into(), 10u32.into()]),
            Err(SyscallError::InvalidArgument { syscall: "read", arg: "fd" })
        );
        assert_eq!(
            Syscall::from_name("open", &[7u32.into(), "r".into()]),
            Err(SyscallError::InvalidArgument { syscall: "open", arg: "path" })
        );
    }

    #[test]
    fn test_every_table_name_decodes() {
        assert_eq!(Syscall::from_name("meminfo", &[]).unwrap(), Syscall::Meminfo);
        for name in ALL {
            let decoded = Syscall::from_name(name, &[]);
            assert!(
                !matches!(decoded, Err(SyscallError::UnknownSyscall { .. })),
                "{} not decoded",
                name
            );
            if let Ok(call) = decoded {
                assert_eq!(call.name(), name);
            }
        }
    }

    #[test]
    fn test_large_unsigned_values_keep_their_magnitude() {
        assert_eq!(Arg::from(u64::MAX), Arg::Int(i128::from(u64::MAX)));
        assert_eq!(
            Syscall::from_name("free", &[u64::MAX.into()]).unwrap(),
            Syscall::Free { block: u64::MAX }
        );
        assert_eq!(
            Syscall::from_name("malloc", &[usize::MAX.into()]).unwrap(),
            Syscall::Malloc { size: usize::MAX, owner: None }
        );
        assert_eq!(
            Syscall::from_name("fork", &[u64::MAX.into()]),
            Err(SyscallError::InvalidArgument { syscall: "fork", arg: "parent_pid" })
        );
    }
}
