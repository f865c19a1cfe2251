//! Command programs
//!
//! Thin wrappers over syscalls, resolved by name from [`registry`].

use std::io::Write;

use edukern_kernel::vfs::{path, NodeKind};
use edukern_kernel::{syscall, Completion, KernelHandle, Program, Result};

/// Read size used by `cat`
const CHUNK: usize = 4096;

/// Every available program
pub fn registry() -> Vec<Box<dyn Program>> {
    vec![
        Box::new(Ls),
        Box::new(Ps),
        Box::new(Meminfo),
        Box::new(Mkdir),
        Box::new(Touch),
        Box::new(Cat),
    ]
}

pub fn find(name: &str) -> Option<Box<dyn Program>> {
    registry().into_iter().find(|p| p.name() == name)
}

pub struct Ls;

impl Program for Ls {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List a directory"
    }

    fn run(&self, k: &KernelHandle, args: &[String], cwd: &str, out: &mut dyn Write) -> Result<Completion> {
        let target = path::resolve(cwd, args.first().map_or(".", String::as_str));
        let listing = syscall!(k, "ls", target.as_str())?;
        for entry in listing.entries().unwrap_or_default() {
            match entry.kind {
                NodeKind::Directory => writeln!(out, "{}/", entry.name)?,
                NodeKind::File => writeln!(out, "{:<24} {:>8}", entry.name, entry.size)?,
            }
        }
        Ok(Completion::Exit(0))
    }
}

pub struct Ps;

impl Program for Ps {
    fn name(&self) -> &str {
        "ps"
    }

    fn description(&self) -> &str {
        "List processes"
    }

    fn run(&self, k: &KernelHandle, _args: &[String], _cwd: &str, out: &mut dyn Write) -> Result<Completion> {
        let ps = syscall!(k, "ps")?;
        writeln!(out, "{:>5} {:>5} {:>4} {:<11} {:>6} NAME", "PID", "PPID", "PRI", "STATE", "RUNS")?;
        for p in ps.processes().unwrap_or_default() {
            let parent = p.parent.map_or_else(|| "-".to_string(), |pid| pid.to_string());
            writeln!(
                out,
                "{:>5} {:>5} {:>4} {:<11} {:>6} {}",
                p.pid, parent, p.priority, p.state, p.run_count, p.name
            )?;
        }
        Ok(Completion::Exit(0))
    }
}

pub struct Meminfo;

impl Program for Meminfo {
    fn name(&self) -> &str {
        "meminfo"
    }

    fn description(&self) -> &str {
        "Show memory usage"
    }

    fn run(&self, k: &KernelHandle, _args: &[String], _cwd: &str, out: &mut dyn Write) -> Result<Completion> {
        let Some(info) = syscall!(k, "meminfo")?.meminfo() else {
            return Ok(Completion::Exit(1));
        };
        writeln!(out, "total: {} bytes ({} pages)", info.total, info.pages.total)?;
        writeln!(out, "used:  {} bytes ({} pages)", info.used, info.pages.used)?;
        writeln!(out, "free:  {} bytes ({} pages)", info.free, info.pages.free)?;
        Ok(Completion::Exit(0))
    }
}

pub struct Mkdir;

impl Program for Mkdir {
    fn name(&self) -> &str {
        "mkdir"
    }

    fn description(&self) -> &str {
        "Create directories"
    }

    fn run(&self, k: &KernelHandle, args: &[String], cwd: &str, out: &mut dyn Write) -> Result<Completion> {
        if args.is_empty() {
            writeln!(out, "usage: mkdir DIR...")?;
            return Ok(Completion::Exit(2));
        }
        for dir in args {
            k.mkdir(&path::resolve(cwd, dir))?;
        }
        Ok(Completion::Exit(0))
    }
}

pub struct Touch;

impl Program for Touch {
    fn name(&self) -> &str {
        "touch"
    }

    fn description(&self) -> &str {
        "Create empty files"
    }

    fn run(&self, k: &KernelHandle, args: &[String], cwd: &str, out: &mut dyn Write) -> Result<Completion> {
        if args.is_empty() {
            writeln!(out, "usage: touch FILE...")?;
            return Ok(Completion::Exit(2));
        }
        for file in args {
            let target = path::resolve(cwd, file);
            // Append mode creates a missing file and leaves an existing one intact
            let fd = syscall!(k, "open", target.as_str(), "a")?;
            if let Some(fd) = fd.descriptor() {
                syscall!(k, "close", fd)?;
            }
        }
        Ok(Completion::Exit(0))
    }
}

pub struct Cat;

impl Program for Cat {
    fn name(&self) -> &str {
        "cat"
    }

    fn description(&self) -> &str {
        "Print file contents"
    }

    fn run(&self, k: &KernelHandle, args: &[String], cwd: &str, out: &mut dyn Write) -> Result<Completion> {
        for file in args {
            let target = path::resolve(cwd, file);
            let Some(fd) = syscall!(k, "open", target.as_str(), "r")?.descriptor() else {
                continue;
            };
            loop {
                let chunk = syscall!(k, "read", fd, CHUNK)?;
                match chunk.data() {
                    Some(bytes) if !bytes.is_empty() => out.write_all(bytes)?,
                    _ => break,
                }
            }
            syscall!(k, "close", fd)?;
        }
        Ok(Completion::Exit(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edukern_kernel::{ErrorKind, Kernel, KernelConfig};

    fn booted() -> (Kernel, KernelHandle) {
        let mut config = KernelConfig::default();
        config.scheduler.autostart = false;
        config.fs.sync_env = None;
        let mut kernel = Kernel::new(config);
        let k = kernel.boot().unwrap();
        (kernel, k)
    }

    fn run(k: &KernelHandle, name: &str, args: &[&str], cwd: &str) -> (Completion, String) {
        let program = find(name).unwrap();
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let mut out: Vec<u8> = Vec::new();
        let done = program.run(k, &args, cwd, &mut out).unwrap();
        (done, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_registry_names_are_unique() {
        let mut names: Vec<String> = registry().iter().map(|p| p.name().to_string()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names, vec!["cat", "ls", "meminfo", "mkdir", "ps", "touch"]);
        assert!(find("vi").is_none());
    }

    #[test]
    fn test_mkdir_touch_ls_cat() {
        let (_kernel, k) = booted();

        run(&k, "mkdir", &["u/docs"], "/home");
        run(&k, "touch", &["notes.txt"], "/home/u");
        k.write_file("/home/u/hello.txt", b"hello\n").unwrap();

        let (_, listing) = run(&k, "ls", &[], "/home/u");
        let lines: Vec<&str> = listing.lines().map(str::trim_end).collect();
        assert_eq!(lines[0], "docs/");
        assert!(lines[1].starts_with("hello.txt") && lines[1].ends_with('6'));
        assert!(lines[2].starts_with("notes.txt") && lines[2].ends_with('0'));

        let (done, text) = run(&k, "cat", &["../hello.txt"], "/home/u/docs");
        assert_eq!(done, Completion::Exit(0));
        assert_eq!(text, "hello\n");
    }

    #[test]
    fn test_touch_keeps_content() {
        let (_kernel, k) = booted();
        k.write_file("/tmp/keep", b"data").unwrap();
        run(&k, "touch", &["/tmp/keep"], "/");
        assert_eq!(k.read_file("/tmp/keep").unwrap(), b"data");
    }

    #[test]
    fn test_ps_and_meminfo_output() {
        let (_kernel, k) = booted();
        let (_, ps) = run(&k, "ps", &[], "/");
        assert!(ps.lines().nth(1).unwrap().ends_with("init"));

        let (_, mem) = run(&k, "meminfo", &[], "/");
        assert!(mem.starts_with("total: 1048576 bytes (256 pages)"));
    }

    #[test]
    fn test_cat_missing_file_errors() {
        let (_kernel, k) = booted();
        let program = find("cat").unwrap();
        let err = program
            .run(&k, &["/tmp/none".to_string()], "/", &mut Vec::<u8>::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn test_usage_exit_codes() {
        let (_kernel, k) = booted();
        assert_eq!(run(&k, "mkdir", &[], "/").0, Completion::Exit(2));
        assert_eq!(run(&k, "touch", &[], "/").0, Completion::Exit(2));
    }
}
