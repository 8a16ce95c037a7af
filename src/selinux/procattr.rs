//! Process and thread security attributes under `/proc`

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Per-thread attribute files under `/proc/self/task/<tid>/attr/`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcAttr {
    Current,
    Exec,
    FsCreate,
    KeyCreate,
    SockCreate,
}

impl ProcAttr {
    /// File name inside the `attr` directory
    pub fn file_name(self) -> &'static str {
        match self {
            ProcAttr::Current => "current",
            ProcAttr::Exec => "exec",
            ProcAttr::FsCreate => "fscreate",
            ProcAttr::KeyCreate => "keycreate",
            ProcAttr::SockCreate => "sockcreate",
        }
    }
}

/// Kernel thread id of the caller
pub fn gettid() -> libc::pid_t {
    // SAFETY: gettid takes no arguments and cannot fail
    unsafe { libc::syscall(libc::SYS_gettid) as libc::pid_t }
}

/// Attribute path for the calling thread
pub fn thread_attr_path(proc_root: &Path, attr: ProcAttr) -> PathBuf {
    proc_root
        .join("self")
        .join("task")
        .join(gettid().to_string())
        .join("attr")
        .join(attr.file_name())
}

/// `current` attribute path for another process
pub fn pid_attr_path(proc_root: &Path, pid: u32) -> PathBuf {
    proc_root
        .join(pid.to_string())
        .join("attr")
        .join(ProcAttr::Current.file_name())
}

/// Read a context from an attribute file, dropping trailing NULs and
/// whitespace
pub fn read_con(path: &Path) -> io::Result<String> {
    let raw = fs::read(path)?;
    let text = String::from_utf8_lossy(&raw);
    Ok(text
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string())
}

/// Write a context to an existing attribute file.
///
/// An empty `label` issues a zero-length write, which resets the attribute
/// to the policy default.
pub fn write_con(path: &Path, label: &str) -> io::Result<()> {
    let mut out = OpenOptions::new().write(true).open(path)?;
    if label.is_empty() {
        let _ = out.write(&[])?;
    } else {
        out.write_all(label.as_bytes())?;
    }
    Ok(())
}
