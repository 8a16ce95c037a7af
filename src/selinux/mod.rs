//! SELinux system state
//!
//! [`Selinux`] is an explicit handle over the kernel interfaces
//! (`/proc`, selinuxfs, the `/etc/selinux` configuration). Expensive lookups
//! such as the selinuxfs mount point are computed once per handle.

pub mod conf;
pub mod procattr;
pub mod xattr;

pub use procattr::ProcAttr;
pub use xattr::{file_label, set_file_label, XATTR_NAME};

use crate::error::{LabelResult, Result};
use crate::label::mcs::DEFAULT_CATEGORY_RANGE;
use crate::label::{apply_label_options, Context, LabelOptions, McsPool};
use crate::relabel::{self, XattrLabeler};
use crate::walker::default_concurrency;
use parking_lot::Mutex;
use std::ffi::CString;
use std::fmt;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Default SELinux configuration directory
pub const DEFAULT_CONFIG_DIR: &str = "/etc/selinux";

/// Default procfs mount point
pub const DEFAULT_PROC_ROOT: &str = "/proc";

const SELINUX_TAG: &str = "SELINUX";
const SELINUX_TYPE_TAG: &str = "SELINUXTYPE";

/// Filesystem roots used by a [`Selinux`] handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelinuxConfig {
    /// Directory holding `config` and the policy trees
    pub config_dir: PathBuf,
    /// procfs mount point
    pub proc_root: PathBuf,
    /// Use this selinuxfs mount instead of scanning mountinfo
    pub selinuxfs: Option<PathBuf>,
}

impl Default for SelinuxConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            selinuxfs: None,
        }
    }
}

impl SelinuxConfig {
    /// Path of the main `config` file
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config")
    }
}

/// SELinux enforcement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EnforceMode {
    Disabled = -1,
    Permissive = 0,
    Enforcing = 1,
}

impl EnforceMode {
    /// Map the kernel's numeric value
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => EnforceMode::Enforcing,
            0 => EnforceMode::Permissive,
            _ => EnforceMode::Disabled,
        }
    }

    /// Name as used in the `SELINUX=` setting
    pub fn as_str(self) -> &'static str {
        match self {
            EnforceMode::Enforcing => "enforcing",
            EnforceMode::Permissive => "permissive",
            EnforceMode::Disabled => "disabled",
        }
    }
}

impl fmt::Display for EnforceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels for a new container from `lxc_contexts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLabels {
    pub process: String,
    pub file: String,
    pub ro_file: String,
}

/// Handle over the SELinux state of this system
#[derive(Debug)]
pub struct Selinux {
    config: SelinuxConfig,
    enabled: Mutex<Option<bool>>,
    selinuxfs: OnceLock<Option<PathBuf>>,
    mcs: McsPool,
}

impl Selinux {
    /// Create a handle over the given filesystem roots
    pub fn new(config: SelinuxConfig) -> Self {
        Self {
            config,
            enabled: Mutex::new(None),
            selinuxfs: OnceLock::new(),
            mcs: McsPool::new(),
        }
    }

    /// Handle over the real system paths
    pub fn system() -> Self {
        Self::new(SelinuxConfig::default())
    }

    pub fn config(&self) -> &SelinuxConfig {
        &self.config
    }

    /// MCS levels handed out through this handle
    pub fn mcs_pool(&self) -> &McsPool {
        &self.mcs
    }

    /// Check if SELinux is enabled; computed once, then cached
    pub fn is_enabled(&self) -> bool {
        let mut enabled = self.enabled.lock();
        if let Some(value) = *enabled {
            return value;
        }

        let value = self.selinuxfs().is_some()
            && self.current_label().map_or(true, |label| label != "kernel");
        debug!(enabled = value, "Detected SELinux state");
        *enabled = Some(value);
        value
    }

    /// Force the enabled flag
    pub fn set_enabled(&self, value: bool) {
        *self.enabled.lock() = Some(value);
    }

    /// Treat SELinux as disabled for this handle
    pub fn set_disabled(&self) {
        self.set_enabled(false);
    }

    /// Mount point of a writable selinuxfs, if any
    pub fn selinuxfs(&self) -> Option<&Path> {
        self.selinuxfs
            .get_or_init(|| match &self.config.selinuxfs {
                Some(path) => Some(path.clone()),
                None => self.find_selinuxfs(),
            })
            .as_deref()
    }

    fn find_selinuxfs(&self) -> Option<PathBuf> {
        let mountinfo = self.config.proc_root.join("self").join("mountinfo");
        let contents = fs::read_to_string(&mountinfo).ok()?;
        selinuxfs_mounts(&contents)
            .into_iter()
            .find(|mnt| !is_read_only(mnt))
    }

    // Process attributes

    /// Label of the calling thread
    pub fn current_label(&self) -> io::Result<String> {
        self.read_attr(ProcAttr::Current)
    }

    /// Label of process `pid`
    pub fn pid_label(&self, pid: u32) -> io::Result<String> {
        procattr::read_con(&procattr::pid_attr_path(&self.config.proc_root, pid))
    }

    /// Label the next exec'd program will run with
    pub fn exec_label(&self) -> io::Result<String> {
        self.read_attr(ProcAttr::Exec)
    }

    pub fn set_exec_label(&self, label: &str) -> io::Result<()> {
        self.write_attr(ProcAttr::Exec, label)
    }

    /// Label for files this thread creates
    pub fn fs_create_label(&self) -> io::Result<String> {
        self.read_attr(ProcAttr::FsCreate)
    }

    pub fn set_fs_create_label(&self, label: &str) -> io::Result<()> {
        self.write_attr(ProcAttr::FsCreate, label)
    }

    /// Label for kernel keyrings this thread creates
    pub fn key_label(&self) -> io::Result<String> {
        self.read_attr(ProcAttr::KeyCreate)
    }

    pub fn set_key_label(&self, label: &str) -> io::Result<()> {
        self.write_attr(ProcAttr::KeyCreate, label)
    }

    /// Label for sockets this thread creates
    pub fn socket_label(&self) -> io::Result<String> {
        self.read_attr(ProcAttr::SockCreate)
    }

    pub fn set_socket_label(&self, label: &str) -> io::Result<()> {
        self.write_attr(ProcAttr::SockCreate, label)
    }

    fn read_attr(&self, attr: ProcAttr) -> io::Result<String> {
        procattr::read_con(&procattr::thread_attr_path(&self.config.proc_root, attr))
    }

    fn write_attr(&self, attr: ProcAttr, label: &str) -> io::Result<()> {
        procattr::write_con(&procattr::thread_attr_path(&self.config.proc_root, attr), label)
    }

    // Enforcement

    /// Current enforcement mode; Disabled when it cannot be read
    pub fn enforce_mode(&self) -> EnforceMode {
        self.selinuxfs()
            .and_then(|fs_root| fs::read_to_string(fs_root.join("enforce")).ok())
            .and_then(|v| v.trim().parse::<i32>().ok())
            .map_or(EnforceMode::Disabled, EnforceMode::from_i32)
    }

    /// Switch between enforcing and permissive
    pub fn set_enforce_mode(&self, mode: EnforceMode) -> io::Result<()> {
        if mode == EnforceMode::Disabled {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "SELinux cannot be disabled at runtime",
            ));
        }
        let enforce = self.selinuxfs_file("enforce")?;
        fs::write(enforce, (mode as i32).to_string())
    }

    /// Mode configured by `SELINUX=` for the next boot
    pub fn default_enforce_mode(&self) -> EnforceMode {
        match conf::lookup(&self.config.config_file(), SELINUX_TAG).as_deref() {
            Some("enforcing") => EnforceMode::Enforcing,
            Some("permissive") => EnforceMode::Permissive,
            _ => EnforceMode::Disabled,
        }
    }

    /// Directory of the configured policy (`SELINUXTYPE=`)
    pub fn policy_root(&self) -> PathBuf {
        match conf::lookup(&self.config.config_file(), SELINUX_TYPE_TAG) {
            Some(policy) => self.config.config_dir.join(policy),
            None => self.config.config_dir.clone(),
        }
    }

    /// Ask the kernel whether `label` is a valid context
    pub fn check_context(&self, label: &str) -> io::Result<()> {
        let context = self.selinuxfs_file("context")?;
        procattr::write_con(&context, label)
    }

    fn selinuxfs_file(&self, name: &str) -> io::Result<PathBuf> {
        self.selinuxfs()
            .map(|root| root.join(name))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "selinuxfs is not mounted"))
    }

    // Container labels

    fn lxc_contexts(&self) -> Option<Vec<(String, String)>> {
        let path = self.policy_root().join("contexts").join("lxc_contexts");
        match conf::read_assignments(&path) {
            Ok(kvs) => Some(kvs),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cannot read lxc_contexts");
                None
            }
        }
    }

    /// Process and file labels for a new container, with a fresh MCS level
    /// reserved in this handle's pool
    pub fn container_labels(&self) -> Option<ContainerLabels> {
        if !self.is_enabled() {
            return None;
        }

        let kvs = self.lxc_contexts()?;
        let get = |key: &str| kvs.iter().find_map(|(k, v)| (k == key).then(|| v.clone()));

        let process = get("process")?;
        let file = get("file")?;
        let ro_file = get("ro_file").unwrap_or_else(|| file.clone());

        let pcon = Context::parse(&process).ok()?;
        if !pcon.has_level() {
            return Some(ContainerLabels {
                process,
                file,
                ro_file,
            });
        }

        let level = match self.mcs.allocate(DEFAULT_CATEGORY_RANGE) {
            Ok(level) => level,
            Err(e) => {
                warn!(error = %e, "Cannot allocate MCS level");
                return None;
            }
        };
        let fcon = Context::parse(&file).ok()?;

        Some(ContainerLabels {
            process: pcon.with_level(level.as_str()).to_string(),
            file: fcon.with_level(level).to_string(),
            ro_file,
        })
    }

    /// Read-only mount label from `lxc_contexts`
    pub fn ro_mount_label(&self) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let kvs = self.lxc_contexts()?;
        kvs.into_iter()
            .find_map(|(k, v)| (k == "ro_file").then_some(v))
    }

    /// Process and mount labels for a container started with `options`.
    ///
    /// Empty strings mean "leave unlabeled". `disable` yields no process
    /// label and the shared privileged mount label.
    pub fn init_labels<S>(&self, options: &[S]) -> LabelResult<(String, String)>
    where
        S: AsRef<str>,
    {
        let Some(labels) = self.container_labels() else {
            return Ok((String::new(), String::new()));
        };

        let applied = Context::parse(&labels.process).and_then(|pcon| {
            let mcon = Context::parse(&labels.file)?;
            apply_label_options(&pcon, &mcon, options).map(|out| (pcon, out))
        });

        match applied {
            Ok((_, LabelOptions::Disabled)) => {
                self.release_label(&labels.file);
                Ok((String::new(), self.priv_container_mount_label()))
            }
            Ok((pcon, LabelOptions::Labels { process, mount })) => {
                if process != pcon {
                    if process.level != pcon.level {
                        self.release_label(&labels.process);
                    }
                    self.reserve_label(&process.to_string());
                }
                Ok((process.to_string(), mount.to_string()))
            }
            Err(e) => {
                self.release_label(&labels.file);
                Err(e)
            }
        }
    }

    fn priv_container_mount_label(&self) -> String {
        self.lxc_contexts()
            .and_then(|kvs| kvs.into_iter().find_map(|(k, v)| (k == "file").then_some(v)))
            .unwrap_or_default()
    }

    /// Give `dest` the level of `src`, moving the reservation with it
    pub fn copy_level(&self, src: &str, dest: &str) -> LabelResult<String> {
        if src.is_empty() {
            return Ok(String::new());
        }
        let scon = Context::parse(src)?;
        let tcon = Context::parse(dest)?;

        self.mcs.release(&tcon.level);
        // Already held by src's owner
        let _ = self.mcs.reserve(&scon.level);

        Ok(tcon.with_level(scon.level).to_string())
    }

    /// Mark the level of `label` as in use
    pub fn reserve_label(&self, label: &str) {
        if let Some(level) = label_level(label) {
            let _ = self.mcs.reserve(level);
        }
    }

    /// Return the level of `label` to the pool
    pub fn release_label(&self, label: &str) {
        if let Some(level) = label_level(label) {
            self.mcs.release(level);
        }
    }

    // Relabeling

    /// Recursively relabel `path` for container use.
    ///
    /// No-op when SELinux is disabled or `label` is empty. With `shared`
    /// the level is reset to `s0` so every container can use the content.
    pub fn relabel(&self, path: &Path, label: &str, shared: bool) -> Result<()> {
        if !self.is_enabled() || label.is_empty() {
            return Ok(());
        }
        relabel::relabel(&XattrLabeler, path, label, shared, default_concurrency())
    }
}

/// Level field of a raw label string, if it has one
fn label_level(label: &str) -> Option<&str> {
    label.splitn(4, ':').nth(3).filter(|level| !level.is_empty())
}

/// selinuxfs mount points listed in a mountinfo file, in order
pub fn selinuxfs_mounts(mountinfo: &str) -> Vec<PathBuf> {
    mountinfo
        .lines()
        .filter_map(|line| {
            let (mount, fs_info) = line.split_once(" - ")?;
            if !fs_info.split_whitespace().next().is_some_and(|t| t == "selinuxfs") {
                return None;
            }
            mount.split_whitespace().nth(4).map(PathBuf::from)
        })
        .collect()
}

fn is_read_only(path: &Path) -> bool {
    let Ok(cpath) = CString::new(path.as_os_str().as_bytes()) else {
        return true;
    };
    // SAFETY: statvfs is plain data and is fully written on success
    let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::statvfs(cpath.as_ptr(), &mut st) };
    ret != 0 || st.f_flag & libc::ST_RDONLY != 0
}
