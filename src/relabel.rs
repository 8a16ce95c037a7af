//! Setting file labels, one path or a whole tree
//!
//! Recursive relabeling runs on the parallel walker: every visited object
//! gets the label, objects that vanish mid-walk are ignored and any other
//! failure stops the walk.

use crate::error::{Error, LabelError, LabelResult, Result, SetLabelError};
use crate::label::Context;
use crate::selinux::xattr;
use crate::walker::{walk_n, Entry, Visit};
use std::env;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

/// Paths that are never relabeled recursively
const EXCLUDED_PATHS: &[&str] = &[
    "/",
    "/bin",
    "/boot",
    "/dev",
    "/etc",
    "/etc/passwd",
    "/etc/shadow",
    "/home",
    "/lib",
    "/lib64",
    "/media",
    "/opt",
    "/proc",
    "/root",
    "/run",
    "/sbin",
    "/srv",
    "/sys",
    "/tmp",
    "/usr",
    "/var",
    "/var/lib",
    "/var/log",
];

/// Reads and writes file labels
pub trait FileLabeler: Send + Sync {
    fn file_label(&self, path: &Path) -> io::Result<String>;
    fn set_file_label(&self, path: &Path, label: &str) -> io::Result<()>;
}

/// Labels stored in the `security.selinux` xattr
#[derive(Debug, Clone, Copy, Default)]
pub struct XattrLabeler;

impl FileLabeler for XattrLabeler {
    fn file_label(&self, path: &Path) -> io::Result<String> {
        xattr::file_label(path)
    }

    fn set_file_label(&self, path: &Path, label: &str) -> io::Result<()> {
        xattr::set_file_label(path, label)
    }
}

/// Lexically normalize a path: `//a/./b/` becomes `/a/b` and `/a/b/..`
/// becomes `/a`. A `..` directly under the root is dropped; leading `..` of
/// a relative path is kept.
fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            _ => parts.push(component),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.into_iter().collect()
}

/// Refuse relabeling system directories and the user's home
pub fn check_relabel_allowed(path: &Path) -> LabelResult<()> {
    let cleaned = clean_path(path);
    let home = env::var_os("HOME").filter(|h| !h.is_empty()).map(PathBuf::from);

    let excluded = EXCLUDED_PATHS.iter().any(|p| cleaned == Path::new(p))
        || home.is_some_and(|h| cleaned == clean_path(&h));
    if excluded {
        return Err(LabelError::RelabelNotAllowed { path: cleaned });
    }
    Ok(())
}

/// Set `label` on `path`, and on everything below it when `recurse`.
///
/// An empty label is a no-op. Content under `/usr` is refused.
pub fn chcon<L>(labeler: &L, path: &Path, label: &str, recurse: bool, concurrency: usize) -> Result<()>
where
    L: FileLabeler + ?Sized,
{
    if path.as_os_str().is_empty() {
        return Err(crate::error::ConfigError::InvalidPath {
            path: PathBuf::new(),
            reason: "empty path".to_string(),
        }
        .into());
    }
    if label.is_empty() {
        return Ok(());
    }
    let cleaned = clean_path(path);
    if cleaned.starts_with("/usr") {
        return Err(LabelError::RelabelNotAllowed { path: cleaned }.into());
    }

    if !recurse {
        return labeler
            .set_file_label(path, label)
            .map_err(|source| set_label_error(path, label, source).into());
    }

    debug!(path = %path.display(), label, workers = concurrency, "Relabeling tree");
    walk_n(
        path,
        |p: &Path, _: Option<&Entry>, _: Option<&io::Error>| {
            trace!(path = %p.display(), "Setting label");
            match labeler.set_file_label(p, label) {
                Ok(()) => Visit::Continue,
                // Removed since it was listed
                Err(e) if e.kind() == io::ErrorKind::NotFound => Visit::Continue,
                Err(e) => Visit::abort(set_label_error(p, label, e)),
            }
        },
        concurrency,
    )
    .map_err(Error::from)
}

/// Recursively relabel `path` after refusing system paths.
///
/// With `shared` the label's level is replaced by `s0`.
pub fn relabel<L>(labeler: &L, path: &Path, label: &str, shared: bool, concurrency: usize) -> Result<()>
where
    L: FileLabeler + ?Sized,
{
    if label.is_empty() {
        return Ok(());
    }
    check_relabel_allowed(path)?;

    let label = if shared {
        Context::parse(label)?.with_level("s0").to_string()
    } else {
        label.to_string()
    };
    chcon(labeler, path, &label, true, concurrency)
}

fn set_label_error(path: &Path, label: &str, source: io::Error) -> SetLabelError {
    SetLabelError {
        path: path.to_path_buf(),
        label: label.to_string(),
        source,
    }
}
