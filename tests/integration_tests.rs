//! Integration tests for selinux-relabel
//!
//! Trees are generated under a tempdir; nothing here needs SELinux to be
//! enabled.

use parking_lot::Mutex;
use selinux_relabel::error::WalkError;
use selinux_relabel::relabel::{chcon, FileLabeler};
use selinux_relabel::walker::{walk, walk_n, Entry, EntryType, Visit};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tempfile::tempdir;

/// Create `dirs` directories per level, `levels` deep, each holding
/// `files` regular files. Returns the number of objects created.
fn make_tree(root: &Path, levels: usize, dirs: usize, files: usize) -> usize {
    if levels == 0 {
        return 0;
    }
    let mut created = 0;
    for d in 0..dirs {
        let dir = root.join(format!("dir{}", d));
        fs::create_dir(&dir).unwrap();
        created += 1;
        for f in 0..files {
            fs::write(dir.join(format!("file{}", f)), b"data").unwrap();
            created += 1;
        }
        created += make_tree(&dir, levels - 1, dirs, files);
    }
    created
}

/// Visitor that records how often each path was seen
fn recording_walk(root: &Path, concurrency: usize) -> HashMap<PathBuf, usize> {
    let seen = Mutex::new(HashMap::new());
    walk_n(
        root,
        |path: &Path, _: Option<&Entry>, err: Option<&io::Error>| {
            assert!(err.is_none(), "unexpected error at {}", path.display());
            *seen.lock().entry(path.to_path_buf()).or_insert(0) += 1;
            Visit::Continue
        },
        concurrency,
    )
    .unwrap();
    seen.into_inner()
}

#[test]
fn test_every_object_visited_exactly_once() {
    let dir = tempdir().unwrap();
    let created = make_tree(dir.path(), 3, 4, 5);

    for concurrency in [1, 2, 4, 16, 256] {
        let seen = recording_walk(dir.path(), concurrency);
        assert_eq!(seen.len(), created + 1, "concurrency {}", concurrency);
        assert!(seen.values().all(|&n| n == 1), "concurrency {}", concurrency);
        assert_eq!(seen.get(dir.path()), Some(&1));
    }
}

#[test]
fn test_default_concurrency_walk() {
    let dir = tempdir().unwrap();
    let created = make_tree(dir.path(), 2, 3, 2);

    let count = AtomicUsize::new(0);
    walk(dir.path(), |_: &Path, _: Option<&Entry>, _: Option<&io::Error>| {
        count.fetch_add(1, Ordering::Relaxed);
        Visit::Continue
    })
    .unwrap();
    assert_eq!(count.load(Ordering::Relaxed), created + 1);
}

#[test]
fn test_abort_stops_walk_early() {
    let dir = tempdir().unwrap();
    let total = make_tree(dir.path(), 3, 6, 10) + 1;
    let abort_at = total.div_ceil(2);
    let concurrency = 4;

    let visits = AtomicUsize::new(0);
    let err = walk_n(
        dir.path(),
        |_: &Path, _: Option<&Entry>, _: Option<&io::Error>| {
            let n = visits.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= abort_at {
                Visit::abort(io::Error::other("stop walk"))
            } else {
                Visit::Continue
            }
        },
        concurrency,
    )
    .unwrap_err();

    // The visitor's own error comes back unchanged
    assert_eq!(err.to_string(), "stop walk");
    let inner = err.visitor_error().unwrap();
    assert!(inner.downcast_ref::<io::Error>().is_some());

    let visits = visits.load(Ordering::SeqCst);
    assert!(visits >= abort_at);
    // At most the items already in workers' hands finish after the abort
    assert!(visits < abort_at + concurrency, "visited {} of {}", visits, total);
    assert!(visits < total);
}

#[test]
fn test_walk_races_with_removal() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("racy");
    fs::create_dir(&root).unwrap();
    make_tree(&root, 4, 5, 6);

    let result = thread::scope(|s| {
        let remover = s.spawn(|| fs::remove_dir_all(&root));

        let result = walk_n(
            &root,
            |path: &Path, _: Option<&Entry>, err: Option<&io::Error>| {
                if let Some(e) = err {
                    if e.kind() != io::ErrorKind::NotFound {
                        return Visit::abort(io::Error::new(e.kind(), e.to_string()));
                    }
                    return Visit::Continue;
                }
                match fs::symlink_metadata(path) {
                    Ok(_) => Visit::Continue,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Visit::Continue,
                    Err(e) => Visit::abort(e),
                }
            },
            8,
        );

        remover.join().unwrap().unwrap();
        result
    });

    if let Err(e) = result {
        assert!(e.is_not_found(), "unexpected error: {}", e);
    }
    assert!(!root.exists());
}

#[test]
fn test_zero_concurrency_is_error() {
    let dir = tempdir().unwrap();
    make_tree(dir.path(), 1, 2, 2);

    let visits = AtomicUsize::new(0);
    let err = walk_n(
        dir.path(),
        |_: &Path, _: Option<&Entry>, _: Option<&io::Error>| {
            visits.fetch_add(1, Ordering::Relaxed);
            Visit::Continue
        },
        0,
    )
    .unwrap_err();

    assert!(matches!(err, WalkError::InvalidConcurrency { value: 0 }));
    assert_eq!(visits.load(Ordering::Relaxed), 0);
}

#[test]
fn test_missing_root() {
    let visits = AtomicUsize::new(0);
    let err = walk_n(
        "/path/does/not/exist",
        |_: &Path, _: Option<&Entry>, _: Option<&io::Error>| {
            visits.fetch_add(1, Ordering::Relaxed);
            Visit::Continue
        },
        4,
    )
    .unwrap_err();

    assert!(err.is_not_found());
    assert!(matches!(err, WalkError::Root { .. }));
    assert_eq!(visits.load(Ordering::Relaxed), 0);
}

#[test]
fn test_skip_subtree() {
    let dir = tempdir().unwrap();
    make_tree(dir.path(), 3, 2, 3);
    let skipped = dir.path().join("dir0");

    let seen = Mutex::new(Vec::new());
    walk_n(
        dir.path(),
        |path: &Path, entry: Option<&Entry>, _: Option<&io::Error>| {
            seen.lock().push(path.to_path_buf());
            if path == skipped && entry.is_some_and(|e| e.is_dir()) {
                Visit::SkipSubtree
            } else {
                Visit::Continue
            }
        },
        4,
    )
    .unwrap();

    let seen = seen.into_inner();
    assert!(seen.contains(&skipped));
    assert!(!seen.iter().any(|p| p != &skipped && p.starts_with(&skipped)));
    // Sibling subtree is complete: dir1, 3 files, 2 subdirs with 3 files
    // each, 2 leaf dirs each with 3 files, times 2
    let sibling = dir.path().join("dir1");
    let sibling_count = seen.iter().filter(|p| p.starts_with(&sibling)).count();
    assert_eq!(sibling_count, 1 + 3 + 2 * (1 + 3 + 2 * (1 + 3)));
}

#[test]
fn test_skip_subtree_on_file_is_ignored() {
    let dir = tempdir().unwrap();
    let created = make_tree(dir.path(), 2, 2, 2);

    let count = AtomicUsize::new(0);
    walk_n(
        dir.path(),
        |_: &Path, entry: Option<&Entry>, _: Option<&io::Error>| {
            count.fetch_add(1, Ordering::Relaxed);
            match entry {
                Some(e) if e.entry_type().is_file() => Visit::SkipSubtree,
                _ => Visit::Continue,
            }
        },
        3,
    )
    .unwrap();
    assert_eq!(count.load(Ordering::Relaxed), created + 1);
}

#[test]
fn test_symlinks_are_not_followed() {
    let outside = tempdir().unwrap();
    make_tree(outside.path(), 2, 2, 2);

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("regular"), b"x").unwrap();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

    let seen = Mutex::new(Vec::new());
    walk_n(
        dir.path(),
        |path: &Path, entry: Option<&Entry>, _: Option<&io::Error>| {
            let kind = entry.map(|e| e.entry_type());
            seen.lock().push((path.to_path_buf(), kind));
            Visit::Continue
        },
        2,
    )
    .unwrap();

    let seen = seen.into_inner();
    assert_eq!(seen.len(), 3);
    assert!(seen.contains(&(dir.path().join("link"), Some(EntryType::Symlink))));
    assert!(seen.contains(&(dir.path().join("regular"), Some(EntryType::File))));
}

#[test]
fn test_visitor_panic_becomes_error() {
    let dir = tempdir().unwrap();
    make_tree(dir.path(), 1, 1, 3);
    let target = dir.path().join("dir0").join("file1");

    let err = walk_n(
        dir.path(),
        |path: &Path, _: Option<&Entry>, _: Option<&io::Error>| {
            if path == target {
                panic!("visitor blew up");
            }
            Visit::Continue
        },
        2,
    )
    .unwrap_err();

    match err {
        WalkError::VisitorPanicked { path, message } => {
            assert_eq!(path, target);
            assert!(message.contains("visitor blew up"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_entry_depth() {
    let dir = tempdir().unwrap();
    make_tree(dir.path(), 3, 1, 1);

    let depths = Mutex::new(HashMap::new());
    walk_n(
        dir.path(),
        |path: &Path, entry: Option<&Entry>, _: Option<&io::Error>| {
            if let Some(e) = entry {
                depths.lock().insert(path.to_path_buf(), e.depth());
            }
            Visit::Continue
        },
        2,
    )
    .unwrap();

    let depths = depths.into_inner();
    assert_eq!(depths[dir.path()], 0);
    assert_eq!(depths[&dir.path().join("dir0")], 1);
    assert_eq!(depths[&dir.path().join("dir0/dir0/file0")], 3);
}

/// Labeler that only records what it was asked to do
#[derive(Default)]
struct RecordingLabeler {
    labels: Mutex<HashMap<PathBuf, String>>,
}

impl FileLabeler for RecordingLabeler {
    fn file_label(&self, path: &Path) -> io::Result<String> {
        self.labels
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn set_file_label(&self, path: &Path, label: &str) -> io::Result<()> {
        self.labels.lock().insert(path.to_path_buf(), label.to_string());
        Ok(())
    }
}

#[test]
fn test_recursive_chcon_labels_whole_tree() {
    let dir = tempdir().unwrap();
    let created = make_tree(dir.path(), 3, 3, 4);
    let labeler = RecordingLabeler::default();
    let label = "system_u:object_r:container_file_t:s0:c1,c2";

    chcon(&labeler, dir.path(), label, true, 8).unwrap();

    let labels = labeler.labels.into_inner();
    assert_eq!(labels.len(), created + 1);
    assert!(labels.values().all(|l| l == label));
}

#[test]
fn test_chcon_missing_root() {
    let labeler = RecordingLabeler::default();
    let err = chcon(
        &labeler,
        Path::new("/path/does/not/exist"),
        "u:r:t:s0",
        true,
        4,
    )
    .unwrap_err();

    match err {
        selinux_relabel::Error::Walk(e) => assert!(e.is_not_found()),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(labeler.labels.lock().is_empty());
}
