//! Traversal producer - sequential depth-first descent
//!
//! Listing a directory is inherently sequential, so a single producer
//! thread does all `readdir` work and hands every discovered object to the
//! worker pool. Children of a directory are all enqueued before any child
//! directory is descended into; a child directory is only listed after its
//! own item has been visited and the visitor did not skip it.

use crate::error::WalkError;
use crate::walker::entry::{Entry, EntryType};
use crate::walker::latch::AbortLatch;
use crate::walker::queue::{await_verdict, Verdict, WorkItem, WorkQueueSender};
use crossbeam_channel::Receiver;
use std::ffi::OsStr;
use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// The walk root, opened before any thread is started
#[derive(Debug)]
pub struct Root {
    path: PathBuf,
    entry: Entry,
    listing: Option<ReadDir>,
}

impl Root {
    /// Stat the root and, for a directory, open its listing.
    ///
    /// Any failure here is fatal for the walk.
    pub fn open(path: &Path) -> Result<Self, WalkError> {
        let root_err = |source| WalkError::Root {
            path: path.to_path_buf(),
            source,
        };

        let meta = fs::symlink_metadata(path).map_err(root_err)?;
        let name = path.file_name().unwrap_or_else(|| path.as_os_str());
        let entry = Entry::root(name, &meta);

        let listing = if entry.is_dir() {
            Some(fs::read_dir(path).map_err(root_err)?)
        } else {
            None
        };

        Ok(Self {
            path: path.to_path_buf(),
            entry,
            listing,
        })
    }
}

/// Counters reported when the producer finishes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProducerStats {
    /// Items handed to the queue
    pub produced: u64,

    /// Directories listed
    pub dirs_listed: u64,

    /// Directories not descended into because the visitor skipped them
    pub dirs_skipped: u64,

    /// Listing or type-lookup failures forwarded to the visitor
    pub errors: u64,

    /// Whether the producer stopped early because of an abort
    pub aborted: bool,
}

/// A directory waiting to be listed
struct PendingDir {
    path: PathBuf,
    depth: u32,
    verdict: Option<Receiver<Verdict>>,
    listing: Option<ReadDir>,
}

/// Single-threaded producer feeding the work queue
pub struct Producer<'a> {
    queue: WorkQueueSender,
    latch: &'a AbortLatch,
    stats: ProducerStats,
}

/// Returned when the walk is shutting down
struct Stop;

impl<'a> Producer<'a> {
    /// Create a producer over the given queue
    pub fn new(queue: WorkQueueSender, latch: &'a AbortLatch) -> Self {
        Self {
            queue,
            latch,
            stats: ProducerStats::default(),
        }
    }

    /// Walk the tree below `root`, enqueueing one item per object.
    ///
    /// Dropping the queue sender on return is what lets idle workers exit.
    pub fn run(mut self, root: Root) -> ProducerStats {
        if self.produce(root).is_err() {
            self.stats.aborted = true;
        }

        debug!(
            produced = self.stats.produced,
            dirs = self.stats.dirs_listed,
            skipped = self.stats.dirs_skipped,
            errors = self.stats.errors,
            aborted = self.stats.aborted,
            "Producer finished"
        );
        self.stats
    }

    fn produce(&mut self, root: Root) -> Result<(), Stop> {
        let Root {
            path,
            entry,
            listing,
        } = root;

        let mut stack = Vec::new();

        if entry.is_dir() {
            let (item, verdict) = WorkItem::new(path.clone(), entry).with_verdict();
            self.emit(item)?;
            stack.push(PendingDir {
                path,
                depth: 0,
                verdict: Some(verdict),
                listing,
            });
        } else {
            self.emit(WorkItem::new(path, entry))?;
        }

        while let Some(mut dir) = stack.pop() {
            if self.latch.is_set() {
                return Err(Stop);
            }

            if let Some(verdict) = dir.verdict.take() {
                match await_verdict(&verdict, self.latch) {
                    Some(Verdict::Descend) => {}
                    Some(Verdict::Skip) => {
                        self.stats.dirs_skipped += 1;
                        trace!(path = %dir.path.display(), "Subtree skipped");
                        continue;
                    }
                    None => return Err(Stop),
                }
            }

            let listing = match dir.listing.take() {
                Some(listing) => listing,
                None => match fs::read_dir(&dir.path) {
                    Ok(listing) => listing,
                    Err(e) => {
                        // Typically a race with external removal or a permission
                        // change; the visitor decides what it means.
                        self.stats.errors += 1;
                        debug!(path = %dir.path.display(), error = %e, "Failed to list directory");
                        let name = dir.path.file_name().unwrap_or_else(|| OsStr::new(""));
                        let partial = Entry::partial(name, EntryType::Directory, dir.depth);
                        self.emit(WorkItem::failed(dir.path, Some(partial), e))?;
                        continue;
                    }
                },
            };
            self.stats.dirs_listed += 1;

            let subdirs = self.list_children(&dir.path, dir.depth + 1, listing)?;

            // Reverse so the first child directory is descended into first
            stack.extend(subdirs.into_iter().rev());
        }

        Ok(())
    }

    /// Enqueue every child of one directory, returning the subdirectories
    fn list_children(
        &mut self,
        dir_path: &Path,
        depth: u32,
        listing: ReadDir,
    ) -> Result<Vec<PendingDir>, Stop> {
        let mut subdirs = Vec::new();

        for dirent in listing {
            let dirent = match dirent {
                Ok(d) => d,
                Err(e) => {
                    // readdir itself failed mid-listing; the rest is unreliable
                    self.stats.errors += 1;
                    self.emit(WorkItem::failed(dir_path.to_path_buf(), None, e))?;
                    break;
                }
            };

            let path = dirent.path();
            let entry_type = match dirent.file_type() {
                Ok(ft) => EntryType::from_file_type(ft),
                Err(e) => {
                    self.stats.errors += 1;
                    let partial = Entry::partial(&dirent.file_name(), EntryType::Unknown, depth);
                    self.emit(WorkItem::failed(path, Some(partial), e))?;
                    continue;
                }
            };

            let entry = Entry::from_dir_entry(&dirent, entry_type, depth);
            if entry_type.is_dir() {
                let (item, verdict) = WorkItem::new(path.clone(), entry).with_verdict();
                self.emit(item)?;
                subdirs.push(PendingDir {
                    path,
                    depth,
                    verdict: Some(verdict),
                    listing: None,
                });
            } else {
                self.emit(WorkItem::new(path, entry))?;
            }
        }

        Ok(subdirs)
    }

    fn emit(&mut self, item: WorkItem) -> Result<(), Stop> {
        self.queue.send(item, self.latch).map_err(|_| Stop)?;
        self.stats.produced += 1;
        if self.latch.is_set() {
            return Err(Stop);
        }
        Ok(())
    }
}
