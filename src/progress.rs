//! Progress reporting for tree walks
//!
//! Provides real-time progress display using indicatif progress bars.

use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by walk visitors
#[derive(Debug)]
pub struct WalkProgress {
    pub dirs: AtomicU64,
    pub files: AtomicU64,
    pub symlinks: AtomicU64,
    pub bytes: AtomicU64,
    pub labeled: AtomicU64,
    pub errors: AtomicU64,
    start: Instant,
}

impl Default for WalkProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl WalkProgress {
    pub fn new() -> Self {
        Self {
            dirs: AtomicU64::new(0),
            files: AtomicU64::new(0),
            symlinks: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            labeled: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    /// Total objects seen
    pub fn entries(&self) -> u64 {
        self.dirs.load(Ordering::Relaxed)
            + self.files.load(Ordering::Relaxed)
            + self.symlinks.load(Ordering::Relaxed)
            + self.labeled.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Entries processed per second
    pub fn entries_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.entries() as f64 / secs
        } else {
            0.0
        }
    }
}

/// Progress reporter that displays walk status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        if let Ok(spinner) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &WalkProgress) {
        let bytes_str = format_size(progress.bytes.load(Ordering::Relaxed), BINARY);

        let labeled = progress.labeled.load(Ordering::Relaxed);

        let msg = if labeled > 0 {
            format!(
                "Labeled: {} | Rate: {:.0}/s | Errors: {}",
                format_number(labeled),
                progress.entries_per_second(),
                format_number(progress.errors.load(Ordering::Relaxed)),
            )
        } else {
            format!(
                "Dirs: {} | Files: {} | Size: {} | Rate: {:.0}/s | Errors: {}",
                format_number(progress.dirs.load(Ordering::Relaxed)),
                format_number(progress.files.load(Ordering::Relaxed)),
                bytes_str,
                progress.entries_per_second(),
                format_number(progress.errors.load(Ordering::Relaxed)),
            )
        };

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the walk results
pub fn print_summary(title: &str, progress: &WalkProgress, completed: bool) {
    let duration = progress.elapsed();
    let errors = progress.errors.load(Ordering::Relaxed);

    println!();
    if completed {
        println!("{}", style(title).green().bold());
    } else {
        println!("{}", style(title).yellow().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    let counters = [
        ("Directories:", &progress.dirs),
        ("Files:", &progress.files),
        ("Symlinks:", &progress.symlinks),
        ("Labeled:", &progress.labeled),
    ];
    for (name, counter) in counters {
        let n = counter.load(Ordering::Relaxed);
        if n > 0 {
            println!("  {} {}", style(name).bold(), format_number(n));
        }
    }
    let bytes = progress.bytes.load(Ordering::Relaxed);
    if bytes > 0 {
        println!("  {} {}", style("Total Size:").bold(), format_size(bytes, BINARY));
    }
    println!(
        "  {} {:.1}s ({:.0} entries/sec)",
        style("Duration:").bold(),
        duration.as_secs_f64(),
        progress.entries_per_second()
    );
    if errors > 0 {
        println!("  {} {}", style("Errors:").yellow().bold(), format_number(errors));
    }
    println!();
}

/// Print a header at the start of the walk
pub fn print_header(action: &str, root: &str, workers: usize) {
    println!();
    println!(
        "{} {}",
        style("selinux-relabel").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Action:").bold(), action);
    println!("  {} {}", style("Root:").bold(), root);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }

    #[test]
    fn test_walk_progress_entries() {
        let progress = WalkProgress::new();
        progress.dirs.fetch_add(2, Ordering::Relaxed);
        progress.files.fetch_add(5, Ordering::Relaxed);
        progress.symlinks.fetch_add(1, Ordering::Relaxed);
        progress.errors.fetch_add(3, Ordering::Relaxed);
        assert_eq!(progress.entries(), 8);
        assert!(progress.entries_per_second() >= 0.0);
    }
}
