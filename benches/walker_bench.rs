//! Benchmarks for selinux-relabel
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use selinux_relabel::label::{Context, McsPool};
use selinux_relabel::walker::{walk_n, Entry, Visit};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

fn make_tree(root: &Path, levels: usize, dirs: usize, files: usize) {
    if levels == 0 {
        return;
    }
    for d in 0..dirs {
        let dir = root.join(format!("dir{}", d));
        fs::create_dir(&dir).unwrap();
        for f in 0..files {
            fs::write(dir.join(format!("file{}", f)), b"data").unwrap();
        }
        make_tree(&dir, levels - 1, dirs, files);
    }
}

fn benchmark_walk_concurrency(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    make_tree(dir.path(), 3, 8, 20);

    let mut group = c.benchmark_group("walk_empty_visitor");
    for concurrency in [1, 2, 4, 8, 32] {
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            &concurrency,
            |b, &n| {
                b.iter(|| {
                    walk_n(
                        dir.path(),
                        |_: &Path, _: Option<&Entry>, _: Option<&io::Error>| Visit::Continue,
                        n,
                    )
                    .unwrap()
                })
            },
        );
    }
    group.finish();

    let mut group = c.benchmark_group("walk_lstat_visitor");
    for concurrency in [1, 4, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            &concurrency,
            |b, &n| {
                b.iter(|| {
                    let bytes = AtomicU64::new(0);
                    walk_n(
                        dir.path(),
                        |path: &Path, _: Option<&Entry>, _: Option<&io::Error>| {
                            if let Ok(meta) = fs::symlink_metadata(path) {
                                bytes.fetch_add(meta.len(), Ordering::Relaxed);
                            }
                            Visit::Continue
                        },
                        n,
                    )
                    .unwrap();
                    black_box(bytes.load(Ordering::Relaxed))
                })
            },
        );
    }
    group.finish();
}

fn benchmark_labels(c: &mut Criterion) {
    c.bench_function("context_parse_display", |b| {
        b.iter(|| {
            let con = Context::parse(black_box("system_u:object_r:container_file_t:s0:c1,c2")).unwrap();
            black_box(con.with_level("s0").to_string())
        })
    });

    c.bench_function("mcs_allocate_release", |b| {
        let pool = McsPool::new();
        b.iter(|| {
            let level = pool.allocate(1024).unwrap();
            pool.release(&level);
        })
    });
}

criterion_group!(benches, benchmark_walk_concurrency, benchmark_labels);
criterion_main!(benches);
