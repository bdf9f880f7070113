//! Parallel build scheduler
//!
//! Partitions the build list into near-equal shards and runs one compile
//! worker per shard. Workers share nothing but a monotonic failure flag;
//! every shard runs to completion, and the aggregate outcome is read only
//! after the join barrier.

use std::sync::atomic::{AtomicBool, Ordering};

/// Split a build list into `workers` contiguous shards.
///
/// Shard sizes are `floor(len / workers)` with the remainder appended to
/// shard 0. A list smaller than the worker count becomes one shard so no
/// empty workers are spawned.
pub fn partition<'a>(build_list: &'a [String], workers: usize) -> Vec<&'a [String]> {
    if build_list.is_empty() {
        return Vec::new();
    }
    if workers <= 1 || build_list.len() < workers {
        return vec![build_list];
    }

    let chunk = build_list.len() / workers;
    let remainder = build_list.len() % workers;

    let mut shards = Vec::with_capacity(workers);
    let mut start = 0;
    for i in 0..workers {
        let size = if i == 0 { chunk + remainder } else { chunk };
        shards.push(&build_list[start..start + size]);
        start += size;
    }

    shards
}

/// Compile every build-list member, one worker per shard.
///
/// `compile` returns whether the invocation succeeded; any failure sets the
/// shared flag but aborts neither the worker's own shard nor its siblings.
/// With one worker the list runs sequentially in the caller. Returns true
/// when every member compiled.
pub fn run_build<F>(build_list: &[String], workers: usize, compile: F) -> bool
where
    F: Fn(&str) -> bool + Sync,
{
    if build_list.is_empty() {
        return true;
    }

    if workers <= 1 {
        let mut ok = true;
        for file in build_list {
            if !compile(file) {
                ok = false;
            }
        }
        return ok;
    }

    let failed = AtomicBool::new(false);
    let shards = partition(build_list, workers);

    rayon::scope(|scope| {
        for shard in shards {
            let failed = &failed;
            let compile = &compile;
            scope.spawn(move |_| {
                for file in shard {
                    if !compile(file) {
                        failed.store(true, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    // All workers have joined; the flag is stable now.
    !failed.load(Ordering::Relaxed)
}
