//! Command-line exerciser for the skip-list map
//!
//! Seeds a map from several inserter threads over disjoint key ranges,
//! optionally races remover threads against them, and reports the sizes
//! observed once everything has joined.

use clap::Parser;
use log::info;
use skipjack_core::{SkipListConfig, DEFAULT_MAX_HEIGHT, DEFAULT_PROBABILITY};
use skipjack_map::SkipListMap;
use std::io;
use std::sync::Arc;
use std::thread;

#[derive(Parser, Debug)]
#[command(about = "Exercise the lock-free skip-list map from many threads")]
struct Args {
    /// Number of inserter threads
    #[arg(long, default_value_t = 4)]
    threads: u64,

    /// Keys inserted by each thread (the ranges are disjoint)
    #[arg(long, default_value_t = 10_000)]
    inserts: u64,

    /// Number of remover threads racing the inserters over the even keys
    #[arg(long, default_value_t = 0)]
    removers: u64,

    /// Maximum tower height
    #[arg(long, default_value_t = DEFAULT_MAX_HEIGHT)]
    max_height: usize,

    /// Per-level growth probability
    #[arg(long, default_value_t = DEFAULT_PROBABILITY)]
    probability: f64,

    /// Print every node (including logically deleted ones) after the run
    #[arg(long)]
    dump: bool,
}

fn main() -> skipjack_core::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = SkipListConfig {
        max_height: args.max_height,
        probability: args.probability,
    };
    let map: Arc<SkipListMap<u64, u64>> = Arc::new(SkipListMap::with_config(config)?);
    let total = args.threads * args.inserts;

    info!(
        "spawning {} inserters ({} keys each) and {} removers",
        args.threads, args.inserts, args.removers
    );

    let mut inserter_handles = vec![];
    for thread_id in 0..args.threads {
        let map = Arc::clone(&map);
        let inserts = args.inserts;
        inserter_handles.push(thread::spawn(move || {
            let start = thread_id * inserts;
            for key in start..start + inserts {
                map.insert(key, key);
            }
        }));
    }

    let mut remover_handles = vec![];
    for remover_id in 0..args.removers {
        let map = Arc::clone(&map);
        let stride = args.removers;
        remover_handles.push(thread::spawn(move || {
            let mut removed = 0u64;
            // Each remover owns a residue class of the even keys; a remove
            // that outruns the matching insert just fails.
            for key in (remover_id * 2..total).step_by((stride * 2) as usize) {
                if map.remove(&key) {
                    removed += 1;
                }
            }
            removed
        }));
    }

    for handle in inserter_handles {
        handle.join().expect("inserter thread panicked");
    }
    let removed: u64 = remover_handles
        .into_iter()
        .map(|h| h.join().expect("remover thread panicked"))
        .sum();

    let size = map.len() as u64;
    info!("inserted {total}, removed {removed}, expected size {}", total - removed);
    println!("size: {size}");

    if args.dump {
        map.dump(&mut io::stdout().lock())?;
    }
    Ok(())
}
