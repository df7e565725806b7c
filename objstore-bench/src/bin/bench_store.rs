//! Dependency-free throughput benchmark for put/get/eviction, in the
//! style of this crate's sibling engine's own bench binary: no
//! criterion, just wall-clock timing and a hand-rolled PRNG so the
//! binary has nothing to fetch beyond the workspace itself.

use std::time::Instant;

use anyhow::Result;
use objstore_core::{Blob, ObjectId, Store, OBJECT_ID_LEN};

struct BenchConfig {
    num_objects: usize,
    blob_size: usize,
    max_bytes: u64,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut num_objects = 20_000usize;
        let mut blob_size = 256usize;
        let mut max_bytes: u64 = 64 * 1024 * 1024;

        let mut args = std::env::args().skip(1);
        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--objects" => {
                    if let Some(v) = args.next() {
                        num_objects = v.parse().unwrap_or(num_objects);
                    }
                }
                "--blob-size" => {
                    if let Some(v) = args.next() {
                        blob_size = v.parse().unwrap_or(blob_size);
                    }
                }
                "--max-bytes" => {
                    if let Some(v) = args.next() {
                        max_bytes = v.parse().unwrap_or(max_bytes);
                    }
                }
                other => eprintln!("ignoring unknown flag: {other}"),
            }
        }

        Self {
            num_objects,
            blob_size,
            max_bytes,
        }
    }
}

/// A tiny, fast, non-cryptographic PRNG — good enough to fill
/// benchmark payloads without pulling in `rand`.
struct XorShift64(u64);

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self(seed | 1)
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

fn build_ids(n: usize) -> Vec<ObjectId> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let mut bytes = [0u8; OBJECT_ID_LEN];
        bytes[..8].copy_from_slice(&(i as u64).to_le_bytes());
        ids.push(ObjectId::from_bytes(bytes));
    }
    ids
}

fn build_blobs(n: usize, size: usize, rng: &mut XorShift64) -> Vec<Blob> {
    let mut blobs = Vec::with_capacity(n);
    for _ in 0..n {
        let mut data = vec![0u8; size];
        for chunk in data.chunks_mut(8) {
            let word = rng.next_u64().to_le_bytes();
            let take = chunk.len();
            chunk.copy_from_slice(&word[..take]);
        }
        blobs.push(Blob::from_data(data));
    }
    blobs
}

fn report(label: &str, ops: usize, elapsed: std::time::Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = ops as f64 / secs;
    let ns_per_op = elapsed.as_nanos() as f64 / ops as f64;
    println!("{label:<22} {ops:>8} ops  {secs:>8.3}s  {ops_per_sec:>12.0} ops/s  {ns_per_op:>8.1} ns/op");
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = BenchConfig::from_args();
    println!(
        "objects={} blob_size={}B max_bytes={}MiB",
        cfg.num_objects,
        cfg.blob_size,
        cfg.max_bytes / (1024 * 1024)
    );

    let mut rng = XorShift64::new(0x5eed);
    let ids = build_ids(cfg.num_objects);
    let blobs = build_blobs(cfg.num_objects, cfg.blob_size, &mut rng);

    let store = Store::new(cfg.max_bytes);

    let start = Instant::now();
    for (id, blob) in ids.iter().zip(blobs.into_iter()) {
        // Ignore OutOfMemory here: a deliberately small --max-bytes is
        // a valid way to drive the eviction benchmark below.
        let _ = store.put(*id, blob);
    }
    report("put", cfg.num_objects, start.elapsed());

    let start = Instant::now();
    let mut hits = 0usize;
    for id in &ids {
        if store.get(&[*id], 0)[0].is_some() {
            hits += 1;
        }
    }
    report("get (resident scan)", cfg.num_objects, start.elapsed());
    println!("  resident hits: {hits}/{}", cfg.num_objects);

    let stats = store.stats();
    println!(
        "stats: entries={} resident_bytes={} puts={} evictions={} rejections={}",
        stats.entry_count, stats.resident_bytes, stats.puts, stats.evictions, stats.rejections
    );

    Ok(())
}

fn main() -> Result<()> {
    run()
}
