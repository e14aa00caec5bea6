//! Deterministic data for the integration tests.
#![allow(dead_code)]

use std::path::Path;

use sluice::{Context, StreamConfig};

/// Small linear congruential generator; same seed, same sequence.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x5DEE_CE66_D)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 11
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }
}

/// `n` pseudo-random integers in `0..bound`.
pub fn random_ints(seed: u64, n: usize, bound: u64) -> Vec<i64> {
    let mut rng = Lcg::new(seed);
    (0..n).map(|_| rng.below(bound) as i64).collect()
}

/// Sorted `n` integers with duplicates.
pub fn sorted_ints(seed: u64, n: usize, bound: u64) -> Vec<i64> {
    let mut v = random_ints(seed, n, bound);
    v.sort();
    v
}

pub fn is_sorted<T: PartialOrd>(v: &[T]) -> bool {
    v.windows(2).all(|w| w[0] <= w[1])
}

/// Context with a small stream capacity and scratch files under `dir`.
pub fn test_context(dir: &Path, capacity: usize) -> Context {
    let cfg = StreamConfig::default()
        .with_capacity(capacity)
        .with_spill_dir(dir.to_string_lossy().into_owned());
    Context::new(cfg).unwrap()
}

/// Every file remaining below `dir`, recursively.
pub fn files_under(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(files_under(&path));
        } else {
            out.push(path);
        }
    }
    out
}

/// Poll until `cond` holds or about a second has passed.
pub fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    cond()
}
