//! Region Cache workload driver
//!
//! Runs a concurrent mix of reads, loads, updates and removals against one
//! region and prints the resulting statistics as JSON.

use std::env;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use region_cache::{
    AccessType, CacheConfig, CacheError, CacheKey, KeyKind, Region, RegionRegistry, RegistryStats,
};

/// Workload shape, read from `BENCH_*` environment variables.
#[derive(Debug, Clone, Serialize)]
struct Workload {
    threads: usize,
    ops_per_thread: usize,
    keys: usize,
    access_type: AccessType,
}

impl Workload {
    fn from_env() -> anyhow::Result<Self> {
        let access_type = match env::var("BENCH_ACCESS_TYPE") {
            Ok(raw) => raw
                .parse::<AccessType>()
                .with_context(|| format!("BENCH_ACCESS_TYPE={raw}"))?,
            Err(_) => AccessType::ReadWrite,
        };
        Ok(Self {
            threads: env_or::<usize>("BENCH_THREADS", 4).max(1),
            ops_per_thread: env_or::<usize>("BENCH_OPS", 100_000),
            keys: env_or::<usize>("BENCH_KEYS", 1_000).max(1),
            access_type,
        })
    }
}

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicU64,
    loads: AtomicU64,
    updates: AtomicU64,
    conflicts: AtomicU64,
    violations: AtomicU64,
}

#[derive(Debug, Serialize)]
struct Report {
    workload: Workload,
    elapsed_ms: u64,
    reads: u64,
    loads: u64,
    updates: u64,
    conflicts: u64,
    violations: u64,
    region_size: usize,
    stats: RegistryStats,
}

fn main() -> anyhow::Result<()> {
    let config = CacheConfig::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().context("cache configuration")?;
    let workload = Workload::from_env()?;
    info!(
        "Configuration loaded: max_entries={}, ttl={}ms, lock_timeout={}ms, debug_logging={}",
        config.max_entries, config.ttl_millis, config.lock_timeout_millis, config.debug_logging
    );

    let registry: RegionRegistry<u64> = RegionRegistry::new(config);
    let region = registry.build_region("bench", KeyKind::Entity, workload.access_type)?;
    let keys = (0..workload.keys)
        .map(|id| CacheKey::entity("Item", id.to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        threads = workload.threads,
        ops_per_thread = workload.ops_per_thread,
        keys = workload.keys,
        access_type = %workload.access_type,
        "starting workload"
    );

    let counters = Counters::default();
    let started = Instant::now();
    let (shared, keys, ops) = (&*region, keys.as_slice(), workload.ops_per_thread);
    thread::scope(|scope| -> anyhow::Result<()> {
        let counters = &counters;
        let workers: Vec<_> = (0..workload.threads)
            .map(|worker| scope.spawn(move || run_worker(worker, ops, shared, keys, counters)))
            .collect();
        for worker in workers {
            worker
                .join()
                .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
        }
        Ok(())
    })?;
    let elapsed = started.elapsed();

    let report = Report {
        workload,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        reads: counters.reads.load(Ordering::Relaxed),
        loads: counters.loads.load(Ordering::Relaxed),
        updates: counters.updates.load(Ordering::Relaxed),
        conflicts: counters.conflicts.load(Ordering::Relaxed),
        violations: counters.violations.load(Ordering::Relaxed),
        region_size: region.size(),
        stats: registry.stats(),
    };
    info!(
        elapsed_ms = report.elapsed_ms,
        "workload finished: {}",
        region.stats()
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    registry.stop();
    Ok(())
}

/// One worker's loop: mostly reads with load-on-miss, some updates and
/// the occasional removal.
fn run_worker(
    worker: usize,
    ops: usize,
    region: &Region<u64>,
    keys: &[CacheKey],
    counters: &Counters,
) -> anyhow::Result<()> {
    let mut cursor = worker.wrapping_mul(7_919);
    for op in 0..ops {
        cursor = cursor.wrapping_mul(31).wrapping_add(op) % keys.len();
        let key = &keys[cursor];
        let value = (worker * ops + op) as u64;

        match op % 10 {
            0..=6 => {
                counters.reads.fetch_add(1, Ordering::Relaxed);
                if region.get(key)?.is_none() && region.put_from_load(key.clone(), value)? {
                    counters.loads.fetch_add(1, Ordering::Relaxed);
                }
            }
            7 | 8 => match update(region, key, value) {
                Ok(true) => {
                    counters.updates.fetch_add(1, Ordering::Relaxed);
                }
                Ok(false) => {}
                Err(CacheError::ReadOnlyViolation(_)) => {
                    counters.violations.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) if err.is_retryable() => {
                    counters.conflicts.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => return Err(err.into()),
            },
            _ => match region.remove(key) {
                Ok(()) => {}
                Err(err) if err.is_retryable() => {
                    counters.conflicts.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => return Err(err.into()),
            },
        }
    }
    debug!(worker, ops, "worker finished");
    Ok(())
}

fn update(region: &Region<u64>, key: &CacheKey, value: u64) -> region_cache::Result<bool> {
    let lock = region.update(key)?;
    region.after_update(key.clone(), value, lock)
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
