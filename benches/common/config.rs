use std::env;
use std::str::FromStr;

/// Benchmark knobs, read from the environment.
///
/// | Variable | Default |
/// |---|---|
/// | `BENCH_REDIS` | unset: memory-only variants |
/// | `REDIS_URL` | `redis://localhost:6379` |
/// | `DB_LATENCY_MS` | 50 |
/// | `BENCH_SAMPLE_SIZE` | 100 |
/// | `BENCH_CALLERS` | `10,100` |
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Redis URL for the memory-over-Redis variants; `None` skips them.
    pub redis: Option<String>,
    pub db_latency_ms: u64,
    pub sample_size: usize,
    /// Concurrent callers per stampede round.
    pub callers: Vec<usize>,
}

fn var_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl BenchConfig {
    pub fn new() -> Self {
        let redis = env::var("BENCH_REDIS")
            .is_ok_and(|v| v == "1" || v == "true")
            .then(|| {
                env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
            });

        let callers = env::var("BENCH_CALLERS")
            .ok()
            .map(|s| s.split(',').filter_map(|n| n.trim().parse().ok()).collect::<Vec<usize>>())
            .filter(|callers| !callers.is_empty())
            .unwrap_or_else(|| vec![10, 100]);

        let config = BenchConfig {
            redis,
            db_latency_ms: var_or("DB_LATENCY_MS", 50),
            sample_size: var_or("BENCH_SAMPLE_SIZE", 100),
            callers,
        };
        eprintln!("{config:#?}");
        config
    }
}
