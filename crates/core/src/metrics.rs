use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// In-memory gateway counters, shared across request handlers.
pub struct Metrics {
    pub total_requests: AtomicU64,
    pub total_errors: AtomicU64,
    pub upstream_attempts: AtomicU64,
    pub upstream_failures: AtomicU64,
    /// Requests per resolved model (or `image` / `test`).
    model_counts: RwLock<HashMap<String, AtomicU64>>,
    /// Failed attempts per upstream name.
    upstream_failure_counts: RwLock<HashMap<String, AtomicU64>>,
    /// Latency histogram buckets (ms): <100, <500, <1000, <5000, <30000, >=30000.
    pub latency_buckets: [AtomicU64; 6],
    total_latency_ms: AtomicU64,
    created_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            upstream_attempts: AtomicU64::new(0),
            upstream_failures: AtomicU64::new(0),
            model_counts: RwLock::new(HashMap::new()),
            upstream_failure_counts: RwLock::new(HashMap::new()),
            latency_buckets: Default::default(),
            total_latency_ms: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    pub fn record_request(&self, model: &str) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        increment_map(&self.model_counts, model);
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attempt(&self) {
        self.upstream_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self, upstream: &str) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
        increment_map(&self.upstream_failure_counts, upstream);
    }

    pub fn record_latency_ms(&self, ms: u128) {
        let bucket = match ms {
            0..=99 => 0,
            100..=499 => 1,
            500..=999 => 2,
            1000..=4999 => 3,
            5000..=29999 => 4,
            _ => 5,
        };
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(ms as u64, Ordering::Relaxed);
    }

    /// Snapshot current metrics as a JSON-serializable value.
    pub fn snapshot(&self) -> serde_json::Value {
        let total_reqs = self.total_requests.load(Ordering::Relaxed);
        let total_errs = self.total_errors.load(Ordering::Relaxed);
        let avg_latency = if total_reqs > 0 {
            self.total_latency_ms.load(Ordering::Relaxed) as f64 / total_reqs as f64
        } else {
            0.0
        };

        serde_json::json!({
            "total_requests": total_reqs,
            "total_errors": total_errs,
            "upstream_attempts": self.upstream_attempts.load(Ordering::Relaxed),
            "upstream_failures": self.upstream_failures.load(Ordering::Relaxed),
            "latency_ms": {
                "<100": self.latency_buckets[0].load(Ordering::Relaxed),
                "100-499": self.latency_buckets[1].load(Ordering::Relaxed),
                "500-999": self.latency_buckets[2].load(Ordering::Relaxed),
                "1000-4999": self.latency_buckets[3].load(Ordering::Relaxed),
                "5000-29999": self.latency_buckets[4].load(Ordering::Relaxed),
                ">=30000": self.latency_buckets[5].load(Ordering::Relaxed),
            },
            "by_model": snapshot_map(&self.model_counts),
            "failures_by_upstream": snapshot_map(&self.upstream_failure_counts),
            "avg_latency_ms": avg_latency,
            "uptime_seconds": self.created_at.elapsed().as_secs(),
        })
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn increment_map(map: &RwLock<HashMap<String, AtomicU64>>, key: &str) {
    // Fast path: read lock
    if let Ok(m) = map.read()
        && let Some(counter) = m.get(key)
    {
        counter.fetch_add(1, Ordering::Relaxed);
        return;
    }
    if let Ok(mut m) = map.write() {
        m.entry(key.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }
}

fn snapshot_map(map: &RwLock<HashMap<String, AtomicU64>>) -> serde_json::Value {
    let mut result = serde_json::Map::new();
    if let Ok(m) = map.read() {
        for (k, v) in m.iter() {
            result.insert(
                k.clone(),
                serde_json::Value::Number(v.load(Ordering::Relaxed).into()),
            );
        }
    }
    serde_json::Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_metrics() {
        let m = Metrics::new();
        m.record_request("chatgpt");
        m.record_request("chatgpt");
        m.record_request("image");
        m.record_error();
        m.record_attempt();
        m.record_attempt();
        m.record_upstream_failure("pollinations-openai");
        m.record_latency_ms(50);
        m.record_latency_ms(250);
        m.record_latency_ms(5000);

        let snap = m.snapshot();
        assert_eq!(snap["total_requests"], 3);
        assert_eq!(snap["total_errors"], 1);
        assert_eq!(snap["upstream_attempts"], 2);
        assert_eq!(snap["upstream_failures"], 1);
        assert_eq!(snap["by_model"]["chatgpt"], 2);
        assert_eq!(snap["failures_by_upstream"]["pollinations-openai"], 1);
        assert_eq!(snap["latency_ms"]["<100"], 1);
        assert_eq!(snap["latency_ms"]["100-499"], 1);
        assert_eq!(snap["latency_ms"]["5000-29999"], 1);
    }
}
