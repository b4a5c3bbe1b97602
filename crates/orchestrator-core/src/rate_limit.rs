//! Per-agent throttle: serializes concurrent callers so the configured rate
//! is never exceeded, with FIFO fairness per agent key.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct AgentGate {
    /// Serializes acquirers for this agent; tokio's mutex queues waiters
    /// FIFO, which is what gives us per-agent fairness.
    lock: Mutex<Instant>,
    min_interval: Duration,
}

/// Process-wide, shared rate limiter. `acquire` is the sole serialization
/// point; fairness across different agent keys is not required or provided.
pub struct RateLimiter {
    enabled: bool,
    requests_per_interval: u32,
    interval: Duration,
    gates: Mutex<HashMap<String, std::sync::Arc<AgentGate>>>,
}

impl RateLimiter {
    pub fn new(enabled: bool, requests_per_interval: u32, interval: Duration) -> Self {
        Self {
            enabled,
            requests_per_interval: requests_per_interval.max(1),
            interval,
            gates: Mutex::new(HashMap::new()),
        }
    }

    async fn gate_for(&self, agent_name: &str) -> std::sync::Arc<AgentGate> {
        let mut gates = self.gates.lock().await;
        gates
            .entry(agent_name.to_string())
            .or_insert_with(|| {
                std::sync::Arc::new(AgentGate {
                    lock: Mutex::new(Instant::now() - self.interval),
                    min_interval: self.interval / self.requests_per_interval,
                })
            })
            .clone()
    }

    /// Suspend the caller until `agent_name`'s quota permits another call,
    /// then consume one unit.
    pub async fn acquire(&self, agent_name: &str) {
        if !self.enabled {
            return;
        }
        let gate = self.gate_for(agent_name).await;
        let mut next_allowed = gate.lock.lock().await;

        let now = Instant::now();
        if *next_allowed > now {
            tokio::time::sleep(*next_allowed - now).await;
        }
        *next_allowed = Instant::now() + gate.min_interval;
    }
}
