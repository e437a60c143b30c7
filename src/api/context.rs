use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Per-request id and timing, created once the model is known to be available.
#[derive(Debug)]
pub struct RequestContext {
    pub id: Uuid,
    started: Instant,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started: Instant::now(),
        }
    }

    /// Milliseconds since the context was created, rounded to two decimals.
    pub fn latency_ms(&self) -> f64 {
        round_ms(self.started.elapsed().as_secs_f64() * 1000.0)
    }
}

fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

/// Current UTC time as ISO-8601 with a `Z` suffix.
pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
