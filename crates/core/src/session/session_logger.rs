use std::time::Instant;

/// Observer of one verification session.
///
/// The driver reports every scorer round-trip and its outcome; what happens
/// with them (log lines, a summary, nothing) is up to the implementation.
pub trait SessionLogger: Send {
    /// A scorer request settled after `latency_ms`.
    fn round_trip(&mut self, latency_ms: f64);

    /// The scorer saw a face at this similarity (0-100).
    fn similarity(&mut self, percent: f64);

    fn scorer_failed(&mut self, error: &str);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn round_trip(&mut self, _latency_ms: f64) {}
    fn similarity(&mut self, _percent: f64) {}
    fn scorer_failed(&mut self, _error: &str) {}
    fn info(&mut self, _message: &str) {}
}

/// Count, mean and maximum of a stream of latencies, in constant space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatencyStats {
    pub count: usize,
    total_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    pub fn record(&mut self, latency_ms: f64) {
        self.count += 1;
        self.total_ms += latency_ms;
        self.max_ms = self.max_ms.max(latency_ms);
    }

    pub fn mean_ms(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total_ms / self.count as f64)
    }
}

/// CLI logger: reports progress every `report_every` round-trips and a
/// one-paragraph summary when the session ends.
///
/// Sessions retry indefinitely, so only running aggregates are kept.
pub struct StdoutSessionLogger {
    report_every: usize,
    started: Instant,
    latency: LatencyStats,
    last_similarity: Option<f64>,
    best_similarity: Option<f64>,
    errors: usize,
}

impl StdoutSessionLogger {
    pub fn new(report_every: usize) -> Self {
        Self {
            report_every: report_every.max(1),
            started: Instant::now(),
            latency: LatencyStats::default(),
            last_similarity: None,
            best_similarity: None,
            errors: 0,
        }
    }

    pub fn latency(&self) -> LatencyStats {
        self.latency
    }

    pub fn best_similarity(&self) -> Option<f64> {
        self.best_similarity
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    /// `None` until the first round-trip settles.
    pub fn summary_string(&self) -> Option<String> {
        let mean_ms = self.latency.mean_ms()?;
        let mut text = format!(
            "Session summary: {} round-trips in {:.1}s, latency avg {mean_ms:.0}ms max {:.0}ms",
            self.latency.count,
            self.started.elapsed().as_secs_f64(),
            self.latency.max_ms,
        );
        match (self.last_similarity, self.best_similarity) {
            (Some(last), Some(best)) => {
                text.push_str(&format!(", similarity last {last:.1}% best {best:.1}%"));
            }
            _ => text.push_str(", no face seen"),
        }
        if self.errors > 0 {
            text.push_str(&format!(", {} scorer errors", self.errors));
        }
        Some(text)
    }
}

impl Default for StdoutSessionLogger {
    fn default() -> Self {
        Self::new(20)
    }
}

impl SessionLogger for StdoutSessionLogger {
    fn round_trip(&mut self, latency_ms: f64) {
        self.latency.record(latency_ms);
        let count = self.latency.count;
        if count % self.report_every == 0 {
            let best = self
                .best_similarity
                .map_or_else(|| "none".to_string(), |b| format!("{b:.1}%"));
            log::info!("Still waiting for a stable face after {count} checks (best {best})");
        }
    }

    fn similarity(&mut self, percent: f64) {
        self.last_similarity = Some(percent);
        self.best_similarity = Some(self.best_similarity.map_or(percent, |b| b.max(percent)));
    }

    fn scorer_failed(&mut self, error: &str) {
        self.errors += 1;
        log::debug!("Scorer error #{}: {error}", self.errors);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
        }
    }
}
