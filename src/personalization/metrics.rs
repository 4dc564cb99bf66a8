use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Stage,
    Strategy,
    Detector,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Strategy => "strategy",
            Self::Detector => "detector",
        }
    }
}

#[derive(Debug, Default)]
pub struct ComponentMetrics {
    call_count: AtomicU64,
    total_latency_us: AtomicU64,
    error_count: AtomicU64,
    timeout_count: AtomicU64,
    last_called_at: AtomicU64,
}

impl ComponentMetrics {
    pub fn record_call(&self, latency_us: u64) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
        self.last_called_at.store(now_ms(), Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeout_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn timeout_count(&self) -> u64 {
        self.timeout_count.load(Ordering::Relaxed)
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let calls = self.call_count.load(Ordering::Relaxed);
        if calls == 0 {
            return 0.0;
        }
        let total_us = self.total_latency_us.load(Ordering::Relaxed);
        let avg = (total_us as f64 / calls as f64) / 1000.0;
        (avg * 10000.0).round() / 10000.0
    }

    pub fn last_called_at(&self) -> Option<u64> {
        match self.last_called_at.load(Ordering::Relaxed) {
            0 => None,
            ts => Some(ts),
        }
    }

    pub fn is_active(&self) -> bool {
        match self.last_called_at() {
            Some(last) => now_ms().saturating_sub(last) < 300_000,
            None => false,
        }
    }
}

/// Per-engine registry of stage, strategy and detector counters. Components are
/// registered lazily on first use.
#[derive(Default)]
pub struct MetricsRegistry {
    components: RwLock<BTreeMap<String, (ComponentKind, Arc<ComponentMetrics>)>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component(&self, kind: ComponentKind, name: &str) -> Arc<ComponentMetrics> {
        if let Some((_, metrics)) = self.components.read().get(name) {
            return Arc::clone(metrics);
        }
        let mut guard = self.components.write();
        let (_, metrics) = guard
            .entry(name.to_string())
            .or_insert_with(|| (kind, Arc::new(ComponentMetrics::default())));
        Arc::clone(metrics)
    }

    pub fn record(&self, kind: ComponentKind, name: &str, latency_us: u64) {
        self.component(kind, name).record_call(latency_us);
    }

    pub fn record_error(&self, kind: ComponentKind, name: &str) {
        self.component(kind, name).record_error();
    }

    pub fn record_timeout(&self, kind: ComponentKind, name: &str) {
        self.component(kind, name).record_timeout();
    }

    pub fn snapshot(&self) -> Vec<ComponentStatus> {
        self.components
            .read()
            .iter()
            .map(|(name, (kind, m))| {
                let calls = m.call_count();
                let is_active = m.is_active();
                let degraded = m.error_count() + m.timeout_count();
                let status = if calls == 0 {
                    "idle"
                } else if degraded * 2 > calls {
                    "degraded"
                } else if is_active {
                    "healthy"
                } else {
                    "inactive"
                };
                ComponentStatus {
                    name: name.clone(),
                    kind: *kind,
                    call_count: calls,
                    avg_latency_ms: m.avg_latency_ms(),
                    error_count: m.error_count(),
                    timeout_count: m.timeout_count(),
                    last_called_at: m.last_called_at(),
                    is_active,
                    status: status.to_string(),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    pub name: String,
    pub kind: ComponentKind,
    pub call_count: u64,
    pub avg_latency_ms: f64,
    pub error_count: u64,
    pub timeout_count: u64,
    pub last_called_at: Option<u64>,
    pub is_active: bool,
    pub status: String,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[macro_export]
macro_rules! track_stage {
    ($registry:expr, $name:expr, $body:expr) => {{
        let start = std::time::Instant::now();
        let result = $body;
        let latency_us = start.elapsed().as_micros() as u64;
        $registry.record(
            $crate::personalization::metrics::ComponentKind::Stage,
            $name,
            latency_us,
        );
        result
    }};
}
