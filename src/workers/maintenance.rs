use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::personalization::{MaintenanceReport, PersonalizationEngine};

/// Closes idle sessions, evicts completed sessions past retention and purges
/// expired cache entries. The sweep runs on the blocking pool since it walks
/// every session under a lock.
pub async fn run_maintenance_cycle(
    engine: Arc<PersonalizationEngine>,
) -> Result<MaintenanceReport, super::WorkerError> {
    let start = Instant::now();
    debug!("Starting maintenance cycle");

    let report = tokio::task::spawn_blocking(move || engine.run_maintenance())
        .await
        .map_err(|e| super::WorkerError::Task(e.to_string()))?;

    info!(
        sessions_expired = report.sessions_expired,
        sessions_removed = report.sessions_removed,
        cache_entries_purged = report.cache_entries_purged,
        duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
        "Maintenance cycle completed"
    );
    Ok(report)
}
