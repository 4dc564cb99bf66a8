mod maintenance;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::personalization::PersonalizationEngine;

pub use maintenance::run_maintenance_cycle;

const DEFAULT_MAINTENANCE_SCHEDULE: &str = "0 */10 * * * *";

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    engine: Arc<PersonalizationEngine>,
    running: AtomicBool,
}

impl WorkerManager {
    pub async fn new(engine: Arc<PersonalizationEngine>) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await.map_err(WorkerError::Scheduler)?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            engine,
            running: AtomicBool::new(false),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn start(&self) -> Result<(), WorkerError> {
        let enable_maintenance = std::env::var("ENABLE_MAINTENANCE_WORKER")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        if !enable_maintenance {
            info!("ENABLE_MAINTENANCE_WORKER disabled, skipping worker startup");
            return Ok(());
        }

        let schedule = std::env::var("MAINTENANCE_SCHEDULE")
            .unwrap_or_else(|_| DEFAULT_MAINTENANCE_SCHEDULE.to_string());
        let engine = Arc::clone(&self.engine);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
            let engine = Arc::clone(&engine);
            let mut rx = shutdown_rx.resubscribe();
            Box::pin(async move {
                tokio::select! {
                    _ = rx.recv() => {},
                    result = maintenance::run_maintenance_cycle(engine) => {
                        if let Err(e) = result {
                            error!(error = %e, "Maintenance worker error");
                        }
                    }
                }
            })
        })
        .map_err(WorkerError::Scheduler)?;

        let scheduler = self.scheduler.lock().await;
        scheduler.add(job).await.map_err(WorkerError::Scheduler)?;
        scheduler.start().await.map_err(WorkerError::Scheduler)?;
        self.running.store(true, Ordering::Relaxed);
        info!(schedule = %schedule, "Maintenance worker scheduled");

        Ok(())
    }

    pub async fn stop(&self) {
        if !self.is_running() {
            return;
        }

        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }

        self.running.store(false, Ordering::Relaxed);
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
    #[error("Maintenance task failed: {0}")]
    Task(String),
}
