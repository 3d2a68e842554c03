use tokio::time::{sleep, Duration};
use crate::services::TaskService;

/// Periodically runs the repair pass over every stored user.
pub async fn run_repair_sweep(tasks: TaskService, interval: Duration) {
    tracing::info!("Repair sweep started, every {}s", interval.as_secs());

    loop {
        sleep(interval).await;

        match tasks.repair_all().await {
            Ok(report) if report.touched() > 0 => {
                tracing::info!("Repair sweep fixed {} tasks: {:?}", report.touched(), report);
            }
            Ok(report) => {
                tracing::debug!("Repair sweep scanned {} tasks, nothing to fix", report.scanned);
            }
            Err(e) => {
                tracing::error!("Repair sweep failed: {}", e);
            }
        }
    }
}
