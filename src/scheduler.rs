//! Periodic installment reminder reconciliation

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::notification::{NotificationService, OwnerScope};

/// Build and start a scheduler that reconciles every member's loans on `cron`.
///
/// The returned handle must be kept alive for the job to keep firing.
pub async fn start_reconcile_scheduler(
    service: Arc<NotificationService>,
    cron: &str,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| anyhow!("creating reconcile scheduler: {:?}", e))?;

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let service = service.clone();
        Box::pin(async move {
            tracing::info!("Scheduled reminder reconciliation started");
            let report = service.reconcile_loans(OwnerScope::All, Utc::now()).await;
            if report.loans_failed > 0 {
                tracing::warn!(
                    loans_failed = report.loans_failed,
                    "Some loans failed to reconcile; they will be retried on the next run"
                );
            }
        })
    })
    .map_err(|e| anyhow!("creating reconcile job for cron {cron}: {:?}", e))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| anyhow!("adding reconcile job: {:?}", e))?;
    scheduler
        .start()
        .await
        .map_err(|e| anyhow!("starting reconcile scheduler: {:?}", e))?;

    tracing::info!(cron = cron, "Reminder reconciliation scheduled");
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationSettings;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_invalid_cron_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let service = Arc::new(NotificationService::new(
            store,
            &NotificationSettings::default(),
        ));

        let result = start_reconcile_scheduler(service, "not a cron").await;
        assert!(result.is_err());
    }
}
