//! Background jobs.
//!
//! The member status auto-transition job runs daily on a cron schedule and
//! once right after startup, so transitions that fell due while the service
//! was down are applied without waiting for the next tick.

pub mod status_auto_transition;

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use status_auto_transition::run_auto_transitions;

/// Builds the auto-transition cron job (6-field expression, UTC)
pub fn auto_transition_job(pool: PgPool, system_user_id: Uuid, cron: &str) -> Result<Job> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pool = pool.clone();
        Box::pin(async move {
            let today = Utc::now().date_naive();
            if let Err(e) = run_auto_transitions(&pool, system_user_id, today).await {
                tracing::error!("Member status auto-transition job failed: {}", e);
            }
        })
    })?;

    Ok(job)
}

/// Start all scheduled tasks
pub async fn start_scheduler(pool: PgPool, system_user_id: Uuid, cron: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    scheduler
        .add(auto_transition_job(pool, system_user_id, cron)?)
        .await?;
    scheduler.start().await?;

    tracing::info!(cron, "Scheduled tasks started (member status auto-transitions)");

    Ok(scheduler)
}

/// Runs the auto-transition job once in the background to catch up on
/// anything that fell due while the service was not running
pub fn spawn_startup_catch_up(pool: PgPool, system_user_id: Uuid) -> JoinHandle<()> {
    tokio::spawn(async move {
        let today = Utc::now().date_naive();
        match run_auto_transitions(&pool, system_user_id, today).await {
            Ok(stats) => tracing::info!(?stats, "Startup catch-up run completed"),
            Err(e) => tracing::error!("Startup catch-up run failed: {}", e),
        }
    })
}
