//! `image-warden serve` command.

use image_warden_core::ControllerConfig;
use image_warden_repo::StaleRecordsCleaner;

use crate::controller::Controller;
use crate::signal::wait_for_shutdown;

pub async fn execute(config: ControllerConfig) -> anyhow::Result<()> {
    let controller = Controller::open(&config)?;
    let cleaner = StaleRecordsCleaner::start(controller.repo().clone());

    tracing::info!(
        rules = controller.engine().rules().len(),
        report_interval_secs = config.report_interval_secs,
        retention_days = config.retention_days,
        "Controller is running"
    );

    let timeout = config.shutdown_timeout();
    wait_for_shutdown(timeout, async move {
        if let Some(cleaner) = cleaner {
            cleaner.stop(timeout).await;
        }
    })
    .await;

    Ok(())
}
