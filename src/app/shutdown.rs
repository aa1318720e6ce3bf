use super::ExtractionApp;
use tracing::{error, info};

impl ExtractionApp {
    /// Stop capturing, let the in-flight cycle settle and export the log.
    ///
    /// Returns 0 on a clean shutdown and 1 if the cycle did not settle in
    /// time or the export failed.
    pub async fn shutdown(&mut self) -> i32 {
        info!("Beginning graceful shutdown");

        // Cancel signal and deadline tasks
        self.cancellation_token.cancel();
        self.scheduler.stop();

        let mut exit_code = 0;

        if !self.scheduler.wait_until_idle_for(self.shutdown_grace).await {
            error!(
                "In-flight cycle did not settle within {:?}; its pending results are lost",
                self.shutdown_grace
            );
            exit_code = 1;
        }

        let stats = self.scheduler.stats();
        info!(
            "Session summary: {} cycles, {} records, {} dropped ticks, {} capture failures, {} recognition failures",
            stats.cycles_completed,
            self.results.len(),
            stats.ticks_dropped,
            stats.capture_failures,
            stats.recognition_failures
        );

        if self.export_on_exit {
            match self.write_export().await {
                Ok(path) => info!("Results written to {}", path.display()),
                Err(e) => {
                    error!("Error exporting results: {}", e);
                    exit_code = 1;
                }
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        exit_code
    }
}
