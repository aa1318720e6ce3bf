use super::orchestrator::ShutdownHandle;
use super::{ExtractionApp, ShutdownReason};
use crate::error::{RoiscanError, Result};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

impl ExtractionApp {
    /// Capture until a signal arrives or `duration` elapses, then shut down.
    ///
    /// Returns the process exit code.
    pub async fn run(&mut self, duration: Option<Duration>) -> Result<i32> {
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| RoiscanError::system("Shutdown receiver already taken"))?;

        let handle = self.shutdown_handle();
        self.setup_signal_handlers(handle.clone());
        if let Some(duration) = duration {
            spawn_deadline(handle, duration, self.cancellation_token.clone());
        }

        self.set_capturing(true);
        info!("Roiscan is running");

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| RoiscanError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await;

        info!("Roiscan shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, handle: ShutdownHandle) {
        // SIGTERM - Unix only
        #[cfg(unix)]
        {
            let handle = handle.clone();
            let token = self.cancellation_token.clone();
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            warn!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };

                tokio::select! {
                    _ = token.cancelled() => {}
                    Some(()) = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                        handle.request(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        // SIGINT (Ctrl+C) - Cross-platform
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                Ok(()) = signal::ctrl_c() => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    handle.request(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}

fn spawn_deadline(handle: ShutdownHandle, duration: Duration, token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(duration) => {
                info!("Run duration of {:?} elapsed", duration);
                handle.request(ShutdownReason::DurationElapsed(duration));
            }
        }
    });
}
