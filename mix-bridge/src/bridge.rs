//! Wiring between the serial engine and the session router

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use mix_config::ConfigHandle;
use mix_serial::SerialIo;
use mix_sessions::SessionRouter;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{info, warn};

/// Runs one serial engine and one session router until shutdown
pub struct Bridge {
    config: ConfigHandle,
    serial: SerialIo,
    router: Arc<SessionRouter>,
}

impl Bridge {
    pub fn new(config: ConfigHandle, serial: SerialIo, router: Arc<SessionRouter>) -> Self {
        Self {
            config,
            serial,
            router,
        }
    }

    pub fn serial(&self) -> &SerialIo {
        &self.serial
    }

    /// Start everything, wait for `shutdown`, then tear down
    ///
    /// Returns early with an error if the sessions cannot be enumerated or
    /// the controller cannot be reached on startup.
    pub async fn run<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        self.router
            .initialize(&self.serial, &self.serial)
            .context("failed to initialize audio sessions")?;

        if let Err(e) = self.serial.start().await {
            self.release();
            return Err(e).context("failed to start serial connection");
        }

        let restarts = self.spawn_restart_timer();
        let reloads = self.spawn_reload_listener();
        info!("Bridge running");

        shutdown.await;
        info!("Shutting down");

        for task in [restarts, reloads].into_iter().flatten() {
            task.abort();
        }
        self.serial.stop().await;
        self.release();
        Ok(())
    }

    fn release(&self) {
        if let Err(e) = self.router.release() {
            warn!("Failed to release audio sessions: {}", e);
        }
    }

    /// Force a full session refresh on a long fixed period
    fn spawn_restart_timer(&self) -> Option<JoinHandle<()>> {
        let period = self.config.snapshot().session_refresh.restart_interval();
        if period.is_zero() {
            warn!("Session restart interval is zero, periodic refresh disabled");
            return None;
        }

        let router = Arc::clone(&self.router);
        Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                info!("Periodic audio session restart");
                router.refresh_sessions(true);
            }
        }))
    }

    #[cfg(unix)]
    fn spawn_reload_listener(&self) -> Option<JoinHandle<()>> {
        use tokio::signal::unix::{signal, SignalKind};

        if self.config.path().is_none() {
            return None;
        }

        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Cannot listen for SIGHUP, config reload disabled: {}", e);
                return None;
            }
        };

        let config = self.config.clone();
        Some(tokio::spawn(async move {
            while hangups.recv().await.is_some() {
                if let Err(e) = config.reload() {
                    warn!("Failed to reload configuration: {}", e);
                }
            }
        }))
    }

    #[cfg(not(unix))]
    fn spawn_reload_listener(&self) -> Option<JoinHandle<()>> {
        None
    }
}
