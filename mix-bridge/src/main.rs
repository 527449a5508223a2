//! Mixer Bridge
//!
//! Connects a slider/button control surface on a serial port to the host's
//! audio sessions.
//!
//! Usage: `mixbridge [CONFIG_PATH]`. Without a path the config is read from
//! the user config directory. On unix, `SIGHUP` reloads it.

mod bridge;
mod notifier;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bridge::Bridge;
use mix_config::{Config, ConfigHandle};
use mix_detect::SerialTransport;
use mix_serial::SerialIo;
use mix_sessions::SessionRouter;
use mix_sim::VirtualAudioSystem;
use notifier::TracingNotifier;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mixbridge=info,mix_bridge=info,mix_protocol=info,mix_config=info,mix_detect=info,mix_serial=info,mix_sessions=info,mix_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting mixbridge");

    let config = match std::env::args_os().nth(1) {
        Some(path) => ConfigHandle::load_from(PathBuf::from(path)),
        None => ConfigHandle::load(),
    }
    .context("failed to load configuration")?;

    warn!("No platform audio backend is compiled in, using simulated audio sessions");
    let audio = simulated_audio(&config.snapshot());

    let serial = SerialIo::new(
        config.clone(),
        Arc::new(SerialTransport::new()),
        Arc::new(TracingNotifier),
    );
    let router = Arc::new(SessionRouter::new(
        config.clone(),
        audio.clone(),
        audio,
    ));

    let bridge = Bridge::new(config, serial, router);
    if let Err(e) = bridge.run(shutdown_signal()).await {
        error!("{:#}", e);
        return Err(e);
    }

    info!(state = %bridge.serial().state(), "Stopped");
    Ok(())
}

/// An audio system with a master session and the configured output devices
fn simulated_audio(config: &Config) -> Arc<VirtualAudioSystem> {
    let audio = Arc::new(VirtualAudioSystem::new());
    audio.add_app("master");
    for (_, names) in config.available_output_device.iter() {
        for name in names {
            audio.add_device(name, name);
        }
    }
    audio
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C, shutting down: {}", e);
        return;
    }
    info!("Interrupted");
}
