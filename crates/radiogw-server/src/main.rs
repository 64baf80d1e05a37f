//! radiogw entry point.
//!
//! Wires the serial PTT line, the audio backend and the listener together,
//! then waits for Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config (file, then CLI overrides)
//!  └─ open serial PTT line          -- failure aborts startup
//!  └─ PttController + audio backend
//!  └─ Listener thread "radiogw-listener"
//!       └─ SessionCoordinator::run  -- one client at a time
//!            └─ transmit thread "radiogw-tx"
//!  └─ wait for Ctrl-C or listener exit, then force PTT off
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use radiogw_core::PttController;
use radiogw_server::application::listener::Listener;
use radiogw_server::application::session::{SessionConfig, SessionCoordinator};
use radiogw_server::infrastructure::audio;
use radiogw_server::infrastructure::serial::SerialControlLine;
use radiogw_server::infrastructure::storage::config::{load_config, AppConfig};

/// Command-line arguments.  Every flag overrides the matching config value.
#[derive(Debug, Parser)]
#[command(
    name = "radiogw",
    about = "Bridges one AudioSocket TCP client to a half-duplex radio",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "RADIOGW_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, env = "RADIOGW_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "RADIOGW_PORT")]
    port: Option<u16>,

    /// ALSA device used for both capture and playback.
    #[arg(long, env = "RADIOGW_DEVICE")]
    device: Option<String>,

    /// Serial port whose RTS line keys the transmitter.
    #[arg(long, env = "RADIOGW_SERIAL_PORT")]
    serial_port: Option<String>,

    /// `tracing` filter used when `RUST_LOG` is unset.
    #[arg(long, env = "RADIOGW_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, cfg: &mut AppConfig) {
        if let Some(bind) = self.bind {
            cfg.network.bind_address = bind;
        }
        if let Some(port) = self.port {
            cfg.network.port = port;
        }
        if let Some(device) = self.device {
            cfg.audio.device = device;
        }
        if let Some(serial_port) = self.serial_port {
            cfg.ptt.serial_port = serial_port;
        }
        if let Some(level) = self.log_level {
            cfg.logging.log_level = level;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut cfg);
    cfg.validate().context("invalid configuration")?;

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.log_level)),
        )
        .init();

    info!("radiogw starting");

    // ── PTT line ──────────────────────────────────────────────────────────────
    let line = SerialControlLine::open(&cfg.ptt.serial_port, cfg.ptt.baud_rate)
        .with_context(|| format!("cannot open PTT serial port {}", cfg.ptt.serial_port))?;
    let ptt = Arc::new(PttController::new(Box::new(line), cfg.keying_delay()));

    // ── Audio backend ─────────────────────────────────────────────────────────
    let backend = audio::default_backend().context("no audio backend available")?;

    // ── Listener ──────────────────────────────────────────────────────────────
    let session_config = SessionConfig {
        audio: cfg.audio_params(),
        toggle_digit: cfg.toggle_digit(),
        debounce_interval: cfg.debounce_interval(),
        transmit_idle: cfg.transmit_idle(),
    };
    let coordinator = SessionCoordinator::new(backend, Arc::clone(&ptt), session_config);
    let listener = Listener::bind(cfg.listen_addr()?, coordinator)
        .context("failed to start listener")?;

    // Shutdown flag shared with the listener thread.
    let running = Arc::new(AtomicBool::new(true));
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let running_clone = Arc::clone(&running);
    let listener_thread = std::thread::Builder::new()
        .name("radiogw-listener".to_string())
        .spawn(move || {
            listener.serve(&running_clone);
            let _ = done_tx.send(());
        })
        .context("failed to spawn listener thread")?;

    info!("radiogw ready.  Press Ctrl-C to exit.");

    // ── Ctrl-C / listener exit ────────────────────────────────────────────────
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!("failed to listen for Ctrl-C: {e}"),
            }
        }
        _ = done_rx => {
            error!("listener stopped unexpectedly");
        }
    }
    running.store(false, Ordering::Relaxed);

    // A session may still be running; make sure the transmitter is unkeyed
    // before the process exits regardless.
    if let Err(e) = ptt.force_off() {
        error!("failed to release PTT on shutdown: {e}");
    }

    if listener_thread.is_finished() {
        let _ = listener_thread.join();
    }

    info!("radiogw stopped");
    Ok(())
}
