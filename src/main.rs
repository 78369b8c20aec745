use std::path::Path;
use std::time::Duration;

use d_coord::file_io::open_file_for_append;
use d_coord::ConfigData;
use d_coord::Error;
use d_coord::LoggingConfig;
use d_coord::Result;
use d_coord::Settings;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&settings.logging)?;

    // Initializing Shutdown Signal
    let (graceful_tx, mut graceful_rx) = watch::channel(());

    let data = ConfigData::new(settings.configuration.clone());
    let local_file = settings.configuration.local_file.clone();
    if !data.load_file(&local_file)? {
        error!("bootstrap configuration {:?} could not be loaded", local_file);
        return Err(Error::Fatal(format!(
            "bootstrap configuration {} could not be loaded",
            local_file.display()
        )));
    }
    info!(
        "configuration version {} served by {:?}",
        data.version(),
        data.servers()
    );

    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    info!("Application started. Waiting for CTRL+C signal...");
    loop {
        let period = data.refresh_period();
        tokio::select! {
            _ = graceful_rx.changed() => {
                info!("stopping configuration refresh");
                break;
            }
            _ = sleep(period) => {
                refresh(&data, &local_file);
            }
        }
    }

    println!("Exiting program.");
    Ok(())
}

fn refresh(
    data: &ConfigData,
    local_file: &Path,
) {
    let before = data.version();
    match data.load_file(local_file) {
        Ok(true) => {
            if data.version() != before {
                info!("configuration moved to version {}", data.version());
            }
        }
        Ok(false) => warn!("keeping previous configuration, {:?} was not reloaded", local_file),
        Err(e) => error!("reloading {:?} failed: {}", local_file, e),
    }
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

fn init_observability(logging: &LoggingConfig) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(&logging.log_dir.join("d-coord.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(logging.env_filter());
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(logging.env_filter());
    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(guard)
}
