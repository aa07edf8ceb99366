//! notiflow: notification lifecycle engine runtime binary.
//! Runs the engine in a single-writer task and speaks JSON lines on stdio.

use std::time::Duration;

use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use notiflow_core::config::EngineConfig;
use notiflow_engine::engine::Engine;
use notiflow_runtime::{bridge, cli, driver};

/// Stdin reads park a blocking thread that cannot be cancelled; don't wait
/// on it past this when shutting down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match args.command.unwrap_or(cli::Command::Run(cli::RunOpts::default())) {
        cli::Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
        cli::Command::Run(opts) => {
            init_tracing();
            tracing::info!("notiflow starting");

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let result = runtime.block_on(run_daemon(opts, config));
            runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
            result?;
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries the bridge protocol.
fn init_tracing() {
    let filter = std::env::var("NOTIFLOW_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

/// Wire bridge → driver → engine → bridge and wait for shutdown.
async fn run_daemon(opts: cli::RunOpts, config: EngineConfig) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    let source = bridge::BridgeSource::new(out_tx.clone());
    let engine = Engine::new(source, config);
    let (driver, handle) = driver::Driver::new(engine, opts.queue_capacity, cancel.clone());

    let forwarder = tokio::spawn(bridge::forward_snapshots(driver.subscribe(), out_tx));
    let writer = tokio::spawn(bridge::write_outbound(tokio::io::stdout(), out_rx));
    let reader = tokio::spawn(bridge::read_commands(
        BufReader::new(tokio::io::stdin()),
        handle,
        cancel.clone(),
    ));
    let mut driver_handle = tokio::spawn(driver.run());

    // Wait for shutdown signal (ctrl-c or SIGTERM) or end of input.
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => tokio::select! {
                    _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                },
                Err(e) => {
                    tracing::warn!("failed to register SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                    tracing::info!("received ctrl-c, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            tracing::info!("received ctrl-c, shutting down");
        }
    };

    let driver_done = tokio::select! {
        () = shutdown => {
            cancel.cancel();
            false
        }
        joined = &mut driver_handle => {
            if let Err(e) = joined {
                tracing::error!("engine driver failed: {e}");
            }
            true
        }
    };

    // Driver exit drops the engine (and its snapshot sender and bridge
    // source), which lets the forwarder and then the writer drain and stop.
    if !driver_done {
        if let Err(e) = driver_handle.await {
            tracing::error!("engine driver failed: {e}");
        }
    }
    reader.abort();
    forwarder.await.ok();
    match writer.await {
        Ok(Err(e)) => tracing::warn!("bridge writer error: {e}"),
        Err(e) => tracing::warn!("bridge writer task failed: {e}"),
        Ok(Ok(())) => {}
    }

    tracing::info!("notiflow stopped");
    Ok(())
}
