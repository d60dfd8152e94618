use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use drop_tint::config::Configuration;
use drop_tint::pipeline::Pipeline;
use drop_tint::processing::color::average_color;
use drop_tint::processing::decode::{ImageProcessor, ProcessorOptions};
use drop_tint::tasks::drop_zone::AppState;
use drop_tint::tasks::{viewer, watch as drop_folder};

#[derive(Debug, Parser)]
#[command(
    name = "drop-tint",
    version,
    about = "Drop an image, get its average color as the background"
)]
struct Args {
    /// Path to YAML config; built-in defaults are used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Treat images created in this directory as drops (overrides drop-directory)
    #[arg(long = "drop-dir", value_name = "DIR")]
    drop_dir: Option<PathBuf>,
    /// Run without a window; requires a drop directory
    #[arg(long)]
    headless: bool,
    /// Print the average color of FILE and exit
    #[arg(long, value_name = "FILE")]
    print: Option<PathBuf>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    // RUST_LOG wins; -v raises the default level
    let default = match verbosity {
        0 => "info,wgpu_core=warn,wgpu_hal=warn,naga=warn",
        1 => "debug,wgpu_core=warn,wgpu_hal=warn,naga=warn",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        drop_dir,
        headless,
        print,
        verbose,
    } = Args::parse();
    init_tracing(verbose);

    let mut cfg = match config.as_ref() {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if drop_dir.is_some() {
        cfg.drop_directory = drop_dir;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::debug!("configuration:\n{:#?}", cfg);

    let processor = Arc::new(ImageProcessor::new(ProcessorOptions::from(&cfg)));

    if let Some(path) = print {
        return print_average(&processor, path).await;
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let pipeline = Pipeline::spawn(&cfg, processor.clone(), cancel.clone());

    let mut tasks = JoinSet::new();
    if let Some(dir) = cfg.drop_directory.clone() {
        let to_drop_zone = pipeline.events.clone();
        let cancel = cancel.clone();
        let settle = cfg.drop_settle;
        tasks.spawn(async move {
            drop_folder::run(dir, settle, to_drop_zone, cancel)
                .await
                .context("drop folder task failed")
        });
    }

    if headless {
        if cfg.drop_directory.is_none() {
            cancel.cancel();
            bail!("--headless needs a drop directory (--drop-dir or drop-directory)");
        }
        tasks.spawn(log_states(pipeline.state.clone(), cancel.clone()));
        cancel.cancelled().await;
    } else {
        // The window owns the main thread until it closes or cancellation occurs
        if let Err(e) = viewer::run_windowed(
            cfg.clone(),
            processor,
            pipeline.events.clone(),
            pipeline.state.clone(),
            cancel.clone(),
        )
        .context("drop window failed")
        {
            tracing::error!("{e:?}");
        }
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    let last = pipeline.join().await?;
    tracing::info!(background = %last.background, "stopped");
    Ok(())
}

async fn print_average(processor: &Arc<ImageProcessor>, path: PathBuf) -> Result<()> {
    let loaded = {
        let processor = processor.clone();
        let load_path = path.clone();
        tokio::task::spawn_blocking(move || processor.load_path(&load_path))
            .await
            .context("decode worker failed")?
            .with_context(|| format!("failed to decode {}", path.display()))?
    };
    let color = average_color(loaded.pixels.as_bytes())
        .with_context(|| format!("failed to average {}", path.display()))?;
    println!("{}", color.css());
    Ok(())
}

async fn log_states(mut state: watch::Receiver<AppState>, cancel: CancellationToken) -> Result<()> {
    let mut last_background = state.borrow().background;
    let mut last_error: Option<String> = None;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                if snapshot.last_error != last_error {
                    if let Some(err) = snapshot.last_error.as_deref() {
                        tracing::warn!(error = err, "drop failed");
                    }
                    last_error = snapshot.last_error.clone();
                }
                if snapshot.background != last_background {
                    last_background = snapshot.background;
                    tracing::info!(background = %snapshot.background_css(), "background applied");
                }
            }
        }
    }
    Ok(())
}
