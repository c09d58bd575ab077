//! Command-line entry point: cut a time window out of an audio file.
//!
//! # Startup sequence
//!
//! 1. Parse arguments and initialise logging.
//! 2. Load [`AppConfig`] from disk (default on first run), apply overrides.
//! 3. Create the [`tokio`] runtime and the [`AudioWorkService`].
//! 4. Load the source (file path or `http(s)` URL) and request the window.
//! 5. Wait for the encoded clip or the first error, write the clip to disk
//!    and print a JSON summary.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use audio_work::{
    config::{AppConfig, AppPaths},
    AudioWorkService, EncodedResult, PipelineError,
};

/// Extract `[from, to)` seconds of channel 0 from an audio file and save it
/// as WAV.
#[derive(Debug, Parser)]
#[command(name = "audio-work", version, about)]
struct Cli {
    /// Audio file path or http(s) URL.
    source: String,

    /// Window start in seconds.
    #[arg(long, default_value_t = 0.0)]
    from: f64,

    /// Window end in seconds (exclusive).
    #[arg(long)]
    to: f64,

    /// Output file.  Defaults to a generated name in the data directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Settings file to use instead of the platform default.
    #[arg(long, env = "AUDIO_WORK_CONFIG")]
    config: Option<PathBuf>,

    /// Override the decode sample rate.
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Enable the pipeline's verbose diagnostics.
    #[arg(long)]
    debug: bool,
}

/// Whichever callback fires first.
enum Outcome {
    Encoded(EncodedResult),
    Failed(PipelineError),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => AppConfig::load().context("reading config")?,
    };
    if let Some(rate) = cli.sample_rate {
        config.pipeline.sample_rate = rate;
    }
    config.pipeline.debug_log |= cli.debug;
    config.validate()?;
    log::info!(
        "Config loaded: sample_rate={} Hz, max_decode_secs={}, bits_per_sample={}",
        config.pipeline.sample_rate,
        config.pipeline.max_decode_secs,
        config.encoder.bits_per_sample
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("creating tokio runtime")?;

    rt.block_on(run(cli, config))
}

async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let service = AudioWorkService::from_app_config(&config)?;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let encoded_tx = tx.clone();
    service
        .on_error(move |e| {
            let _ = tx.send(Outcome::Failed(e));
        })
        .on_encoded(move |clip| {
            let _ = encoded_tx.send(Outcome::Encoded(clip));
        });

    if cli.source.starts_with("http://") || cli.source.starts_with("https://") {
        service.load_from_url(&cli.source);
    } else {
        let bytes = tokio::fs::read(&cli.source)
            .await
            .with_context(|| format!("reading {}", cli.source))?;
        service.load_from_buffer(bytes);
    }
    service.extract(cli.from, cli.to);

    let clip = match rx.recv().await {
        Some(Outcome::Encoded(clip)) => clip,
        Some(Outcome::Failed(e)) => return Err(e.into()),
        None => bail!("pipeline closed without a result"),
    };
    service.destroy();

    let output = match cli.output {
        Some(path) => path,
        None => AppPaths::new().output_dir.join(clip.file_name()),
    };
    clip.write_to(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    log::info!("Wrote {} bytes to {}", clip.size, output.display());

    let summary = serde_json::json!({
        "source": cli.source,
        "from": cli.from,
        "to": cli.to,
        "output": output,
        "mime_type": clip.mime_type,
        "size": clip.size,
        "handle": clip.handle,
        "timestamp": clip.timestamp,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
