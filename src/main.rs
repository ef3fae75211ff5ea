use anyhow::{Context, Result};
use ecgstream::core::PipelineConfig;
use ecgstream::engine::SignalPipeline;
use ecgstream::sinks::LogRenderer;
use log::info;
use std::env;
use std::time::Duration;

/// Usage: `ecgstream [config.json] [seconds]`
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);

    let config = match args.next() {
        Some(path) => PipelineConfig::load(&path)?,
        None => PipelineConfig::default(),
    };
    let run_for = match args.next() {
        Some(secs) => secs
            .parse::<f64>()
            .context(format!("Invalid run duration: {}", secs))?,
        None => 5.0,
    };

    info!("config: {:?}", config);

    let mut pipeline = SignalPipeline::from_config(config, LogRenderer::new())?;
    pipeline.start().await?;

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs_f64(run_for.max(0.0))) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }

    let report = pipeline.shutdown().await?;

    println!("{}", pipeline.get_monitor().generate_report());
    println!(
        "wrote {} records to {:?} ({} evicted before drain)",
        report.records_written,
        pipeline.config().output_path,
        report.persistence_channel.evicted
    );

    Ok(())
}
