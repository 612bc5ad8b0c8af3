use anyhow::Context;
use clap::Parser;
use pest_analyzer::analysis::Analyzer;
use pest_analyzer::cli::{AnalyzeArgs, Args, Command};
use pest_analyzer::config::{Config, PipelineConfig};
use pest_analyzer::server;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Serve(serve) => {
            let config = Config::from(serve);

            tracing::info!("Starting pest-analyzer v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!("Binding to {}:{}", config.host, config.port);

            server::run(config).await
        }
        Command::Analyze(analyze) => {
            tokio::task::spawn_blocking(move || analyze_file(analyze)).await?
        }
    }
}

/// Default output path: `<dir>/<stem>_analyzed.png`
fn default_output(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    image.with_file_name(format!("{}_analyzed.png", stem))
}

fn analyze_file(args: AnalyzeArgs) -> anyhow::Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.image));
    let config = PipelineConfig::from(args.pipeline);
    let analyzer = Analyzer::from_config(&config)?;

    let image = image::open(&args.image)
        .with_context(|| format!("Failed to open {}", args.image.display()))?;
    let result = analyzer.analyze(&image)?;

    result
        .annotated
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!("Annotated image written to {}", output.display());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.report())?);
        return Ok(());
    }

    if result.detections.is_empty() {
        println!("No pests detected.");
        return Ok(());
    }

    println!("{} pest(s) detected:", result.detections.len());
    for detection in &result.detections {
        let b = detection.bbox;
        println!(
            "  {} ({:.0}%) at [{:.0}, {:.0}, {:.0}, {:.0}]",
            detection.label,
            detection.confidence * 100.0,
            b.x1,
            b.y1,
            b.x2,
            b.y2
        );
        for advice in detection.label.recommendations() {
            println!("    - {}", advice);
        }
    }

    Ok(())
}
