//! img2html CLI
//!
//! Command-line interface for extracting text and visual elements from an
//! image into an HTML report, or serving the same pipeline over HTTP.
//!
//! Copyright (c) 2025 Michael A Wright

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use core_pipeline::{Pipeline, PipelineConfig, TesseractConfig, TracingSink, Upload};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nhost:   ",
    env!("BUILT_HOST"),
    "\ncommit: ",
    env!("BUILT_GIT_COMMIT_HASH"),
    "\nbuilt:  ",
    env!("BUILT_TIME_UTC"),
);

#[derive(Parser)]
#[command(name = "img2html")]
#[command(version = built_info::PKG_VERSION, long_version = LONG_VERSION)]
#[command(about = "Extract text and visual elements from an image into an HTML report", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run OCR and element segmentation on one image and write the report
    Extract {
        /// Input image (jpg, jpeg or png)
        #[arg(short, long)]
        input: PathBuf,

        /// Report file
        #[arg(short, long, default_value = "output.html")]
        output: PathBuf,

        /// Inline elements as data URIs instead of linking to files
        #[arg(long)]
        embed: bool,

        /// Keep the request directory (input copy and element crops)
        #[arg(long)]
        keep: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Serve the upload page and REST API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// Tesseract executable
    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,

    /// OCR language
    #[arg(long, default_value = "eng")]
    lang: String,

    /// Directory containing Tesseract traineddata files
    #[arg(long)]
    tessdata: Option<PathBuf>,

    /// Minimum contour area in pixels² for a visual element
    #[arg(long, default_value_t = core_pipeline::config::DEFAULT_MIN_AREA)]
    min_area: f64,

    /// Parent directory for per-request temporary files
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

impl EngineArgs {
    fn into_config(self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            work_root: self.work_dir.unwrap_or(defaults.work_root),
            min_area: self.min_area,
            tesseract: TesseractConfig {
                command: self.tesseract,
                language: self.lang,
                data_path: self.tessdata,
            },
        }
    }
}

fn pipeline_from(engine: EngineArgs) -> Result<Pipeline> {
    let config = engine.into_config();
    tracing::debug!("Pipeline config: {}", serde_json::to_string(&config)?);
    Ok(Pipeline::from_config(config))
}

fn extract(
    input: PathBuf,
    output: PathBuf,
    embed: bool,
    keep: bool,
    engine: EngineArgs,
) -> Result<()> {
    let pipeline = pipeline_from(engine)?;
    let upload = Upload::from_path(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let extraction = pipeline.run(&upload, &TracingSink)?;

    println!("Extracted text:\n{}", extraction.text);
    println!("Visual elements: {}", extraction.elements.len());
    for element in &extraction.elements {
        println!(
            "  [{}] {}x{} at ({}, {}) -> {}",
            element.index,
            element.bbox.width,
            element.bbox.height,
            element.bbox.x,
            element.bbox.y,
            element.path.display()
        );
    }

    let html = if embed {
        extraction.embedded_html()?
    } else {
        extraction.html.clone()
    };
    std::fs::write(&output, html)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Report written to {}", output.display());

    if keep {
        println!("Request files kept in {}", extraction.request_dir().display());
        return Ok(());
    }
    if !embed && !extraction.elements.is_empty() {
        tracing::warn!("Element files are being removed; use --embed or --keep to view them");
    }
    extraction
        .cleanup()
        .context("Failed to remove temporary files")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            input,
            output,
            embed,
            keep,
            engine,
        } => tokio::task::spawn_blocking(move || extract(input, output, embed, keep, engine))
            .await
            .context("Extraction task panicked")?,
        Commands::Serve { host, port, engine } => {
            let pipeline = pipeline_from(engine)?;
            img2html_server::serve(SocketAddr::new(host, port), pipeline).await
        }
    }
}
