//! Judgment Day CLI
//!
//! Serves the quiz API and prepares theme descriptions from reference images.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use judgment_genai::{FluxKontextClient, GeminiClient};
use judgment_orchestrator::{create_router, read_api_key, AppState, Config, Image, ImageFormat};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Judgment Day - Code or Chaos photo quiz
///
/// Captures a photo, transforms it after every answer and renders a verdict.
#[derive(Parser, Debug)]
#[command(name = "judgment")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: judgment.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Serve the quiz API (the default)
    Serve {
        /// Port for the HTTP API server
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Describe reference images and print the descriptions as a JSON array
    DescribeTheme {
        /// Reference images (PNG, JPEG, GIF or WebP)
        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    let result = match args.command.unwrap_or(Command::Serve { port: DEFAULT_PORT }) {
        Command::Serve { port } => serve(args.config.as_deref(), port).await,
        Command::DescribeTheme { images } => describe_theme(args.config.as_deref(), &images).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Runs the HTTP server until Ctrl+C.
async fn serve(config_path: Option<&str>, port: u16) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    print_config(&config);

    let transform_key = read_api_key(&config.transform.api_key_env)?;
    let summary_key = read_api_key(&config.summary.api_key_env)?;
    let transformer = Arc::new(FluxKontextClient::from_config(&config.transform, transform_key));
    let summarizer = Arc::new(GeminiClient::from_config(&config.summary, summary_key));

    let router = create_router(AppState::from_config(config, transformer, summarizer));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    Ok(())
}

/// Describes each reference image and prints a JSON array.
async fn describe_theme(config_path: Option<&str>, images: &[PathBuf]) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let api_key = read_api_key(&config.summary.api_key_env)?;
    let client = GeminiClient::from_config(&config.summary, api_key);

    let mut descriptions = Vec::with_capacity(images.len());
    for path in images {
        let image = load_image(path).await?;
        tracing::info!(path = %path.display(), bytes = image.len(), "Describing reference image");
        let description = client.describe_reference(&image).await.map_err(|e| {
            anyhow::anyhow!("Failed to describe '{}': {e}", path.display())
        })?;
        descriptions.push(description);
    }

    println!("{}", serde_json::to_string_pretty(&descriptions)?);
    Ok(())
}

/// Reads an image file, taking the format from its extension.
async fn load_image(path: &Path) -> anyhow::Result<Image> {
    let format = ImageFormat::from_path(path).ok_or_else(|| {
        anyhow::anyhow!(
            "Unsupported image '{}'\n\nSuggestion: Use a .png, .jpg, .gif or .webp file",
            path.display()
        )
    })?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {e}", path.display()))?;
    if bytes.is_empty() {
        anyhow::bail!("Image '{}' is empty", path.display());
    }
    Ok(Image::new(format, bytes))
}

/// Loads configuration from the specified path or the current directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn print_config(config: &Config) {
    let bank = config.question_bank();
    println!("Configuration loaded:");
    println!(
        "  Questions: {} per session from {}{}",
        bank.session_len(),
        bank.questions().len(),
        if config.shuffle_questions { " (shuffled)" } else { "" }
    );
    println!(
        "  Themes: {} / {}",
        config.themes.code.name, config.themes.chaos.name
    );
    println!("  Transform model: {}", config.transform.model);
    println!("  Summary model: {}", config.summary.model);
    println!("  Lead file: {}", config.lead_file);
}
