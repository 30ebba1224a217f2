//! TriviaShorts CLI - Trivia Video Generator
//!
//! Fetches a round of trivia questions, narrates them and renders a
//! vertical quiz video ready for short-form platforms.

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use triviashorts_core::{
    Config, FfmpegBackend, FfprobeProbe, HttpTransport, KokoroEngine, PipelineEvent,
    TriviaError, TriviaPipeline,
};

#[derive(Parser)]
#[command(
    name = "triviashorts",
    version,
    about = "Trivia Video Generator - Turn trivia questions into narrated shorts",
    long_about = "Fetches multiple-choice questions from the Open Trivia Database, narrates them with a local TTS model and renders a 1080x1920 quiz video with ffmpeg."
)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of questions in the video
    #[arg(short = 'n', long, value_name = "N")]
    amount: Option<u32>,

    /// Use this category id instead of a random one
    #[arg(long, value_name = "ID")]
    category: Option<u32>,

    /// Output root (audio/, videos/ and the fixed assets live here)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// TTS voice id
    #[arg(long, value_name = "VOICE")]
    voice: Option<String>,

    /// List the available English voices and exit
    #[arg(long)]
    list_voices: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    // Load environment variables (RUST_LOG) from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(()) => {}
        Err(TriviaError::NoTrivia) => {
            eprintln!("{}", "Failed to fetch trivia. Exiting.".red().bold());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<(), TriviaError> {
    if cli.list_voices {
        println!("{}", "Loading TTS model...".dimmed());
        let engine = KokoroEngine::new().await?;
        println!("{}", "Available voices:".bold());
        println!("{}", engine.format_available_voices());
        return Ok(());
    }

    let config = load_config(cli)?;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  TriviaShorts - Trivia Video Generator".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!(
        "{} {}",
        "Questions:".bold(),
        config.api.amount.to_string().bright_white()
    );
    println!("{} {}", "Voice:".bold(), config.voice.voice.bright_white());
    println!(
        "{} {}",
        "Output:".bold(),
        config.paths.video_dir().display().to_string().bright_white()
    );
    println!();

    let transport = Arc::new(HttpTransport::new(&config.api)?);
    let backend = FfmpegBackend::new(config.style.clone())?;
    let probe = FfprobeProbe;

    println!("{}", "Loading TTS model...".dimmed());
    let mut engine = KokoroEngine::new().await?;
    engine.validate_voice(&config.voice.voice)?;

    let summary = TriviaPipeline::new(config, transport, &mut engine, &probe, &backend)
        .with_callback(create_console_callback())
        .run()
        .await?;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!(
            "  {} questions from {} rendered as {} segments.",
            summary.item_count, summary.category, summary.segment_count
        )
        .bright_green()
        .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    Ok(())
}

/// Read the config file (if any) and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config, TriviaError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(amount) = cli.amount {
        config.api.amount = amount;
    }
    if let Some(category) = cli.category {
        config.api.category = Some(category);
    }
    if let Some(dir) = &cli.output_dir {
        config.paths.output_dir = dir.clone();
    }
    if let Some(voice) = &cli.voice {
        config.voice.voice = voice.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "triviashorts_core=debug,warn"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Create a callback that prints pipeline events to the console.
fn create_console_callback() -> Box<dyn Fn(PipelineEvent) + Send + Sync> {
    Box::new(move |event| match event {
        PipelineEvent::StageStarted(stage) => {
            println!();
            println!("{}", format!("▶ {}", stage).bright_magenta().bold());
            println!("{}", "─".repeat(70).dimmed());
        }
        PipelineEvent::CategorySelected {
            label,
            category_id,
            url,
        } => {
            println!(
                "  {} {} {}",
                "Category:".bold(),
                label.bright_cyan().bold(),
                format!("(#{})", category_id).dimmed()
            );
            println!("  {}", url.dimmed());
        }
        PipelineEvent::TriviaFetched { count } => {
            println!("  {} questions fetched", count.to_string().bright_white());
        }
        PipelineEvent::AudioSynthesized { files } => {
            println!("  {} narration files written", files.to_string().bright_white());
        }
        PipelineEvent::SegmentsComposed { count } => {
            println!("  {} segments composed", count.to_string().bright_white());
        }
        PipelineEvent::VideoSaved { path } => {
            println!(
                "  {} {}",
                "Video saved at".green(),
                path.display().to_string().bright_green().bold()
            );
        }
        PipelineEvent::AudioDeleted { path } => {
            println!("  {}", format!("Deleted audio file: {}", path.display()).dimmed());
        }
        PipelineEvent::Finished => {
            // Handled in main
        }
    })
}
