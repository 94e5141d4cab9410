use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use truthsync_core::{
    backend::ArticleBackend,
    client::ArticleClient,
    config::Config,
    model::{AnalysisOutcome, AnalysisRequest},
    normalizer::compose_context,
    retry::Retrying,
    stream::AnalysisProgress,
};

#[derive(Parser)]
#[command(author, version, about = "TruthSync backend smoke tool", long_about = None)]
struct Cli {
    /// Path to a JSON or TOML config file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the backend health endpoint
    Health,
    /// Generate an article from a captured image (prints deltas live)
    Analyze {
        /// Path to a JPEG image
        #[arg(long)]
        image: PathBuf,
        /// Free-text note accompanying the capture
        #[arg(short, long)]
        note: Option<String>,
        /// Human-readable location description
        #[arg(long)]
        location: Option<String>,
        /// Device orientation description
        #[arg(long)]
        orientation: Option<String>,
        /// Use the non-streaming endpoint instead
        #[arg(long)]
        once: bool,
    },
    /// Fetch the server-side record of a previous request
    Status {
        #[arg(long)]
        request_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    let client = ArticleClient::from_config(&cfg)?;

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            println!(
                "{} (model_loaded: {})",
                health.status.as_deref().unwrap_or("unknown"),
                health.model_loaded
            );
        }
        Commands::Analyze {
            image,
            note,
            location,
            orientation,
            once,
        } => {
            let image_bytes = std::fs::read(&image)?;
            let context = compose_context(
                note.as_deref(),
                location.as_deref(),
                orientation.as_deref(),
            );
            let req = AnalysisRequest::new(image_bytes, context);
            let backend = Retrying::new(client, cfg.retry.clone());

            let outcome = if once {
                backend.analyze_once(&req).await
            } else {
                // The callback receives the cumulative accumulator; print
                // only what is new since the last event.
                let mut printed = 0usize;
                backend
                    .analyze(&req, &mut move |p: &AnalysisProgress| {
                        if p.text.len() > printed {
                            print!("{}", &p.text[printed..]);
                            io::stdout().flush().ok();
                            printed = p.text.len();
                        }
                    })
                    .await
            };

            match outcome {
                AnalysisOutcome::Completed { final_text } => {
                    if once {
                        println!("{final_text}");
                    } else {
                        println!();
                    }
                }
                AnalysisOutcome::Failed { reason } => {
                    eprintln!("[{}] {}", reason.code(), reason);
                    std::process::exit(1);
                }
            }
        }
        Commands::Status { request_id } => {
            let info = client.analysis_status(&request_id).await?;
            println!(
                "{} progress={} {}",
                info.status,
                info.progress.map_or("-".to_string(), |p| p.to_string()),
                info.message.unwrap_or_default()
            );
        }
    }

    Ok(())
}
