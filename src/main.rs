//! Command-line front end: one-shot translation or segmentation against the
//! configured hosted model. Results are printed as JSON on stdout.

use clap::{Parser, Subcommand};
use serde::Serialize;

use genrelay::{init_tracing, RelayConfig, RelayContext, RelayError};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Worker tasks executing upstream calls
    #[arg(long, default_value_t = 4)]
    workers: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a piece of text
    Translate {
        #[arg(long, default_value = "english")]
        from: String,
        #[arg(long)]
        to: String,
        text: String,
    },
    /// Extract structured fields from a job description
    Segment { description: String },
    /// Send one short translation to verify credentials and connectivity
    Probe,
    /// Print health and cache statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    let cli = Cli::parse();
    init_tracing();

    let config = RelayConfig::from_env()?.with_workers(cli.workers);
    let ctx = RelayContext::from_config(config)?;

    match cli.command {
        Commands::Translate { from, to, text } => {
            print_json(&ctx.translate(&text, &from, &to).await?)?;
        }
        Commands::Segment { description } => {
            print_json(&ctx.segment(&description).await?)?;
        }
        Commands::Probe => {
            let result = ctx.translate("Hello", "english", "spanish").await?;
            if result.is_error() {
                tracing::error!(reply = %result.translated_text, "probe failed");
            } else {
                tracing::info!(reply = %result.translated_text, "probe succeeded");
            }
            print_json(&result)?;
        }
        Commands::Stats => {
            print_json(&serde_json::json!({
                "health": ctx.health(),
                "cache": ctx.cache_stats(),
                "metrics": ctx.metrics_summary(),
            }))?;
        }
    }

    ctx.shutdown().await;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), RelayError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| RelayError::Config(format!("could not render output: {e}")))?;
    println!("{rendered}");
    Ok(())
}
