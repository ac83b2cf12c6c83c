//! Command-line entry point.
//!
//! Usage:
//!   mtool-deepl-translator                         # uses ./config.json
//!   mtool-deepl-translator --config my.json --resume
//!   mtool-deepl-translator --dry-run               # count texts/characters only
//!   mtool-deepl-translator --usage                 # show DeepL quota and exit
//!
//! The API key may come from the config file or DEEPL_API_KEY (a .env file is read).

use anyhow::{Context, Result};
use clap::Parser;
use mtool_deepl_translator::config::Config;
use mtool_deepl_translator::deepl::DeepLClient;
use mtool_deepl_translator::translator::{RunOptions, Translator};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "mtool-deepl-translator")]
#[command(version)]
#[command(about = "Translate MTool JSON exports from Japanese to English with DeepL")]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Override input_file from the config
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Override output_file from the config
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep translations already present in the output file
    #[arg(long)]
    resume: bool,

    /// Report what would be translated without calling DeepL or writing files
    #[arg(long, conflicts_with = "usage")]
    dry_run: bool,

    /// Print DeepL character usage and exit
    #[arg(long)]
    usage: bool,

    /// Debug logging (also logs every translated string)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file (optional)
    let _ = dotenvy::dotenv();

    let directive = if cli.verbose {
        "mtool_deepl_translator=debug"
    } else {
        "mtool_deepl_translator=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    let mut config = Config::load(&cli.config)?;
    if let Some(input) = cli.input {
        config.input_file = input;
    }
    if let Some(output) = cli.output {
        config.output_file = output;
    }
    if cli.usage {
        config.validate_api().context("Invalid configuration")?;
    } else {
        config.validate().context("Invalid configuration")?;
    }

    info!(
        "DeepL {} -> {} via {}",
        config.source_language,
        config.target_language,
        config.api_base_url()
    );

    if cli.usage {
        let usage = DeepLClient::new(&config)?
            .usage()
            .await
            .context("Failed to fetch DeepL usage")?;
        println!(
            "DeepL usage: {} / {} characters ({} remaining)",
            usage.character_count,
            usage.character_limit,
            usage.remaining()
        );
        return Ok(());
    }

    let translator = Translator::new(config)?;

    if !cli.dry_run {
        // Informational only; a failing usage call must not block the run
        match translator.client().usage().await {
            Ok(usage) => info!(
                "DeepL quota: {} of {} characters used",
                usage.character_count, usage.character_limit
            ),
            Err(e) => warn!("Could not fetch DeepL usage: {}", e),
        }
    }

    let options = RunOptions {
        resume: cli.resume,
        dry_run: cli.dry_run,
    };
    let summary = translator.run(&options).await?;

    if summary.dry_run {
        println!(
            "Dry run: {} of {} entries would be sent to DeepL ({} characters)",
            summary.pending, summary.report.entries, summary.pending_characters
        );
    } else {
        println!("Translation complete! Saved to {}", summary.output_file.display());
        println!("{}", summary.report);
    }

    Ok(())
}
