mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use easynlp::config::EasyConfig;
use easynlp::hub::HubOrigin;
use easynlp::result::DetailLevel;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "easynlp", version, about = "Embeddings from pretrained NLP models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed text and print the results as JSON
    Embed {
        /// Model key, hub record name, or local model directory
        #[arg(long, short, default_value = easynlp::hub::DEFAULT_MODEL)]
        model: String,
        /// Detail level: low, medium, or high
        #[arg(long, default_value = "low")]
        detail: DetailLevel,
        /// Texts to embed, one sentence each
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Search the model hubs
    Search {
        query: String,
        /// Restrict to one hub: flair or hf
        #[arg(long)]
        hub: Option<HubOrigin>,
    },
    /// Manage cached models
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download a Hugging Face model (ONNX export and tokenizer) into the cache
    Download { repo: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EasyConfig::load()?;

    // Log to stderr so stdout stays clean for JSON output.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Embed {
            model,
            detail,
            text,
        } => cli::embed(&config, &model, detail, text)?,
        Command::Search { query, hub } => cli::search(&config, &query, hub)?,
        Command::Model { action } => match action {
            ModelAction::Download { repo } => cli::model_download(&config, &repo)?,
        },
    }

    Ok(())
}
