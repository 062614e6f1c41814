//! ragbridge CLI
//!
//! Manage knowledge-base collections, upload documents, and chat against a
//! retrieval-augmented generation backend.

mod commands;
mod context;
mod output;
mod telemetry;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use ragbridge_core::UploadMode;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::context::AppContext;
use crate::telemetry::init_telemetry;

#[derive(Parser)]
#[command(
    name = "ragbridge",
    version,
    about = "ragbridge - knowledge-base ingestion and streaming chat",
    long_about = "A command-line interface for a document-ingestion backend and a\n\
                  retrieval-augmented generation backend.\n\n\
                  Use this CLI to manage collections, upload documents, and ask\n\
                  questions answered from your documents."
)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, env = "RAGBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Ingestion backend URL, overriding the configuration
    #[arg(long, global = true)]
    ingestion_url: Option<String>,

    /// Generation backend URL, overriding the configuration
    #[arg(long, global = true)]
    generation_url: Option<String>,

    /// Output format (text, json, yaml)
    #[arg(
        long,
        global = true,
        default_value = "text",
        value_parser = ["text", "json", "yaml"]
    )]
    format: String,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage knowledge-base collections
    #[command(subcommand)]
    Collections(CollectionCommands),

    /// List, upload, and delete documents
    #[command(subcommand)]
    Documents(DocumentCommands),

    /// Start an interactive chat session
    Chat {
        /// Collection to answer from
        #[arg(short, long)]
        collection: Option<String>,

        /// Answer without the knowledge base
        #[arg(long)]
        no_kb: bool,

        /// Do not prepend the assistant directive
        #[arg(long)]
        no_system_prompt: bool,
    },

    /// Ask a single question and stream the answer
    Ask {
        /// The question to send
        message: String,

        /// Collection to answer from
        #[arg(short, long)]
        collection: Option<String>,

        /// Answer without the knowledge base
        #[arg(long)]
        no_kb: bool,

        /// Do not prepend the assistant directive
        #[arg(long)]
        no_system_prompt: bool,
    },

    /// Check generation backend health
    Health {
        /// Ask the backend to check its own dependencies
        #[arg(short, long)]
        dependencies: bool,
    },

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum CollectionCommands {
    /// List all collections
    List,
    /// Create a collection
    Create {
        /// Collection name
        name: String,
        /// Embedding dimension (defaults to the configured value)
        #[arg(short, long)]
        dimension: Option<u32>,
        /// Metadata field as name[:type[:description]]
        #[arg(long = "field")]
        fields: Vec<String>,
    },
    /// Delete a collection and all its documents
    Delete {
        /// Collection name
        name: String,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum DocumentCommands {
    /// List documents in a collection
    List {
        /// Collection name
        collection: String,
    },
    /// Upload files into a collection
    Upload {
        /// Collection name
        collection: String,
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Upload mode (blocking, async)
        #[arg(short, long)]
        mode: Option<UploadMode>,
        /// Maximum uploads in flight
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Delete documents by name
    Delete {
        /// Collection name
        collection: String,
        /// Document names
        #[arg(required = true)]
        names: Vec<String>,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Print the default configuration file path
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = init_telemetry(&cli.log_level, cli.json_logs) {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        return ExitCode::FAILURE;
    }

    let result = run(&cli).await;

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            if cli.verbose {
                for cause in e.chain().skip(1) {
                    eprintln!("{}: {}", "Caused by".yellow(), cause);
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        return commands::completions::run(*shell);
    }

    let ctx = AppContext::load(cli)?;

    match &cli.command {
        Commands::Collections(cmd) => commands::collections::run(&ctx, cmd).await,
        Commands::Documents(cmd) => commands::documents::run(&ctx, cmd).await,
        Commands::Chat {
            collection,
            no_kb,
            no_system_prompt,
        } => commands::chat::run(&ctx, collection.clone(), !no_kb, !no_system_prompt).await,
        Commands::Ask {
            message,
            collection,
            no_kb,
            no_system_prompt,
        } => {
            commands::ask::run(&ctx, message, collection.clone(), !no_kb, !no_system_prompt).await
        }
        Commands::Health { dependencies } => commands::health::run(&ctx, *dependencies).await,
        Commands::Config(cmd) => commands::config::run(&ctx, cmd),
        Commands::Completions { .. } => Ok(()),
    }
}
