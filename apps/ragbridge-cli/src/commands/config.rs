//! Configuration inspection commands

use anyhow::Result;
use colored::Colorize;

use crate::context::{default_config_path, AppContext};
use crate::output::{self, print_structured};
use crate::ConfigCommands;

pub fn run(ctx: &AppContext, cmd: &ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show_config(ctx),
        ConfigCommands::Path => {
            match default_config_path() {
                Some(path) => println!("{}", path.display()),
                None => anyhow::bail!("Could not determine config directory"),
            }
            Ok(())
        }
    }
}

fn show_config(ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    if print_structured(config, ctx.format)? {
        return Ok(());
    }

    match &ctx.source {
        Some(path) => println!("{}: {}", "Config file".bold(), path.display()),
        None => output::dimmed("No config file; using defaults and environment"),
    }
    println!();

    println!("{}", "Ingestion".bold().underline());
    println!("  {}: {}", "url".cyan(), config.ingestion.url);
    println!(
        "  {}: {}s",
        "request_timeout_secs".cyan(),
        config.ingestion.request_timeout_secs
    );

    println!("{}", "Generation".bold().underline());
    println!("  {}: {}", "url".cyan(), config.generation.url);
    println!("  {}: {}", "endpoint".cyan(), config.generation.endpoint);
    println!(
        "  {}: {}s",
        "stream_idle_timeout_secs".cyan(),
        config.generation.stream_idle_timeout_secs
    );

    let upload = &config.upload;
    println!("{}", "Upload".bold().underline());
    println!("  {}: {}", "default_mode".cyan(), upload.default_mode);
    println!("  {}: {}s", "blocking_timeout_secs".cyan(), upload.blocking_timeout_secs);
    println!(
        "  {}: every {}s, at most {} attempts",
        "polling".cyan(),
        upload.poll_interval_secs,
        upload.max_poll_attempts
    );
    println!(
        "  {}: {} / {}",
        "chunk_size / overlap".cyan(),
        upload.chunk_size,
        upload.chunk_overlap
    );
    println!("  {}: {}", "batch_concurrency".cyan(), upload.batch_concurrency);

    let chat = &config.chat;
    println!("{}", "Chat".bold().underline());
    println!("  {}: {}", "include_system_prompt".cyan(), chat.include_system_prompt);
    println!(
        "  {}: temperature {}, top_p {}, max_tokens {}",
        "sampling".cyan(),
        chat.temperature,
        chat.top_p,
        chat.max_tokens
    );
    println!(
        "  {}: reranker {}, vdb {}",
        "top_k".cyan(),
        chat.reranker_top_k,
        chat.vdb_top_k
    );

    Ok(())
}
