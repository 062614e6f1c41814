//! Interactive chat command

use anyhow::Result;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use ragbridge_core::{ChatMessage, Role, SessionContext};
use ragbridge_sdk::ChatSession;
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use crate::output;

/// Commands recognised inside the chat loop
#[derive(Debug, Clone, PartialEq, Eq)]
enum SlashCommand {
    Exit,
    Help,
    Clear,
    /// Switch collection; `None` clears it
    Use(Option<String>),
    Kb(bool),
    History,
    Unknown(String),
}

impl SlashCommand {
    fn parse(input: &str) -> Option<Self> {
        let lowered = input.to_lowercase();
        if matches!(lowered.as_str(), "exit" | "quit") {
            return Some(SlashCommand::Exit);
        }

        let rest = input.strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next();

        Some(match (name.as_str(), arg) {
            ("exit" | "quit", _) => SlashCommand::Exit,
            ("help", _) => SlashCommand::Help,
            ("clear", _) => SlashCommand::Clear,
            ("history", _) => SlashCommand::History,
            ("use", collection) => SlashCommand::Use(collection.map(str::to_string)),
            ("kb", Some("on")) => SlashCommand::Kb(true),
            ("kb", Some("off")) => SlashCommand::Kb(false),
            _ => SlashCommand::Unknown(input.to_string()),
        })
    }
}

pub async fn run(
    ctx: &AppContext,
    collection: Option<String>,
    use_kb: bool,
    include_system_prompt: bool,
) -> Result<()> {
    let session = ctx
        .generation()?
        .chat_session(&ctx.config.chat)
        .with_system_prompt(include_system_prompt);

    let mut session_ctx = match collection {
        Some(collection) => SessionContext::new().with_collection(collection),
        None => SessionContext::new(),
    }
    .with_knowledge_base(use_kb);
    let mut transcript: Vec<ChatMessage> = Vec::new();

    println!("{} chat with {}", "Starting".green(), ctx.config.generation.url.cyan());
    print_context(&session_ctx);
    println!("{}", "Type 'exit' or 'quit' to end the session.".dimmed());
    println!("{}", "Type '/help' for available commands.".dimmed());
    println!();

    loop {
        let prompt = match session_ctx.active_collection() {
            Some(collection) => format!("You [{}]", collection),
            None => "You".to_string(),
        };
        let input: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = SlashCommand::parse(input) {
            match command {
                SlashCommand::Exit => {
                    println!("{}", "Goodbye!".green());
                    break;
                }
                SlashCommand::Help => print_help(),
                SlashCommand::Clear => {
                    transcript.clear();
                    output::info("Conversation cleared");
                }
                SlashCommand::Use(collection) => {
                    switch_collection(&mut session_ctx, collection);
                    print_context(&session_ctx);
                }
                SlashCommand::Kb(enabled) => {
                    session_ctx = session_ctx.with_knowledge_base(enabled);
                    print_context(&session_ctx);
                }
                SlashCommand::History => show_history(&transcript),
                SlashCommand::Unknown(raw) => {
                    output::warning(&format!("Unknown command: {} (try /help)", raw))
                }
            }
            continue;
        }

        transcript.push(ChatMessage::user(input));
        println!();
        println!("{}", "Assistant".cyan().bold());

        match stream_answer(&session, &transcript, &session_ctx, true).await {
            Ok(answer) if !answer.is_empty() => transcript.push(ChatMessage::assistant(answer)),
            Ok(_) => {
                output::dimmed("(empty answer)");
                transcript.pop();
            }
            Err(e) => {
                eprintln!("{}: {}", "Error".red().bold(), e);
                transcript.pop();
            }
        }
        println!();
    }

    Ok(())
}

/// Send `transcript` and return the full answer, echoing deltas as they arrive.
///
/// Ctrl-C stops the answer and keeps what was received so far.
pub(crate) async fn stream_answer(
    session: &ChatSession,
    transcript: &[ChatMessage],
    session_ctx: &SessionContext,
    echo: bool,
) -> Result<String> {
    let cancel = CancellationToken::new();
    let params = session.default_params();

    let spinner = ProgressBar::new_spinner();
    if echo {
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
                .template("{spinner:.cyan} {msg}")?,
        );
        spinner.set_message("Thinking...");
        spinner.enable_steady_tick(Duration::from_millis(80));
    } else {
        spinner.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let opened = tokio::select! {
        result = session.send(transcript, &params, session_ctx, &cancel) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    spinner.finish_and_clear();

    let mut stream = match opened {
        Some(result) => result?,
        None => anyhow::bail!("Interrupted"),
    };

    let mut answer = String::new();
    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(Ok(delta)) => {
                    if echo {
                        print!("{}", delta);
                        stdout.flush()?;
                    }
                    answer.push_str(&delta);
                }
                Some(Err(e)) => {
                    if echo {
                        println!();
                    }
                    return Err(e.into());
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                if echo {
                    println!();
                }
                output::warning("Interrupted");
                break;
            }
        }
    }

    if echo {
        println!();
    }
    Ok(answer)
}

/// Point the session at another collection, keeping the knowledge-base toggle
fn switch_collection(session_ctx: &mut SessionContext, collection: Option<String>) {
    session_ctx.collection = collection;
}

fn print_context(session_ctx: &SessionContext) {
    let kb = if session_ctx.use_knowledge_base {
        "on".green()
    } else {
        "off".yellow()
    };
    let collection = session_ctx.collection.as_deref().unwrap_or("(none)");
    println!(
        "{}: {}  {}: {}",
        "Collection".bold(),
        collection.cyan(),
        "Knowledge base".bold(),
        kb
    );
}

fn print_help() {
    println!();
    println!("{}", "Available Commands:".yellow().bold());
    println!("  {}      - End the chat session", "/exit, /quit".cyan());
    println!("  {}             - Show this help message", "/help".cyan());
    println!("  {}            - Forget the conversation so far", "/clear".cyan());
    println!("  {} - Answer from another collection", "/use <collection>".cyan());
    println!("  {}       - Toggle the knowledge base", "/kb on|off".cyan());
    println!("  {}          - Show conversation history", "/history".cyan());
    println!();
}

fn show_history(transcript: &[ChatMessage]) {
    println!();
    println!("{}", "Conversation History:".yellow().bold());
    println!("{}", "=".repeat(50));

    if transcript.is_empty() {
        output::dimmed("(empty)");
    }

    for msg in transcript {
        let role_str = match msg.role {
            Role::User => "You".green(),
            Role::Assistant => "Assistant".cyan(),
            Role::System => "System".normal(),
        };
        println!("{}: {}", role_str.bold(), msg.content);
        println!();
    }
}
