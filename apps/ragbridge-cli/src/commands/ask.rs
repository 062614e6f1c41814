//! Single question command

use anyhow::Result;
use ragbridge_core::{ChatMessage, SessionContext};
use serde::Serialize;

use super::chat::stream_answer;
use crate::context::AppContext;
use crate::output::{print_structured, OutputFormat};

#[derive(Serialize)]
struct Answer<'a> {
    question: &'a str,
    collection: Option<&'a str>,
    answer: String,
}

pub async fn run(
    ctx: &AppContext,
    message: &str,
    collection: Option<String>,
    use_kb: bool,
    include_system_prompt: bool,
) -> Result<()> {
    let session = ctx
        .generation()?
        .chat_session(&ctx.config.chat)
        .with_system_prompt(include_system_prompt);

    let session_ctx = match collection {
        Some(collection) => SessionContext::new().with_collection(collection),
        None => SessionContext::new(),
    }
    .with_knowledge_base(use_kb);

    let transcript = vec![ChatMessage::user(message)];
    let echo = ctx.format == OutputFormat::Text;
    let answer = stream_answer(&session, &transcript, &session_ctx, echo).await?;

    print_structured(
        &Answer {
            question: message,
            collection: session_ctx.active_collection(),
            answer,
        },
        ctx.format,
    )?;
    Ok(())
}
