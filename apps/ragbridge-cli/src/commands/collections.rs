//! Collection management commands

use anyhow::Result;
use colored::Colorize;
use ragbridge_core::FieldDescriptor;
use tabled::{Table, Tabled};

use super::confirm;
use crate::context::AppContext;
use crate::output::{self, print_structured};
use crate::CollectionCommands;

pub async fn run(ctx: &AppContext, cmd: &CollectionCommands) -> Result<()> {
    match cmd {
        CollectionCommands::List => list_collections(ctx).await,
        CollectionCommands::Create {
            name,
            dimension,
            fields,
        } => create_collection(ctx, name, *dimension, fields).await,
        CollectionCommands::Delete { name, force } => delete_collection(ctx, name, *force).await,
    }
}

async fn list_collections(ctx: &AppContext) -> Result<()> {
    let collections = ctx.knowledge_base()?.list_collections().await?;

    if print_structured(&collections, ctx.format)? {
        return Ok(());
    }

    if collections.is_empty() {
        output::dimmed("No collections found.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct CollectionRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Dimension")]
        dimension: String,
        #[tabled(rename = "Metadata fields")]
        fields: String,
    }

    let rows: Vec<CollectionRow> = collections
        .iter()
        .map(|c| CollectionRow {
            name: c.name.clone(),
            dimension: c
                .embedding_dimension
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            fields: c
                .metadata_schema
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}

async fn create_collection(
    ctx: &AppContext,
    name: &str,
    dimension: Option<u32>,
    fields: &[String],
) -> Result<()> {
    let schema = fields
        .iter()
        .map(|raw| parse_field(raw))
        .collect::<Result<Vec<_>>>()?;

    let message = ctx
        .knowledge_base()?
        .create_collection(name, dimension, &schema)
        .await?;

    output::success(&format!("Created collection {}", name.cyan()));
    if let Some(message) = message {
        output::dimmed(&message);
    }
    Ok(())
}

async fn delete_collection(ctx: &AppContext, name: &str, force: bool) -> Result<()> {
    let prompt = format!("Delete collection '{}' and all of its documents?", name);
    if !confirm(&prompt, force)? {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    ctx.knowledge_base()?.delete_collection(name).await?;
    output::success(&format!("Deleted collection {}", name.cyan()));
    Ok(())
}

/// Parse `name[:type[:description]]`
fn parse_field(raw: &str) -> Result<FieldDescriptor> {
    let mut parts = raw.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        anyhow::bail!("Invalid field '{}': name must not be empty", raw);
    }

    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    Ok(FieldDescriptor {
        name: name.to_string(),
        field_type: parts.next().and_then(non_empty),
        description: parts.next().and_then(non_empty),
    })
}
