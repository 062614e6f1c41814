//! CLI command implementations

pub mod ask;
pub mod chat;
pub mod collections;
pub mod completions;
pub mod config;
pub mod documents;
pub mod health;

use anyhow::Result;
use dialoguer::Confirm;

/// Ask before a destructive action unless `force` is set
pub(crate) fn confirm(prompt: &str, force: bool) -> Result<bool> {
    if force {
        return Ok(true);
    }
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}
