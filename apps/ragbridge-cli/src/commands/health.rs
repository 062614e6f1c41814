//! Health check command

use anyhow::Result;
use colored::Colorize;

use crate::context::AppContext;
use crate::output::print_structured;

pub async fn run(ctx: &AppContext, dependencies: bool) -> Result<()> {
    let client = ctx.generation()?;
    let report = client.health(dependencies).await;

    if !print_structured(&report, ctx.format)? {
        let status_str = if report.healthy {
            "Healthy".green()
        } else {
            "Unhealthy".red()
        };

        println!("{}: {}", "Status".bold(), status_str);
        println!("{}: {}", "Backend".bold(), ctx.config.generation.url);
        if let Some(status) = report.status {
            println!("{}: {}", "HTTP status".bold(), status);
        }
        if let Some(reason) = &report.reason {
            println!("{}: {}", "Reason".bold(), reason);
        }
        if let Some(body) = &report.body {
            println!();
            println!("{}", serde_json::to_string_pretty(body)?);
        }
    }

    if !report.healthy {
        anyhow::bail!("generation backend is unhealthy");
    }
    Ok(())
}
