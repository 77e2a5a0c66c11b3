//! Queue management commands.

use console::style;

use crate::cli::helpers::truncate;
use crate::config::Settings;
use crate::models::{QueueEntry, QueueStatus};

/// Add a document to the archive queue.
pub async fn cmd_queue_add(settings: &Settings, source_path: &str, rule: &str) -> anyhow::Result<()> {
    let queue = settings.create_db_context().queue();

    if let Some(existing) = queue.get_by_source_path(source_path).await? {
        println!(
            "{} Already queued as {} ({})",
            style("!").yellow(),
            existing.id,
            existing.status
        );
        return Ok(());
    }

    let entry = QueueEntry::new(source_path, rule);
    queue.insert(&entry).await?;
    println!("{} Queued {}", style("✓").green(), entry.id);
    Ok(())
}

/// List queue entries.
pub async fn cmd_queue_list(
    settings: &Settings,
    rule: Option<&str>,
    status: Option<&str>,
) -> anyhow::Result<()> {
    let status = match status {
        Some(s) => Some(
            QueueStatus::from_str(s).ok_or_else(|| anyhow::anyhow!("Unknown status '{}'", s))?,
        ),
        None => None,
    };

    let entries = settings
        .create_db_context()
        .queue()
        .list(rule, status)
        .await?;

    if entries.is_empty() {
        println!("{} No queue entries", style("!").yellow());
        return Ok(());
    }

    println!("\n{}", style("Archive Queue").bold());
    println!("{}", "-".repeat(100));
    println!(
        "{:<36} {:<11} {:<7} {:<12} Source Path",
        "ID", "Status", "Retries", "Rule"
    );
    println!("{}", "-".repeat(100));

    for entry in entries {
        println!(
            "{:<36} {:<11} {:<7} {:<12} {}",
            entry.id,
            entry.status.as_str(),
            entry.retry_count,
            truncate(&entry.rule_id, 12),
            entry.source_path
        );
        if !entry.log.is_empty() {
            println!("{:>36} {}", style("↳").dim(), style(truncate(&entry.log, 90)).dim());
        }
    }

    Ok(())
}

/// Reset an entry to `new`.
pub async fn cmd_queue_reset(settings: &Settings, id: &str) -> anyhow::Result<()> {
    let queue = settings.create_db_context().queue();
    if queue.reset(id).await? {
        println!("{} Reset {}", style("✓").green(), id);
    } else {
        println!("{} Queue entry '{}' not found", style("✗").red(), id);
    }
    Ok(())
}
