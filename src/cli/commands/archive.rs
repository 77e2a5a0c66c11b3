//! Archive command.

use console::style;
use tokio_util::sync::CancellationToken;

use crate::archive::ArchiveOptions;
use crate::cli::helpers::{build_dispatcher, cancel_on_ctrl_c};
use crate::config::Settings;

/// Archive a batch of documents and print one line per outcome.
pub async fn cmd_archive(
    settings: &Settings,
    country: &str,
    document_ids: &[String],
    latest_only: bool,
    delete_source: bool,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    settings.create_db_context().init_schema().await?;

    let dispatcher = build_dispatcher(settings)?;
    let options = ArchiveOptions {
        replicate_all_versions: settings.replicate_all_versions && !latest_only,
        delete_source_after: settings.delete_source_after || delete_source,
    };

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    println!(
        "{} Archiving {} document(s) to {}",
        style("→").cyan(),
        document_ids.len(),
        country.to_uppercase()
    );

    let outcomes = dispatcher
        .process_batch(document_ids, country, options, &cancel)
        .await?;

    let mut failed = 0;
    for outcome in &outcomes {
        if outcome.is_success() {
            println!(
                "  {} [{}] {} {}",
                style("✓").green(),
                outcome.return_code,
                outcome.source_path,
                style(&outcome.message).dim()
            );
        } else {
            failed += 1;
            println!(
                "  {} [{}] {} {}",
                style("✗").red(),
                outcome.return_code,
                outcome.source_path,
                outcome.error.as_deref().unwrap_or("")
            );
        }
    }

    println!(
        "{} {} succeeded, {} failed",
        style("→").cyan(),
        outcomes.len() - failed,
        failed
    );

    Ok(())
}
