//! Initialize command.

use console::style;

use crate::config::Settings;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let ctx = settings.create_db_context();
    let applied = ctx.init_schema().await?;
    for name in &applied {
        println!("  {} Applied migration {}", style("✓").green(), name);
    }

    if settings.source_base_url.is_none() {
        println!(
            "{} No document source configured. Set source.base_url in docvault.toml or DOCVAULT_SOURCE_URL",
            style("!").yellow()
        );
    }

    println!(
        "{} Initialized docvault in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  Objects: {}", settings.object_store_dir.display());

    Ok(())
}
