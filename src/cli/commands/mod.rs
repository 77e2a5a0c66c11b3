//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod archive;
mod init;
mod queue;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "docvault")]
#[command(about = "Version-ordered document replication into versioned object storage")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Manage the archive queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Archive queued documents into the object store
    Archive {
        /// Destination country code
        #[arg(long)]
        country: String,
        /// Document identifiers (queue source paths)
        #[arg(required = true)]
        document_ids: Vec<String>,
        /// Only replicate the latest version of each document
        #[arg(long)]
        latest_only: bool,
        /// Delete each document from the source once archived
        #[arg(long)]
        delete_source: bool,
    },

    /// Start the HTTP batch entry point
    Serve {
        /// Address to bind: port, host, or host:port
        #[arg(short, long, default_value = "127.0.0.1:3030")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Queue a document for archiving
    Add {
        /// Source path of the document
        source_path: String,
        /// Rule that selected the document
        #[arg(short, long)]
        rule: String,
    },
    /// List queue entries
    List {
        /// Only entries for this rule
        #[arg(short, long)]
        rule: Option<String>,
        /// Only entries with this status (new, success, failed, restricted)
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Put an entry back to 'new' so it is processed again
    Reset {
        /// Queue entry ID
        id: String,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    };
    let (settings, _config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Queue { command } => match command {
            QueueCommands::Add { source_path, rule } => {
                queue::cmd_queue_add(&settings, &source_path, &rule).await
            }
            QueueCommands::List { rule, status } => {
                queue::cmd_queue_list(&settings, rule.as_deref(), status.as_deref()).await
            }
            QueueCommands::Reset { id } => queue::cmd_queue_reset(&settings, &id).await,
        },
        Commands::Archive {
            country,
            document_ids,
            latest_only,
            delete_source,
        } => {
            archive::cmd_archive(
                &settings,
                &country,
                &document_ids,
                latest_only,
                delete_source,
            )
            .await
        }
        Commands::Serve { bind } => serve::cmd_serve(&settings, &bind).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_archive_command() {
        let cli = Cli::try_parse_from([
            "docvault",
            "archive",
            "--country",
            "US",
            "--latest-only",
            "https://h/t/legal_c/a.pdf",
            "https://h/t/legal_c/b.pdf",
        ])
        .unwrap();
        match cli.command {
            Commands::Archive {
                country,
                document_ids,
                latest_only,
                delete_source,
            } => {
                assert_eq!(country, "US");
                assert_eq!(document_ids.len(), 2);
                assert!(latest_only);
                assert!(!delete_source);
            }
            _ => panic!("expected archive command"),
        }
    }

    #[test]
    fn test_archive_requires_ids() {
        assert!(Cli::try_parse_from(["docvault", "archive", "--country", "US"]).is_err());
    }
}
