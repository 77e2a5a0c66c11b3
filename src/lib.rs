//! docvault - version-ordered document replication.
//!
//! Copies documents and their full version history from a rate-limited
//! document source into a natively-versioned object store, oldest version
//! first, recording a lineage row per version in SQLite.

#![allow(clippy::should_implement_trait)]

pub mod archive;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod http_client;
pub mod migrations;
pub mod models;
pub mod object_store;
pub mod rate_limit;
pub mod replication;
pub mod repository;
pub mod schema;
pub mod server;
pub mod source;
