//! # Harvester
//!
//! Continuously mirrors the messages of one public channel into a local
//! database, polling faster while the channel is busy and backing off while
//! it is quiet.
//!
//! ## Architecture
//!
//! ```text
//! AuthGate ─ready─▶ Poller ─cycle─▶ Ingestor: SourceClient → Transformer → Store
//! ```
//!
//! - [`source`]: session and history access through a client gateway
//! - [`transform`]: raw items to stored records
//! - [`store`]: SQLite persistence layer
//! - [`poller`]: adaptive scheduling loop
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the session handshake and harvest until Ctrl-C
//! harvester run
//!
//! # Deliver the verification code from another terminal
//! harvester auth 12345
//!
//! # Browse what was stored
//! harvester list --page 1
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// source client, auth gate and ingestor.
pub mod app;

/// Readiness gate in front of the upstream session.
pub mod auth;

/// Command-line interface using clap.
///
/// - `run` - Harvest until SIGINT/SIGTERM
/// - `stop` / `status` - Control and inspect a running instance
/// - `auth <code>` - Complete authentication
/// - `poll` - Run one ingestion cycle
/// - `list` - Page through stored messages
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/harvester/config.toml`, with credentials
/// overridable from the environment.
pub mod config;

/// Process lifecycle: PID file, signal handling, start/stop/status.
pub mod daemon;

/// Core domain models.
///
/// - [`Channel`](domain::Channel): the harvested channel
/// - [`Message`](domain::Message): one stored record
/// - [`RawItem`](domain::RawItem): an item as the source returns it
pub mod domain;

/// One fetch → transform → store cycle.
pub mod ingest;

/// Adaptive polling loop and interval policy.
pub mod poller;

/// Source access.
///
/// - [`SourceClient`](source::SourceClient): async trait the core depends on
/// - [`HttpSourceClient`](source::HttpSourceClient): reqwest-based implementation
pub mod source;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Record transformation and link extraction.
pub mod transform;

#[cfg(test)]
mod testing;
