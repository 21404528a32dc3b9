//! Library root for `infini-bot`.
//!
//! Infini-bot is a thin adapter between a chat platform and an Infini-style rule core:
//! - Chat events are normalized into a generic input record
//! - The record is forwarded to the currently mounted core
//! - The core's outputs are sent back as replies or run as named workflows
//! - `.ipm` commands manage which rule-packages are mounted
//!
//! The bot integrates with Slack for chat and SurrealDB for its status store.
//! Each service sits behind a trait so that other implementations can be swapped in.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the infini-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with status, core, workflow, and chat clients
/// - Starts the main event loop for processing messages
pub async fn start(config: Config) -> Void {
    info!("Starting infini-bot ...");

    // Start the crypto provider.
    crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install the default crypto provider."))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
