//! Service integrations for external APIs and clients.
//!
//! This module contains the services used by the infini-bot:
//! - Chat services (e.g., Slack)
//! - The rule core ("engine") and its hot reload
//! - The status store (e.g., SurrealDB)
//! - Workflow registry and execution
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod engine;
pub mod status;
pub mod workflow;
