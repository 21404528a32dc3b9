//! Core components, types, and utilities for the infini-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Reply texts for the package manager.
//! - Common types and result handling.

pub mod config;
pub mod messages;
pub mod types;
