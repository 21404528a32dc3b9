//! Event handling and user interactions for infini-bot.
//!
//! This module provides functionality for handling chat events:
//! - Normalizing platform events into the core's input record
//! - Forwarding input to the core and dispatching its outputs
//! - Package manager commands

pub mod chat_event;
pub mod ipm;
pub mod normalize;

use tracing::instrument;

use crate::{base::types::ChatEvent, runtime::Runtime};

/// Whether the event is a package manager command.
pub fn is_ipm_command(event: &ChatEvent, prefix: &str) -> bool {
    event.plain_text.trim_start().starts_with(prefix)
}

/// Route an event to the package manager or the core.
///
/// Package manager commands are never forwarded to the core.
#[instrument(skip_all)]
pub fn dispatch_event(event: ChatEvent, runtime: Runtime) {
    if is_ipm_command(&event, &runtime.config.ipm_prefix) {
        ipm::handle_ipm_command(event, runtime);
    } else {
        chat_event::handle_chat_event(event, runtime);
    }
}
