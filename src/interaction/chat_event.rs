//! Forwarding of chat events to the core, and dispatch of what it produces.

use futures::StreamExt;
use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::types::{ChatEvent, Output, Void},
    runtime::Runtime,
    service::workflow::Parameters,
};

use super::normalize::build_input;

/// Handles a chat event in the background.
///
/// Errors are logged rather than returned to the listener.
#[instrument(skip_all)]
pub fn handle_chat_event(event: ChatEvent, runtime: Runtime) {
    tokio::spawn(
        async move {
            // Process the event.
            let result = process_chat_event(event, &runtime).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Error while handling: {}", err);
            }
        }
        .in_current_span(),
    );
}

/// Feed the event to the current core and act on every output in order.
#[instrument(skip_all, fields(session = %event.session_id))]
pub async fn process_chat_event(event: ChatEvent, runtime: &Runtime) -> Void {
    let input = build_input(&event, &runtime.config.platform_name);
    let target = event.target;

    // Hold on to this core even if a reload happens while we are streaming.
    let core = runtime.core.current().await;
    let mut outputs = core.input(input);

    while let Some(output) = outputs.next().await {
        match output? {
            Output::Text { text } => {
                runtime.chat.send_message(&target, &text).await?;
            }
            Output::Workflow(call) => {
                let Some(workflow) = runtime.workflows.get(&call.name).await else {
                    warn!("Unknown workflow `{}`, skipping.", call.name);
                    continue;
                };

                info!("Scheduling workflow `{}` ...", call.name);

                let parameters = Parameters::new(call, runtime.chat.clone(), target.clone());
                match runtime.workflows.injector().inject(workflow, parameters) {
                    Ok(job) => runtime.workflows.put(job).await,
                    Err(err) => warn!("Skipping workflow: {}", err),
                }
            }
        }
    }

    Ok(())
}
