//! Runtime services and shared state for the infini-bot.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    service::{
        chat::ChatClient,
        engine::{CoreClient, rules::RuleFileLoader},
        status::StatusClient,
        workflow::WorkflowClient,
    },
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the configuration and every service client.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The status store client.
    pub status: StatusClient,
    /// The rule core, with its hot-reload handle.
    pub core: CoreClient,
    /// The workflow registry and executor.
    pub workflows: WorkflowClient,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the status store.
        let status = StatusClient::surreal(&config).await?;

        // Initialize the core, and mount whatever packages were stored.
        let core = CoreClient::new(Arc::new(RuleFileLoader::from_config(&config)));
        let report = core.hot_reload(&status).await?;

        info!("Mounted rule packages: {:?}", report.loaded);

        // Initialize the workflows.
        let workflows = WorkflowClient::with_builtins(config.workflow_concurrency).await;

        // Initialize the slack client.
        let chat = ChatClient::slack(&config, status.clone(), core.clone(), workflows.clone()).await?;

        Ok(Self {
            config,
            status,
            core,
            workflows,
            chat,
        })
    }

    pub async fn start(&self) -> Void {
        self.chat.start().await
    }
}
