//! Workflow registry, parameter injection, and execution.
//!
//! The core can ask for a named workflow to run instead of replying with text.
//! Workflows declare the parameters they need; the [`Injector`] checks those
//! against what the event provides and binds them into a [`Job`], which the
//! [`WorkflowClient`] then runs in the background.

pub mod builtin;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{RwLock, Semaphore};
use tracing::{Instrument, error, info, instrument};

use crate::{
    base::types::{Res, ReplyTarget, Variables, Void, WorkflowCall},
    service::chat::ChatClient,
};

/// A unit of work ready to be executed.
pub type Job = BoxFuture<'static, Void>;

// Traits.

/// Generic workflow trait that runnable workflows must implement.
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    /// The name the core uses to request this workflow.
    fn name(&self) -> &str;

    /// Variables that must be present for the workflow to run.
    fn parameters(&self) -> &[&'static str] {
        &[]
    }

    /// Run the workflow.
    async fn run(&self, parameters: Parameters) -> Void;
}

// Structs.

/// Everything a workflow may ask for.
#[derive(Clone)]
pub struct Parameters {
    /// The request that triggered the workflow.
    pub output: WorkflowCall,
    /// The chat client the event came from.
    pub chat: ChatClient,
    /// Where replies to the triggering event go.
    pub target: ReplyTarget,
    /// Named values; the request's variables.
    pub variables: Variables,
}

impl Parameters {
    pub fn new(output: WorkflowCall, chat: ChatClient, target: ReplyTarget) -> Self {
        let variables = output.variables.clone();

        Self { output, chat, target, variables }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.get(name).is_some_and(|v| !v.is_null())
    }

    /// Deserialize the named variable.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Res<T> {
        let value = self.variables.get(name).cloned().unwrap_or(Value::Null);

        serde_json::from_value(value).map_err(|e| anyhow::anyhow!("Parameter `{}` is invalid: {}", name, e))
    }

    /// Borrow the named variable as a string.
    pub fn get_str(&self, name: &str) -> Res<&str> {
        self.variables
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Parameter `{}` is not a string.", name))
    }
}

/// Binds parameters into workflows.
#[derive(Clone, Copy, Debug, Default)]
pub struct Injector;

impl Injector {
    /// Check that `parameters` satisfies the workflow, then bind them into a job.
    pub fn inject(&self, workflow: Arc<dyn Workflow>, parameters: Parameters) -> Res<Job> {
        let missing: Vec<&str> = workflow.parameters().iter().copied().filter(|name| !parameters.contains(name)).collect();

        if !missing.is_empty() {
            return Err(anyhow::anyhow!("Workflow `{}` is missing parameters: {:?}", workflow.name(), missing));
        }

        Ok(Box::pin(async move { workflow.run(parameters).await }))
    }
}

/// Workflow client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct WorkflowClient {
    registry: Arc<RwLock<HashMap<String, Arc<dyn Workflow>>>>,
    permits: Arc<Semaphore>,
    injector: Injector,
}

impl WorkflowClient {
    /// Create an empty registry running at most `concurrency` workflows at once.
    pub fn new(concurrency: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            injector: Injector,
        }
    }

    /// Create a registry with the built-in workflows registered.
    pub async fn with_builtins(concurrency: usize) -> Self {
        let client = Self::new(concurrency);

        for workflow in builtin::all() {
            client.register(workflow).await;
        }

        client
    }

    /// Register a workflow under its name, replacing any previous one.
    pub async fn register(&self, workflow: Arc<dyn Workflow>) {
        info!("Registering workflow `{}`.", workflow.name());

        self.registry.write().await.insert(workflow.name().to_string(), workflow);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Workflow>> {
        self.registry.read().await.get(name).cloned()
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Schedule a job in the background.
    ///
    /// Waits for a free slot first, so at most `concurrency` jobs are in flight.
    #[instrument(skip_all)]
    pub async fn put(&self, job: Job) {
        let Ok(permit) = self.permits.clone().acquire_owned().await else {
            error!("Workflow executor is closed.");
            return;
        };

        tokio::spawn(
            async move {
                if let Err(err) = job.await {
                    error!("Error while running workflow: {}", err);
                }

                drop(permit);
            }
            .in_current_span(),
        );
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::service::chat::tests::null_chat;

    struct CountingWorkflow {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Workflow for CountingWorkflow {
        fn name(&self) -> &str {
            "count"
        }

        fn parameters(&self) -> &[&'static str] {
            &["times"]
        }

        async fn run(&self, parameters: Parameters) -> Void {
            let times: usize = parameters.get("times")?;
            self.runs.fetch_add(times, Ordering::SeqCst);
            Ok(())
        }
    }

    fn target() -> ReplyTarget {
        ReplyTarget {
            channel_id: "C1".into(),
            thread_ts: None,
            message_ts: "1.0".into(),
        }
    }

    fn call(variables: serde_json::Value) -> WorkflowCall {
        let serde_json::Value::Object(variables) = variables else {
            panic!("variables must be an object");
        };

        WorkflowCall::new("count", variables)
    }

    #[test]
    fn parameters_read_typed_values() {
        let parameters = Parameters::new(call(json!({ "times": 3, "name": "dice", "none": null })), null_chat(), target());

        assert_eq!(parameters.get::<usize>("times").unwrap(), 3);
        assert_eq!(parameters.get_str("name").unwrap(), "dice");
        assert!(parameters.get_str("times").is_err());
        assert!(!parameters.contains("none"));
        assert!(parameters.get::<Option<String>>("absent").unwrap().is_none());
    }

    #[tokio::test]
    async fn injector_rejects_missing_parameters() {
        let workflow: Arc<dyn Workflow> = Arc::new(CountingWorkflow { runs: Arc::default() });

        let result = Injector.inject(workflow, Parameters::new(call(json!({})), null_chat(), target()));

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn registered_workflow_runs_through_put() {
        let runs = Arc::new(AtomicUsize::new(0));
        let workflows = WorkflowClient::new(2);
        workflows.register(Arc::new(CountingWorkflow { runs: runs.clone() })).await;

        assert!(workflows.get("missing").await.is_none());

        let workflow = workflows.get("count").await.unwrap();
        let job = workflows.injector().inject(workflow, Parameters::new(call(json!({ "times": 2 })), null_chat(), target())).unwrap();
        workflows.put(job).await;

        for _ in 0..50 {
            if runs.load(Ordering::SeqCst) == 2 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        panic!("workflow did not run");
    }

    #[tokio::test]
    async fn put_waits_for_a_free_slot() {
        let workflows = WorkflowClient::new(1);
        let (release, released) = tokio::sync::oneshot::channel::<()>();

        workflows
            .put(Box::pin(async move {
                let _ = released.await;
                Ok(())
            }))
            .await;

        let second = workflows.put(Box::pin(async { Ok(()) }));
        tokio::pin!(second);

        assert!(tokio::time::timeout(std::time::Duration::from_millis(50), &mut second).await.is_err());

        release.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), second).await.expect("slot was not freed");
    }
}
