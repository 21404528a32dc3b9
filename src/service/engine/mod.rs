//! The rule interpreter ("core") and its hot-reload handle.
//!
//! A core takes a normalized [`Input`] and lazily yields [`Output`]s. The
//! [`CoreClient`] keeps the currently mounted core and swaps in a fresh one
//! whenever the mounted rule-packages change. Package-list updates and reloads
//! are serialized, so the mounted core always matches the last stored list.

pub mod rules;

use std::sync::Arc;

use futures::stream::{self, BoxStream};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::{
    base::types::{Input, Output, Res},
    service::status::StatusClient,
};

// Traits.

/// Generic core trait that rule interpreters must implement.
pub trait GenericCore: Send + Sync + 'static {
    /// Feed an input to the core, returning the outputs it produces in order.
    ///
    /// The stream is lazy: rules are only evaluated as outputs are pulled.
    fn input(&self, input: Input) -> BoxStream<'static, Res<Output>>;
}

/// Builds a core from a list of rule-package names.
pub trait GenericCoreLoader: Send + Sync + 'static {
    fn load(&self, packages: &[String]) -> Res<LoadedCore>;
}

// Structs.

/// The result of loading a set of rule-packages.
pub struct LoadedCore {
    /// The assembled core.
    pub core: Arc<dyn GenericCore>,
    /// Packages that were loaded.
    pub loaded: Vec<String>,
    /// Packages that could not be loaded and were skipped.
    pub failed: Vec<String>,
}

/// What a reload ended up mounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<String>,
}

/// A core with no rules mounted.
pub struct EmptyCore;

impl GenericCore for EmptyCore {
    fn input(&self, _input: Input) -> BoxStream<'static, Res<Output>> {
        Box::pin(stream::empty())
    }
}

/// Core client for the application.
///
/// It is designed to be trivially cloneable; every clone observes the same
/// mounted core.
#[derive(Clone)]
pub struct CoreClient {
    current: Arc<RwLock<Arc<dyn GenericCore>>>,
    loader: Arc<dyn GenericCoreLoader>,
    mounting: Arc<Mutex<()>>,
}

impl CoreClient {
    /// Create a core client that starts with nothing mounted.
    pub fn new(loader: Arc<dyn GenericCoreLoader>) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(EmptyCore))),
            loader,
            mounting: Arc::default(),
        }
    }

    /// Create a core client around a fixed core.
    pub fn with_core(core: Arc<dyn GenericCore>, loader: Arc<dyn GenericCoreLoader>) -> Self {
        Self {
            current: Arc::new(RwLock::new(core)),
            loader,
            mounting: Arc::default(),
        }
    }

    /// A snapshot of the currently mounted core.
    pub async fn current(&self) -> Arc<dyn GenericCore> {
        self.current.read().await.clone()
    }

    /// Load `packages` and swap the result in as the current core.
    #[instrument(skip(self))]
    pub async fn reload(&self, packages: &[String]) -> Res<ReloadReport> {
        let _mounting = self.mounting.lock().await;

        self.mount(packages).await
    }

    /// Reload the core from the package list held in the status store.
    pub async fn hot_reload(&self, status: &StatusClient) -> Res<ReloadReport> {
        let _mounting = self.mounting.lock().await;

        let packages = status.packages().await?;
        self.mount(&packages).await
    }

    /// Edit the stored package list and reload from the result.
    ///
    /// `update` returns `false` to leave the list untouched, in which case
    /// nothing is stored or reloaded and `None` is returned.
    #[instrument(skip_all)]
    pub async fn update_packages(&self, status: &StatusClient, update: impl FnOnce(&mut Vec<String>) -> bool) -> Res<Option<ReloadReport>> {
        let _mounting = self.mounting.lock().await;

        let mut packages = status.packages().await?;

        if !update(&mut packages) {
            return Ok(None);
        }

        status.set_packages(&packages).await?;

        self.mount(&packages).await.map(Some)
    }

    /// Load and swap; callers hold `mounting`.
    async fn mount(&self, packages: &[String]) -> Res<ReloadReport> {
        let loader = self.loader.clone();
        let packages = packages.to_vec();

        let LoadedCore { core, loaded, failed } = tokio::task::spawn_blocking(move || loader.load(&packages)).await??;

        *self.current.write().await = core;

        if !failed.is_empty() {
            warn!("Failed to load rule packages: {:?}", failed);
        }

        info!("Mounted {} rule package(s).", loaded.len());

        Ok(ReloadReport { loaded, failed })
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    struct EchoCore(String);

    impl GenericCore for EchoCore {
        fn input(&self, input: Input) -> BoxStream<'static, Res<Output>> {
            let prefix = self.0.clone();
            Box::pin(stream::once(async move { Ok(Output::text(format!("{prefix}{}", input.text))) }))
        }
    }

    struct EchoLoader;

    impl GenericCoreLoader for EchoLoader {
        fn load(&self, packages: &[String]) -> Res<LoadedCore> {
            let (loaded, failed): (Vec<_>, Vec<_>) = packages.iter().cloned().partition(|p| p != "broken");

            Ok(LoadedCore {
                core: Arc::new(EchoCore(loaded.join(","))),
                loaded,
                failed,
            })
        }
    }

    #[tokio::test]
    async fn starts_empty() {
        let core = CoreClient::new(Arc::new(EchoLoader));

        let outputs: Vec<_> = core.current().await.input(Input::default()).collect().await;
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn reload_swaps_core_and_reports_failures() {
        let core = CoreClient::new(Arc::new(EchoLoader));

        let report = core.reload(&["a".to_string(), "broken".to_string(), "b".to_string()]).await.unwrap();
        assert_eq!(report.loaded, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(report.failed, vec!["broken".to_string()]);

        let outputs: Vec<_> = core.current().await.input(Input::new("!", Default::default())).collect().await;
        assert_eq!(outputs.into_iter().map(|o| o.unwrap()).collect::<Vec<_>>(), vec![Output::text("a,b!")]);
    }

    #[tokio::test]
    async fn snapshot_survives_reload() {
        let core = CoreClient::new(Arc::new(EchoLoader));
        core.reload(&["old".to_string()]).await.unwrap();

        let snapshot = core.current().await;
        core.reload(&["new".to_string()]).await.unwrap();

        let outputs: Vec<_> = snapshot.input(Input::default()).collect().await;
        assert_eq!(outputs.into_iter().map(|o| o.unwrap()).collect::<Vec<_>>(), vec![Output::text("old")]);
    }

    #[tokio::test]
    async fn hot_reload_reads_status() {
        let status = StatusClient::surreal_memory().await.unwrap();
        status.set_packages(&["dice".to_string()]).await.unwrap();

        let core = CoreClient::new(Arc::new(EchoLoader));
        let report = core.hot_reload(&status).await.unwrap();

        assert_eq!(report.loaded, vec!["dice".to_string()]);
    }

    #[tokio::test]
    async fn update_packages_skips_unchanged_lists() {
        let status = StatusClient::surreal_memory().await.unwrap();
        let core = CoreClient::new(Arc::new(EchoLoader));

        let report = core.update_packages(&status, |_| false).await.unwrap();
        assert!(report.is_none());
        assert!(status.packages().await.unwrap().is_empty());

        let report = core.update_packages(&status, |packages| {
            packages.push("dice".to_string());
            true
        })
        .await
        .unwrap();
        assert_eq!(report.map(|r| r.loaded), Some(vec!["dice".to_string()]));
        assert_eq!(status.packages().await.unwrap(), vec!["dice".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_updates_are_serialized() {
        let status = StatusClient::surreal_memory().await.unwrap();
        let core = CoreClient::new(Arc::new(EchoLoader));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let status = status.clone();
                let core = core.clone();

                tokio::spawn(async move {
                    core.update_packages(&status, |packages| {
                        packages.push(format!("p{i}"));
                        true
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_some());
        }

        let stored = status.packages().await.unwrap();
        assert_eq!(stored.len(), 20);

        let outputs: Vec<_> = core.current().await.input(Input::default()).collect().await;
        let Ok(Output::Text { text }) = &outputs[0] else {
            panic!("expected a text output");
        };
        assert_eq!(text, &stored.join(","));
    }
}
