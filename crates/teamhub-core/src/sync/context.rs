//! Collaborators shared by the orchestrator

use std::sync::Arc;

use crate::config::SyncSettings;
use crate::connectivity::ConnectivityMonitor;
use crate::notify::{Notifier, TracingNotifier};
use crate::queue::SyncQueue;
use crate::remote::RemoteStore;
use crate::services::LocalStore;

/// Everything the orchestrator talks to, built once by the host.
#[derive(Clone)]
pub struct SyncContext {
    pub store: LocalStore,
    pub queue: SyncQueue,
    pub remote: Arc<dyn RemoteStore>,
    pub connectivity: ConnectivityMonitor,
    pub notifier: Arc<dyn Notifier>,
    pub settings: SyncSettings,
}

impl SyncContext {
    /// Context with log-only notifications and default settings.
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteStore>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        Self {
            queue: SyncQueue::new(store.clone()),
            store,
            remote,
            connectivity,
            notifier: Arc::new(TracingNotifier),
            settings: SyncSettings::default(),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }
}
