//! Connectivity monitor
//!
//! Holds the current online flag and turns raw platform signals into
//! edge-triggered [`ConnectivityEvent`]s. Redundant signals are swallowed.

mod source;

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

pub use source::{ConnectivitySource, HttpProbeSource, SignalHandle, SignalSource};

const EVENT_CAPACITY: usize = 16;

/// A connectivity transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

impl ConnectivityEvent {
    pub const fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }

    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Observable online/offline state shared across the sync core.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(state),
            events,
        }
    }

    /// Monitor initialized from the source's current reading.
    #[must_use]
    pub fn from_source(source: &impl ConnectivitySource) -> Self {
        Self::new(source.current())
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Observable flag, for hosts that render the state
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Transition events; dropping the receiver detaches the listener.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }

    /// Feed a raw signal. Returns the event fired, if the state changed.
    pub fn report(&self, online: bool) -> Option<ConnectivityEvent> {
        let event = ConnectivityEvent::from_online(online);
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            // Published under the state lock so listeners see edges in order
            let _ = self.events.send(event);
            true
        });

        if changed {
            tracing::debug!("Connectivity changed: {event:?}");
            Some(event)
        } else {
            None
        }
    }

    /// Forward every signal of `source` into this monitor.
    pub fn attach<S: ConnectivitySource>(&self, mut source: S) -> JoinHandle<()> {
        let monitor = self.clone();
        monitor.report(source.current());

        tokio::spawn(async move {
            while let Some(online) = source.next_signal().await {
                monitor.report(online);
            }
            tracing::debug!("Connectivity source closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn report_fires_once_per_edge() {
        let monitor = ConnectivityMonitor::new(false);
        let mut events = monitor.subscribe();

        assert_eq!(monitor.report(true), Some(ConnectivityEvent::Online));
        assert_eq!(monitor.report(true), None);
        assert_eq!(monitor.report(true), None);
        assert!(monitor.is_online());

        assert_eq!(events.try_recv().unwrap(), ConnectivityEvent::Online);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn redundant_initial_signal_is_swallowed() {
        let monitor = ConnectivityMonitor::new(true);
        assert_eq!(monitor.report(true), None);
        assert_eq!(monitor.report(false), Some(ConnectivityEvent::Offline));
        assert!(!monitor.is_online());
    }

    #[test]
    fn watch_reflects_state() {
        let monitor = ConnectivityMonitor::new(false);
        let rx = monitor.watch();
        monitor.report(true);
        assert!(*rx.borrow());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn attached_source_drives_events() {
        let (source, handle) = SignalSource::new(false);
        let monitor = ConnectivityMonitor::from_source(&source);
        let mut events = monitor.subscribe();
        let task = monitor.attach(source);

        handle.set_online();
        handle.set_online();
        handle.set_offline();
        drop(handle);
        task.await.unwrap();

        assert_eq!(events.recv().await.unwrap(), ConnectivityEvent::Online);
        assert_eq!(events.recv().await.unwrap(), ConnectivityEvent::Offline);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }
}
