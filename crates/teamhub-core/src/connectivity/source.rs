//! Connectivity signal sources

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

/// Where raw online/offline readings come from.
#[async_trait]
pub trait ConnectivitySource: Send + 'static {
    /// Reading at construction time
    fn current(&self) -> bool;

    /// Next reading, or `None` once the source is exhausted
    async fn next_signal(&mut self) -> Option<bool>;
}

/// Signals pushed by the host (platform online/offline events).
pub struct SignalSource {
    initial: bool,
    rx: mpsc::UnboundedReceiver<bool>,
}

/// Host-side handle of a [`SignalSource`]
#[derive(Clone)]
pub struct SignalHandle {
    tx: mpsc::UnboundedSender<bool>,
}

impl SignalSource {
    #[must_use]
    pub fn new(initially_online: bool) -> (Self, SignalHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                initial: initially_online,
                rx,
            },
            SignalHandle { tx },
        )
    }
}

impl SignalHandle {
    /// Push a reading; returns false once the source is gone.
    pub fn set(&self, online: bool) -> bool {
        self.tx.send(online).is_ok()
    }

    pub fn set_online(&self) -> bool {
        self.set(true)
    }

    pub fn set_offline(&self) -> bool {
        self.set(false)
    }
}

#[async_trait]
impl ConnectivitySource for SignalSource {
    fn current(&self) -> bool {
        self.initial
    }

    async fn next_signal(&mut self) -> Option<bool> {
        self.rx.recv().await
    }
}

/// Active reachability probe of an HTTP endpoint on a fixed interval.
pub struct HttpProbeSource {
    client: Client,
    url: String,
    interval: Duration,
    last: bool,
}

impl HttpProbeSource {
    pub fn new(
        url: impl Into<String>,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.into(),
            interval,
            last: false,
        })
    }

    /// Probe once and remember the result.
    pub async fn probe_now(&mut self) -> bool {
        // Any HTTP response, even an error status, proves reachability
        self.last = self.client.head(&self.url).send().await.is_ok();
        tracing::debug!("Probed {}: reachable={}", self.url, self.last);
        self.last
    }
}

#[async_trait]
impl ConnectivitySource for HttpProbeSource {
    fn current(&self) -> bool {
        self.last
    }

    async fn next_signal(&mut self) -> Option<bool> {
        tokio::time::sleep(self.interval).await;
        Some(self.probe_now().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn signal_source_yields_pushed_readings() {
        let (mut source, handle) = SignalSource::new(true);
        assert!(source.current());

        assert!(handle.set_offline());
        assert_eq!(source.next_signal().await, Some(false));

        drop(handle);
        assert_eq!(source.next_signal().await, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn probe_of_unreachable_endpoint_reports_offline() {
        let mut source = HttpProbeSource::new(
            "http://127.0.0.1:9/",
            Duration::from_millis(10),
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(!source.probe_now().await);
        assert!(!source.current());
    }
}
