use std::{future::Future, sync::Arc};

use {
    async_trait::async_trait,
    kvnts_common::Payload,
    kvnts_config::{SinkConfig, SinkType},
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
};

use crate::{Result, identity::SinkIdentity};

/// Delivers notifications to one external channel.
#[async_trait]
pub trait Sink: Send + Sync {
    fn sink_type(&self) -> SinkType;

    async fn forward_event(&self, payload: &Payload) -> Result<()>;
}

/// Constructs live sink clients, one construction function per
/// [`SinkConfig`] variant.
///
/// `cancel` is owned by the caller: a connector that starts background work
/// must tie it to this token and return the task in [`BuiltSink::listener`].
#[async_trait]
pub trait SinkConnector: Send + Sync {
    async fn connect(
        &self,
        identity: &SinkIdentity,
        config: &SinkConfig,
        cancel: CancellationToken,
    ) -> Result<BuiltSink>;
}

/// A freshly constructed client and the background listener it owns, if any.
pub struct BuiltSink {
    pub client: Arc<dyn Sink>,
    pub listener: Option<ListenerHandle>,
}

impl BuiltSink {
    pub fn new(client: Arc<dyn Sink>) -> Self {
        Self {
            client,
            listener: None,
        }
    }

    #[must_use]
    pub fn with_listener(mut self, listener: ListenerHandle) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Cancel any background work. The client itself is dropped with `self`.
    pub fn teardown(self) {
        if let Some(listener) = self.listener {
            listener.cancel();
        }
    }
}

/// Handle to a sink's background listener task.
///
/// Dropping the handle cancels the task, so a client can never outlive the
/// registry entry that owns it with its listener still running.
pub struct ListenerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Spawn `fut` on the current runtime, tied to `cancel`.
    pub fn spawn<F>(cancel: CancellationToken, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            cancel,
            task: Some(tokio::spawn(fut)),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the task to exit.
    pub async fn join(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::atomic::{AtomicBool, Ordering},
    };

    #[tokio::test]
    async fn join_cancels_and_waits() {
        let stopped = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let flag = Arc::clone(&stopped);
        let token = cancel.clone();
        let handle = ListenerHandle::spawn(cancel, async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });

        assert!(!stopped.load(Ordering::SeqCst));
        handle.join().await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn drop_cancels_the_token() {
        let cancel = CancellationToken::new();
        let observer = cancel.clone();
        let token = cancel.clone();
        let handle = ListenerHandle::spawn(cancel, async move { token.cancelled().await });
        drop(handle);
        assert!(observer.is_cancelled());
    }
}
