//! Push-event bridge: `thumbnail-ready` triggers a stacks-only reload.
//!
//! The payload is never trusted as data. Truth is always re-queried.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::backend::{Disposer, EventSource, Subscription, ThumbnailReadyPayload};
use crate::error::{Result, SyncError};

#[async_trait]
pub trait StacksReloader: Send + Sync + 'static {
    async fn reload_stacks(&self) -> Result<()>;
}

/// A live subscription for the lifetime of one screen activation.
///
/// The unsubscribe callback runs exactly once: on [`EventBridge::detach`] or
/// on drop, whichever comes first.
pub struct EventBridge {
    event: String,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    disposer: Disposer,
}

impl EventBridge {
    pub fn attach<S, R>(source: &S, event: &str, reloader: Arc<R>) -> Result<Self>
    where
        S: EventSource + ?Sized,
        R: StacksReloader + ?Sized,
    {
        let Subscription {
            mut stream,
            disposer,
        } = source
            .subscribe(event)
            .map_err(|e| SyncError::rejected("listen", e))?;

        let token = CancellationToken::new();
        let listen_token = token.clone();
        let name = event.to_string();
        let task = tokio::spawn(async move {
            loop {
                let payload = tokio::select! {
                    _ = listen_token.cancelled() => break,
                    next = stream.next() => match next {
                        Some(payload) => payload,
                        None => break,
                    },
                };

                match serde_json::from_value::<ThumbnailReadyPayload>(payload) {
                    Ok(ready) => tracing::trace!("{name}: logical photo {}", ready.logical_photo_id),
                    Err(err) => tracing::debug!("{name}: ignoring malformed payload: {err}"),
                }

                let reloader = reloader.clone();
                tokio::spawn(async move {
                    if let Err(err) = reloader.reload_stacks().await {
                        tracing::debug!("event reload failed: {err}");
                    }
                });
            }
        });

        tracing::debug!("event bridge: listening for {event}");
        Ok(Self {
            event: event.to_string(),
            token,
            task: Some(task),
            disposer,
        })
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn is_attached(&self) -> bool {
        self.task.is_some()
    }

    /// Unsubscribe and stop the listener.
    pub fn detach(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.token.cancel();
        task.abort();
        self.disposer.dispose();
        tracing::debug!("event bridge: unsubscribed from {}", self.event);
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
