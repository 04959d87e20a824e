//! Self-terminating status poll.
//!
//! Idle has no timer. Active owns one spawned task ticking at a fixed
//! interval; it stops itself on the first tick that sees both phases idle,
//! after exactly one trailing stacks fetch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::backend::IndexingStatus;
use crate::error::Result;

/// What a poll tick reads and applies.
#[async_trait]
pub trait PollTarget: Send + Sync + 'static {
    async fn refresh_status(&self) -> Result<IndexingStatus>;
    async fn refresh_stacks(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A phase is still running; stacks were re-fetched.
    Running,
    /// Both phases idle. The session must stop.
    Idle,
    /// Status query failed; retried on the next tick.
    Failed,
}

/// Status first; stacks only while the job is still producing them.
pub async fn run_tick<T: PollTarget + ?Sized>(target: &T) -> TickOutcome {
    match target.refresh_status().await {
        Ok(status) if status.is_active() => {
            if let Err(err) = target.refresh_stacks().await {
                tracing::debug!("poll: stacks refresh failed: {err}");
            }
            TickOutcome::Running
        }
        Ok(_) => TickOutcome::Idle,
        Err(err) => {
            tracing::warn!("poll: status refresh failed: {err}");
            TickOutcome::Failed
        }
    }
}

struct ActivePoll {
    running: Arc<AtomicBool>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

pub struct PollSession {
    interval: Duration,
    current: Option<ActivePoll>,
}

impl PollSession {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            current: None,
        }
    }

    /// A timer is running and has not yet observed an idle job.
    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|poll| poll.running.load(Ordering::SeqCst))
    }

    /// The spawned task, including any trailing fetch, has exited.
    pub fn is_finished(&self) -> bool {
        self.current
            .as_ref()
            .map_or(true, |poll| poll.task.is_finished())
    }

    /// Start polling. Returns `false` without doing anything when a session
    /// is already active.
    pub fn start<T: PollTarget + ?Sized>(&mut self, target: Arc<T>) -> bool {
        if self.is_active() {
            return false;
        }

        let running = Arc::new(AtomicBool::new(true));
        let token = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            target,
            self.interval,
            running.clone(),
            token.clone(),
        ));

        // A previous session may still be finishing its trailing fetch; it is
        // no longer Active and is left to complete on its own.
        self.current = Some(ActivePoll {
            running,
            token,
            task,
        });
        tracing::debug!("poll: started ({}ms)", self.interval.as_millis());
        true
    }

    /// Stop the timer regardless of state. Any fetch already in flight may
    /// still resolve; its result is the target's to discard.
    pub fn cancel(&mut self) {
        if let Some(poll) = self.current.take() {
            poll.running.store(false, Ordering::SeqCst);
            poll.token.cancel();
            tracing::debug!("poll: cancelled");
        }
    }
}

impl Drop for PollSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn poll_loop<T: PollTarget + ?Sized>(
    target: Arc<T>,
    period: Duration,
    running: Arc<AtomicBool>,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match run_tick(target.as_ref()).await {
            TickOutcome::Running | TickOutcome::Failed => continue,
            TickOutcome::Idle => {
                running.store(false, Ordering::SeqCst);
                tokio::select! {
                    _ = token.cancelled() => {}
                    result = target.refresh_stacks() => {
                        if let Err(err) = result {
                            tracing::debug!("poll: trailing stacks refresh failed: {err}");
                        }
                    }
                }
                tracing::debug!("poll: job idle, stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::error::SyncError;
    use crate::test_support::{idle_status, scanning_status, thumbnails_status, FakeBackend};

    struct CountingTarget {
        backend: FakeBackend,
    }

    #[async_trait]
    impl PollTarget for CountingTarget {
        async fn refresh_status(&self) -> Result<IndexingStatus> {
            self.backend
                .get_indexing_status("p")
                .await
                .map_err(|e| SyncError::query("get_indexing_status", e))
        }

        async fn refresh_stacks(&self) -> Result<()> {
            self.backend
                .list_stacks("p")
                .await
                .map(|_| ())
                .map_err(|e| SyncError::query("list_stacks", e))
        }
    }

    fn target_with(statuses: Vec<IndexingStatus>) -> Arc<CountingTarget> {
        let backend = FakeBackend::new();
        for status in statuses {
            backend.push_status(status);
        }
        Arc::new(CountingTarget { backend })
    }

    async fn run_until_finished(session: &PollSession) {
        while !session.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_first_idle_tick_with_one_trailing_fetch() {
        let target = target_with(vec![scanning_status(), thumbnails_status(), idle_status()]);
        let mut session = PollSession::new(Duration::from_millis(500));

        assert!(session.start(target.clone()));
        run_until_finished(&session).await;

        assert!(!session.is_active());
        assert_eq!(target.backend.calls("get_indexing_status"), 3);
        // Two running ticks plus the single trailing fetch.
        assert_eq!(target.backend.calls("list_stacks"), 3);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(target.backend.calls("get_indexing_status"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_first_tick_fetches_stacks_once() {
        let target = target_with(vec![idle_status()]);
        let mut session = PollSession::new(Duration::from_millis(500));

        session.start(target.clone());
        run_until_finished(&session).await;

        assert_eq!(target.backend.calls("get_indexing_status"), 1);
        assert_eq!(target.backend.calls("list_stacks"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_noop_while_active() {
        let target = target_with(vec![scanning_status()]);
        let mut session = PollSession::new(Duration::from_millis(500));

        assert!(session.start(target.clone()));
        assert!(!session.start(target.clone()));

        tokio::time::sleep(Duration::from_millis(1_600)).await;
        // One timer: three ticks, not six.
        assert_eq!(target.backend.calls("get_indexing_status"), 3);
        session.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_timer() {
        let target = target_with(vec![scanning_status()]);
        let mut session = PollSession::new(Duration::from_millis(500));

        session.start(target.clone());
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        session.cancel();
        assert!(!session.is_active());

        let calls = target.backend.calls("get_indexing_status");
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(target.backend.calls("get_indexing_status"), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_keeps_polling() {
        let target = target_with(vec![scanning_status(), idle_status()]);
        target.backend.fail_query("get_indexing_status");
        let mut session = PollSession::new(Duration::from_millis(500));

        session.start(target.clone());
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(session.is_active());
        assert_eq!(target.backend.calls("list_stacks"), 0);

        target.backend.heal("get_indexing_status");
        run_until_finished(&session).await;
        assert!(!session.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_self_termination() {
        let target = target_with(vec![idle_status()]);
        let mut session = PollSession::new(Duration::from_millis(500));

        session.start(target.clone());
        run_until_finished(&session).await;
        assert!(session.start(target.clone()));
        run_until_finished(&session).await;
        assert_eq!(target.backend.calls("get_indexing_status"), 2);
    }
}
