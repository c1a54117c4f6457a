//! Failure-isolated delivery of presence pushes.
//!
//! [`NotificationDispatcher::safe_notify`] is an "attempt with fallback":
//! try one push on one channel, and if anything goes wrong (the channel is
//! already closed, the link drops, the push hangs past the deadline, or
//! the channel implementation panics) run the caller's failure handler
//! instead of returning an error. Callers always get a [`Delivery`] value
//! back, never a `Result`.
//!
//! [`NotificationDispatcher::spawn_notify`] runs the same thing on its own
//! Tokio task, which is how fan-out stays independent per recipient: one
//! slow or broken peer occupies only its own task.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use kinship_protocol::{PlayerId, PresencePush};
use tokio::task::JoinHandle;

use crate::{ChannelState, ConnectionChannel, PushError};

/// How a failed push failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No completion within the push timeout.
    Timeout,
    /// The link broke while writing.
    Link,
    /// The channel had already been torn down.
    Disposed,
    /// Any other error, including a panic inside the channel.
    Unexpected,
}

impl From<&PushError> for FailureKind {
    fn from(e: &PushError) -> Self {
        match e {
            PushError::Timeout => Self::Timeout,
            PushError::Link(_) => Self::Link,
            PushError::Disposed => Self::Disposed,
            PushError::Unexpected(_) => Self::Unexpected,
        }
    }
}

/// Outcome of one `safe_notify` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The channel accepted the push.
    Delivered,
    /// The channel wasn't open; the push was never attempted.
    Skipped(ChannelState),
    /// The push was attempted and failed.
    Failed(FailureKind),
}

impl Delivery {
    /// Returns `true` for [`Delivery::Delivered`].
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Runs pushes with a deadline and turns every failure into a callback.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    push_timeout: Duration,
}

impl NotificationDispatcher {
    /// Creates a dispatcher that gives each push `push_timeout` to complete.
    pub fn new(push_timeout: Duration) -> Self {
        Self { push_timeout }
    }

    /// The per-push deadline.
    pub fn push_timeout(&self) -> Duration {
        self.push_timeout
    }

    /// Attempts one push, calling `on_failure` instead of failing.
    ///
    /// - A channel that isn't [`Open`](ChannelState::Open) is skipped and
    ///   `on_failure` runs immediately.
    /// - Otherwise the push runs under the dispatcher's deadline. A
    ///   timeout, link failure, disposed channel, or panic all end in
    ///   `on_failure`.
    ///
    /// `on_failure` runs at most once, and only on the failure paths.
    pub async fn safe_notify<C, F>(&self, channel: &C, push: PresencePush, on_failure: F) -> Delivery
    where
        C: ConnectionChannel,
        F: FnOnce(),
    {
        let kind = push.kind();

        let state = channel.state();
        if !state.is_open() {
            tracing::debug!(push = kind, %state, "recipient already gone, skipping push");
            on_failure();
            return Delivery::Skipped(state);
        }

        // Creating the push future can panic as well as polling it.
        let attempt = AssertUnwindSafe(async move { channel.push(push).await }).catch_unwind();
        let failure = match tokio::time::timeout(self.push_timeout, attempt).await {
            Ok(Ok(Ok(()))) => return Delivery::Delivered,
            Ok(Ok(Err(e))) => {
                let failure = FailureKind::from(&e);
                match failure {
                    FailureKind::Unexpected => {
                        tracing::warn!(push = kind, error = %e, "push failed unexpectedly");
                    }
                    _ => {
                        tracing::debug!(push = kind, error = %e, "recipient unreachable");
                    }
                }
                failure
            }
            Ok(Err(_panic)) => {
                tracing::warn!(push = kind, "channel panicked during push");
                FailureKind::Unexpected
            }
            Err(_elapsed) => {
                tracing::debug!(push = kind, timeout = ?self.push_timeout, "push timed out");
                FailureKind::Timeout
            }
        };

        on_failure();
        Delivery::Failed(failure)
    }

    /// [`safe_notify`](Self::safe_notify) on a new Tokio task.
    ///
    /// Returns immediately. Dropping the handle doesn't cancel the push.
    pub fn spawn_notify<C, F>(
        &self,
        channel: Arc<C>,
        push: PresencePush,
        on_failure: F,
    ) -> JoinHandle<Delivery>
    where
        C: ConnectionChannel,
        F: FnOnce() + Send + 'static,
    {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.safe_notify(&*channel, push, on_failure).await })
    }
}

// ---------------------------------------------------------------------------
// Fanout
// ---------------------------------------------------------------------------

/// The in-flight pushes started by one presence operation.
///
/// Presence operations return without waiting for delivery. Callers that
/// do care (tests, graceful shutdown) can [`settle`](Self::settle) the
/// fan-out; everyone else just drops it and the pushes finish on their own.
#[derive(Debug, Default)]
pub struct Fanout {
    tasks: Vec<(PlayerId, JoinHandle<Delivery>)>,
}

impl Fanout {
    /// An empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, recipient: PlayerId, task: JoinHandle<Delivery>) {
        self.tasks.push((recipient, task));
    }

    pub(crate) fn extend(&mut self, other: Fanout) {
        self.tasks.extend(other.tasks);
    }

    /// Number of pushes started.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if no push was started.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The recipients, in the order their pushes were started.
    pub fn recipients(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.tasks.iter().map(|(recipient, _)| *recipient)
    }

    /// Waits for every push to finish and reports each outcome.
    ///
    /// A task that died without reporting counts as an unexpected failure.
    pub async fn settle(self) -> Vec<(PlayerId, Delivery)> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for (recipient, task) in self.tasks {
            let delivery = task
                .await
                .unwrap_or(Delivery::Failed(FailureKind::Unexpected));
            outcomes.push((recipient, delivery));
        }
        outcomes
    }
}
