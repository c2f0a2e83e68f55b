//! Session-change channel between an auth provider and its observers.

use std::sync::Arc;

use shared::domain::Identity;
use tokio::sync::watch;
use tracing::debug;

/// Provider-side fan-out of the current signed-in identity.
///
/// Every auth provider owns one hub and publishes each session change to it.
/// Observers attach with [`SessionHub::subscribe`].
#[derive(Clone)]
pub struct SessionHub {
    inner: Arc<watch::Sender<Option<Identity>>>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionHub {
    pub fn new(initial: Option<Identity>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            inner: Arc::new(tx),
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.inner.borrow().clone()
    }

    /// Publishes a session change. Observers are notified even when the
    /// identity is unchanged.
    pub fn publish(&self, identity: Option<Identity>) {
        debug!(
            signed_in = identity.is_some(),
            observers = self.inner.receiver_count(),
            "publishing session change"
        );
        self.inner.send_replace(identity);
    }

    /// Registers an observer. Its first notification reports the state current
    /// at subscription time.
    pub fn subscribe(&self) -> SessionSubscription {
        let mut rx = self.inner.subscribe();
        rx.mark_changed();
        SessionSubscription { rx }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner.receiver_count()
    }
}

/// Handle of a registered session observer. Dropping it unsubscribes.
pub struct SessionSubscription {
    rx: watch::Receiver<Option<Identity>>,
}

impl SessionSubscription {
    /// Waits for the next session notification. Returns `None` once the
    /// provider is gone.
    pub async fn changed(&mut self) -> Option<Option<Identity>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn unsubscribe(self) {}
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        debug!("session observer released");
    }
}
