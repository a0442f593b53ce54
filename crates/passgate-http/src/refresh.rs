//! Single-flight coordination of token refreshes.
//!
//! At most one refresh runs per client. The first caller to need one spawns
//! it; everyone arriving while it runs is handed a clone of the same shared
//! future and observes the same outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error};

use passgate_core::Session;
use passgate_core::error::{AuthError, Error};

/// Outcome shared by every waiter of one refresh.
pub(crate) type RefreshOutcome = Result<Session, Arc<Error>>;

/// Handle to an in-flight refresh.
pub(crate) type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<(u64, PendingRefresh)>,
}

/// Owns the pending-refresh slot.
#[derive(Default)]
pub(crate) struct RefreshCoalescer {
    slot: Mutex<Slot>,
    started: AtomicU64,
}

impl RefreshCoalescer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the in-flight refresh, or start one with `start` if none is
    /// pending.
    ///
    /// The refresh runs as its own task, so it settles even if every waiter
    /// is dropped. The slot is emptied before the outcome is visible to any
    /// waiter.
    pub(crate) fn join<F>(self: &Arc<Self>, start: F) -> PendingRefresh
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let mut slot = self.lock();

        if let Some((_, pending)) = &slot.pending {
            debug!("Joining in-flight refresh");
            return pending.clone();
        }

        slot.generation += 1;
        let generation = slot.generation;
        self.started.fetch_add(1, Ordering::Relaxed);
        debug!(generation, "Starting refresh");

        let work = start();
        let coalescer = Arc::clone(self);
        let task = tokio::spawn(async move {
            let outcome = work.await;
            coalescer.settle(generation);
            outcome
        });

        let pending = task
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "Refresh task failed");
                    Err(Arc::new(Error::Auth(AuthError::RefreshInterrupted)))
                }
            })
            .boxed()
            .shared();

        slot.pending = Some((generation, pending.clone()));
        pending
    }

    /// Empty the slot if it still holds `generation`.
    fn settle(&self, generation: u64) {
        let mut slot = self.lock();
        if slot
            .pending
            .as_ref()
            .is_some_and(|(current, _)| *current == generation)
        {
            slot.pending = None;
            debug!(generation, "Refresh settled");
        }
    }

    /// True when no refresh is pending.
    pub(crate) fn is_idle(&self) -> bool {
        self.lock().pending.is_none()
    }

    /// Number of refreshes started over the coalescer's lifetime.
    pub(crate) fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use passgate_core::error::ProtocolError;
    use passgate_core::{AccessToken, RefreshToken, UserInfo};
    use tokio::sync::oneshot;

    use super::*;

    fn session(access: &str) -> Session {
        Session::new(
            AccessToken::new(access),
            RefreshToken::new("r2"),
            UserInfo::new("u1", "e@x.com"),
        )
    }

    #[tokio::test]
    async fn concurrent_joins_share_one_refresh() {
        let coalescer = Arc::new(RefreshCoalescer::new());
        let (release, gate) = oneshot::channel::<()>();
        let mut gate = Some(gate);

        let mut waiters = Vec::new();
        for _ in 0..10 {
            let pending = coalescer.join(|| {
                let gate = gate.take().expect("start runs once");
                async move {
                    let _ = gate.await;
                    Ok(session("a2"))
                }
                .boxed()
            });
            waiters.push(tokio::spawn(pending));
        }

        assert_eq!(coalescer.started(), 1);
        assert!(!coalescer.is_idle());

        release.send(()).unwrap();
        for waiter in waiters {
            let session = waiter.await.unwrap().unwrap();
            assert_eq!(session.access_token.as_str(), "a2");
        }

        assert!(coalescer.is_idle());
    }

    #[tokio::test]
    async fn failure_is_shared_and_slot_resets() {
        let coalescer = Arc::new(RefreshCoalescer::new());

        let first = coalescer.join(|| {
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(Arc::new(Error::Protocol(ProtocolError::new(500, None))))
            }
            .boxed()
        });
        let second = coalescer.join(|| unreachable!("refresh already pending"));

        let (a, b) = tokio::join!(first, second);
        let (a, b) = (a.unwrap_err(), b.unwrap_err());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.status(), Some(500));
        assert!(coalescer.is_idle());

        let third = coalescer.join(|| async { Ok(session("a3")) }.boxed());
        assert_eq!(third.await.unwrap().access_token.as_str(), "a3");
        assert_eq!(coalescer.started(), 2);
    }

    #[tokio::test]
    async fn refresh_completes_without_waiters() {
        let coalescer = Arc::new(RefreshCoalescer::new());
        let (done_tx, done_rx) = oneshot::channel();

        let pending = coalescer.join(|| {
            async move {
                let _ = done_tx.send(());
                Ok(session("a2"))
            }
            .boxed()
        });
        drop(pending);

        done_rx.await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !coalescer.is_idle() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("slot should reset after the refresh task finishes");
    }
}
