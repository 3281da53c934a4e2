//! The real-time feed seam.
//!
//! A [`SnapshotSource`] delivers a full [`Snapshot`] on every change, including once
//! immediately after subscribing. Deliveries are strictly ordered with at most one callback
//! in flight per source. The returned [`Subscription`] detaches from the source when it is
//! unsubscribed or dropped.

use crate::patient::Snapshot;
use std::sync::Arc;

/// Callback invoked with every snapshot the source produces.
///
/// Callbacks run on the thread that triggered the change and must not call back into the
/// source that is delivering to them.
pub type SnapshotCallback = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Anything that can push high-risk patient snapshots to subscribers.
pub trait SnapshotSource {
    fn subscribe(&self, callback: SnapshotCallback) -> Subscription;
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for Arc<S> {
    fn subscribe(&self, callback: SnapshotCallback) -> Subscription {
        (**self).subscribe(callback)
    }
}

/// Handle to an active subscription.
///
/// Release happens exactly once: on the first call to [`Subscription::unsubscribe`] or when
/// the handle is dropped, whichever comes first.
#[must_use = "dropping a Subscription immediately detaches it"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription that was never attached to a source.
    pub fn detached() -> Self {
        Self { release: None }
    }

    /// Detaches from the source. Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// A source whose snapshots are pushed by hand.
    #[derive(Default)]
    pub(crate) struct ManualSource {
        subscribers: Arc<Mutex<Vec<(usize, SnapshotCallback)>>>,
        initial: Mutex<Option<Snapshot>>,
        next_id: Mutex<usize>,
    }

    impl ManualSource {
        pub(crate) fn with_initial(snapshot: Snapshot) -> Self {
            let source = Self::default();
            *source.initial.lock().expect("lock") = Some(snapshot);
            source
        }

        pub(crate) fn push(&self, snapshot: Snapshot) {
            let subscribers: Vec<SnapshotCallback> = self
                .subscribers
                .lock()
                .expect("lock")
                .iter()
                .map(|(_, cb)| cb.clone())
                .collect();
            for callback in subscribers {
                callback(snapshot.clone());
            }
        }

        pub(crate) fn subscriber_count(&self) -> usize {
            self.subscribers.lock().expect("lock").len()
        }
    }

    impl SnapshotSource for ManualSource {
        fn subscribe(&self, callback: SnapshotCallback) -> Subscription {
            let id = {
                let mut next = self.next_id.lock().expect("lock");
                *next += 1;
                *next
            };
            self.subscribers
                .lock()
                .expect("lock")
                .push((id, callback.clone()));

            let initial = self
                .initial
                .lock()
                .expect("lock")
                .clone()
                .unwrap_or_else(|| Arc::from(Vec::new()));
            callback(initial);

            let subscribers = self.subscribers.clone();
            Subscription::new(move || {
                subscribers
                    .lock()
                    .expect("lock")
                    .retain(|(sub_id, _)| *sub_id != id);
            })
        }
    }
}
