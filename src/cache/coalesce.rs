//! Per-key in-flight tracking for collapsing concurrent misses.
//!
//! The first miss for a key becomes the leader and forwards as usual. Misses
//! that arrive while it is running become followers: they wait until the
//! leader's [`FlightGuard`] is dropped (after its store write, or on any early
//! exit) and then look the key up again.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

use super::CacheKey;

pub(crate) enum Flight {
    Leader(FlightGuard),
    Follower(Waiter),
}

#[derive(Clone, Default)]
pub(crate) struct InFlight {
    leaders: Arc<DashMap<CacheKey, watch::Sender<()>>>,
}

impl InFlight {
    pub(crate) fn join(&self, key: &CacheKey) -> Flight {
        match self.leaders.entry(key.clone()) {
            Entry::Occupied(leader) => Flight::Follower(Waiter {
                done: leader.get().subscribe(),
            }),
            Entry::Vacant(slot) => {
                let (done, _) = watch::channel(());
                slot.insert(done);
                Flight::Leader(FlightGuard {
                    leaders: Arc::clone(&self.leaders),
                    key: key.clone(),
                })
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.leaders.len()
    }
}

/// Held by the leader; releases followers when dropped.
pub(crate) struct FlightGuard {
    leaders: Arc<DashMap<CacheKey, watch::Sender<()>>>,
    key: CacheKey,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        // Dropping the sender closes the channel and wakes every follower.
        self.leaders.remove(&self.key);
    }
}

pub(crate) struct Waiter {
    done: watch::Receiver<()>,
}

impl Waiter {
    /// Resolves once the leader is gone. Nothing is ever sent on the channel,
    /// so `changed` only returns when the sender is dropped.
    pub(crate) async fn wait(mut self) {
        while self.done.changed().await.is_ok() {}
    }
}
