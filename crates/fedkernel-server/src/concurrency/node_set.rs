//! Node-set critical sections for the patch workflow.
//!
//! Proposal creation and the approve conflict cascade must be atomic with
//! respect to concurrent operations touching the same nodes, without
//! serializing unrelated proposals. [`NodeSetLock`] keeps one async mutex
//! per node id; acquiring a set locks the ids in sorted, deduplicated
//! order, so any two overlapping acquisitions meet at their first shared
//! id and a deadlock cycle cannot form.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use fedkernel_core::NodeId;

/// Per-node async mutex registry.
///
/// Entries persist once created; the map grows with the set of distinct
/// nodes ever targeted by a proposal, which is bounded by graph size.
#[derive(Debug, Default)]
pub struct NodeSetLock {
    locks: DashMap<NodeId, Arc<Mutex<()>>>,
}

/// Guards for one acquired node set; dropping releases all of them.
#[derive(Debug)]
pub struct NodeSetGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl NodeSetLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires every node in the set, waiting for holders to release.
    ///
    /// Ids are sorted and deduplicated before locking; byte-wise NodeId
    /// ordering gives all callers the same total order.
    pub async fn acquire(&self, node_ids: &[NodeId]) -> NodeSetGuard {
        let mut sorted = node_ids.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for id in sorted {
            let mutex = self
                .locks
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            guards.push(mutex.lock_owned().await);
        }
        NodeSetGuard { _guards: guards }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn nid(seed: u8) -> NodeId {
        NodeId::from_bytes([seed; 32])
    }

    #[tokio::test]
    async fn disjoint_sets_do_not_block() {
        let lock = Arc::new(NodeSetLock::new());
        let _a = lock.acquire(&[nid(1), nid(2)]).await;
        // A disjoint set acquires immediately even while `_a` is held.
        let acquired = tokio::time::timeout(
            Duration::from_millis(100),
            lock.acquire(&[nid(3)]),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn overlapping_sets_serialize() {
        let lock = Arc::new(NodeSetLock::new());
        let guard = lock.acquire(&[nid(1), nid(2)]).await;

        let contender = Arc::clone(&lock);
        let waiter = tokio::spawn(async move {
            let _g = contender.acquire(&[nid(2), nid(3)]).await;
        });

        // The waiter cannot finish while the overlap is held...
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        // ...and proceeds once it is released.
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should complete after release")
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_ids_do_not_self_deadlock() {
        let lock = NodeSetLock::new();
        let _g = tokio::time::timeout(
            Duration::from_millis(100),
            lock.acquire(&[nid(7), nid(7), nid(7)]),
        )
        .await
        .expect("duplicates must be deduplicated before locking");
    }
}
