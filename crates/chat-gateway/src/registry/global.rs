//! User id to outbound queue map
//!
//! The one piece of state written from arbitrary connection tasks, so it sits
//! behind a `parking_lot::RwLock`. Broadcasts snapshot targets under the read
//! lock and enqueue after releasing it.

use chat_core::UserId;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::connection::{ConnectionId, EnqueueError, OutboundQueue};
use crate::protocol::{CloseCode, Frame};

/// Registry of notification connections, at most one per user
#[derive(Default)]
pub struct GlobalRegistry {
    users: RwLock<HashMap<UserId, OutboundQueue>>,
}

impl GlobalRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a queue for a user, replacing any previous one
    ///
    /// The displaced queue is returned open; the caller decides how to close it.
    pub fn register(&self, user_id: UserId, queue: OutboundQueue) -> Option<OutboundQueue> {
        let connection_id = queue.connection_id();
        let displaced = self.users.write().insert(user_id.clone(), queue);

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            replaced = displaced.is_some(),
            "User registered"
        );
        displaced
    }

    /// Remove a user's entry, whichever connection it belongs to
    pub fn unregister(&self, user_id: &UserId) -> Option<OutboundQueue> {
        let removed = self.users.write().remove(user_id);
        if removed.is_some() {
            tracing::debug!(user_id = %user_id, "User unregistered");
        }
        removed
    }

    /// Remove a user's entry only if it still belongs to `connection_id`
    ///
    /// A connection tearing down after its user reconnected leaves the newer
    /// registration in place.
    pub fn unregister_connection(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        let mut users = self.users.write();
        let owned = users
            .get(user_id)
            .is_some_and(|queue| queue.connection_id() == connection_id);
        if owned {
            users.remove(user_id);
            tracing::debug!(user_id = %user_id, connection_id = %connection_id, "User unregistered");
        }
        owned
    }

    /// Deliver a frame to one user; returns the number delivered (0 or 1)
    pub fn broadcast_to_user(&self, user_id: &UserId, frame: &Frame) -> usize {
        let target = self
            .users
            .read()
            .get(user_id)
            .map(|queue| (user_id.clone(), queue.clone()));
        self.deliver(target.into_iter().collect(), frame)
    }

    /// Deliver a frame to every registered user except `excluded`
    pub fn broadcast_to_all_except(&self, excluded: &UserId, frame: &Frame) -> usize {
        let targets = self.snapshot(|user_id| user_id != excluded);
        self.deliver(targets, frame)
    }

    /// Deliver a frame to every registered user
    pub fn broadcast_to_all(&self, frame: &Frame) -> usize {
        let targets = self.snapshot(|_| true);
        self.deliver(targets, frame)
    }

    /// Registered user ids, in no particular order
    pub fn connected_users(&self) -> Vec<UserId> {
        self.users.read().keys().cloned().collect()
    }

    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.users.read().contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Remove every entry and close its queue with `reason`
    pub fn close_all(&self, reason: CloseCode) -> usize {
        let drained: Vec<OutboundQueue> = self.users.write().drain().map(|(_, q)| q).collect();
        for queue in &drained {
            queue.close(reason);
        }
        drained.len()
    }

    fn snapshot(&self, include: impl Fn(&UserId) -> bool) -> Vec<(UserId, OutboundQueue)> {
        self.users
            .read()
            .iter()
            .filter(|(user_id, _)| include(user_id))
            .map(|(user_id, queue)| (user_id.clone(), queue.clone()))
            .collect()
    }

    /// Enqueue to each target without blocking, reaping dead consumers
    fn deliver(&self, targets: Vec<(UserId, OutboundQueue)>, frame: &Frame) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for (user_id, queue) in targets {
            match queue.try_enqueue(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(EnqueueError::Full) => {
                    tracing::warn!(
                        user_id = %user_id,
                        connection_id = %queue.connection_id(),
                        "Notification queue full, closing connection"
                    );
                    queue.close(CloseCode::SlowConsumer);
                    dead.push((user_id, queue.connection_id()));
                }
                Err(EnqueueError::Closed) => dead.push((user_id, queue.connection_id())),
            }
        }

        if !dead.is_empty() {
            let mut users = self.users.write();
            for (user_id, connection_id) in dead {
                if users
                    .get(&user_id)
                    .is_some_and(|queue| queue.connection_id() == connection_id)
                {
                    users.remove(&user_id);
                }
            }
        }

        delivered
    }
}

impl std::fmt::Debug for GlobalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalRegistry")
            .field("users", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    fn queue(id: &str, capacity: usize) -> (OutboundQueue, mpsc::Receiver<Frame>) {
        OutboundQueue::channel(ConnectionId::next(), user(id), capacity)
    }

    fn frame(text: &str) -> Frame {
        Frame::from(text)
    }

    #[test]
    fn test_register_then_broadcast_to_user_delivers_once() {
        let registry = GlobalRegistry::new();
        let (q, mut rx) = queue("u1", 4);
        registry.register(user("u1"), q);

        assert_eq!(registry.broadcast_to_user(&user("u1"), &frame("m")), 1);

        assert_eq!(&*rx.try_recv().unwrap(), "m");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_to_unknown_user() {
        let registry = GlobalRegistry::new();
        assert_eq!(registry.broadcast_to_user(&user("ghost"), &frame("m")), 0);
    }

    #[test]
    fn test_broadcast_to_all_except() {
        let registry = GlobalRegistry::new();
        let (q1, mut rx1) = queue("u1", 4);
        let (q2, mut rx2) = queue("u2", 4);
        let (q3, mut rx3) = queue("u3", 4);
        registry.register(user("u1"), q1);
        registry.register(user("u2"), q2);
        registry.register(user("u3"), q3);

        assert_eq!(registry.broadcast_to_all_except(&user("u2"), &frame("m")), 2);

        assert_eq!(&*rx1.try_recv().unwrap(), "m");
        assert!(rx2.try_recv().is_err());
        assert_eq!(&*rx3.try_recv().unwrap(), "m");
    }

    #[test]
    fn test_broadcast_to_all() {
        let registry = GlobalRegistry::new();
        let (q1, mut rx1) = queue("u1", 4);
        let (q2, mut rx2) = queue("u2", 4);
        registry.register(user("u1"), q1);
        registry.register(user("u2"), q2);

        assert_eq!(registry.broadcast_to_all(&frame("all")), 2);
        assert_eq!(&*rx1.try_recv().unwrap(), "all");
        assert_eq!(&*rx2.try_recv().unwrap(), "all");
    }

    #[test]
    fn test_register_replaces_and_returns_displaced() {
        let registry = GlobalRegistry::new();
        let (old, _old_rx) = queue("u1", 4);
        let (new, mut new_rx) = queue("u1", 4);

        assert!(registry.register(user("u1"), old.clone()).is_none());
        let displaced = registry.register(user("u1"), new).unwrap();

        assert_eq!(displaced.connection_id(), old.connection_id());
        assert!(!displaced.is_closed());
        assert_eq!(registry.len(), 1);

        registry.broadcast_to_user(&user("u1"), &frame("fresh"));
        assert_eq!(&*new_rx.try_recv().unwrap(), "fresh");
    }

    #[test]
    fn test_stale_teardown_keeps_newer_registration() {
        let registry = GlobalRegistry::new();
        let (old, _old_rx) = queue("u1", 4);
        let (new, _new_rx) = queue("u1", 4);
        registry.register(user("u1"), old.clone());
        registry.register(user("u1"), new.clone());

        assert!(!registry.unregister_connection(&user("u1"), old.connection_id()));
        assert!(registry.is_connected(&user("u1")));

        assert!(registry.unregister_connection(&user("u1"), new.connection_id()));
        assert!(!registry.is_connected(&user("u1")));
    }

    #[test]
    fn test_unconditional_unregister() {
        let registry = GlobalRegistry::new();
        let (q, _rx) = queue("u1", 4);
        registry.register(user("u1"), q);

        assert!(registry.unregister(&user("u1")).is_some());
        assert!(registry.unregister(&user("u1")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_full_queue_is_closed_and_reaped() {
        let registry = GlobalRegistry::new();
        let (slow, _slow_rx) = queue("slow", 1);
        let (fast, mut fast_rx) = queue("fast", 4);
        registry.register(user("slow"), slow.clone());
        registry.register(user("fast"), fast);
        slow.try_enqueue(frame("backlog")).unwrap();

        assert_eq!(registry.broadcast_to_all(&frame("m")), 1);

        assert_eq!(slow.close_reason(), Some(CloseCode::SlowConsumer));
        assert!(!registry.is_connected(&user("slow")));
        assert!(registry.is_connected(&user("fast")));
        assert_eq!(&*fast_rx.try_recv().unwrap(), "m");
    }

    #[test]
    fn test_closed_queue_is_reaped() {
        let registry = GlobalRegistry::new();
        let (gone, gone_rx) = queue("gone", 4);
        registry.register(user("gone"), gone);
        drop(gone_rx);

        assert_eq!(registry.broadcast_to_user(&user("gone"), &frame("m")), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_connected_users_and_close_all() {
        let registry = GlobalRegistry::new();
        let (q1, _rx1) = queue("u1", 4);
        let (q2, _rx2) = queue("u2", 4);
        registry.register(user("u1"), q1.clone());
        registry.register(user("u2"), q2.clone());

        let mut users = registry.connected_users();
        users.sort();
        assert_eq!(users, vec![user("u1"), user("u2")]);

        assert_eq!(registry.close_all(CloseCode::GoingAway), 2);
        assert!(registry.is_empty());
        assert_eq!(q1.close_reason(), Some(CloseCode::GoingAway));
        assert_eq!(q2.close_reason(), Some(CloseCode::GoingAway));
    }
}
