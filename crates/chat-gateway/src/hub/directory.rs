//! Hub: room id to room actor
//!
//! Uses `DashMap`'s entry API so concurrent first joins of the same id create
//! exactly one room.

use chat_common::EchoPolicy;
use chat_core::{ChatMessage, RoomId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::connection::{ConnectionId, OutboundQueue};
use crate::room::{spawn_room, RoomHandle};

/// Registration attempts before a join gives up
pub const JOIN_ATTEMPTS: usize = 3;

/// Join errors
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("Gateway is shutting down")]
    ShuttingDown,

    #[error("Room {0} unavailable after {JOIN_ATTEMPTS} attempts")]
    Unavailable(RoomId),
}

/// Directory of live rooms
pub struct Hub {
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    next_epoch: AtomicU64,
    echo_policy: EchoPolicy,
    closed: AtomicBool,
}

impl Hub {
    /// Create a new hub
    #[must_use]
    pub fn new(echo_policy: EchoPolicy) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            tasks: Mutex::new(Vec::new()),
            next_epoch: AtomicU64::new(1),
            echo_policy,
            closed: AtomicBool::new(false),
        }
    }

    /// Create a new hub wrapped in Arc
    #[must_use]
    pub fn new_shared(echo_policy: EchoPolicy) -> Arc<Self> {
        Arc::new(Self::new(echo_policy))
    }

    pub fn echo_policy(&self) -> EchoPolicy {
        self.echo_policy
    }

    /// Register `member` in the room, creating the room on first use
    ///
    /// A room that stops between lookup and registration is replaced and the
    /// registration retried.
    pub async fn join(
        &self,
        room_id: RoomId,
        member: OutboundQueue,
    ) -> Result<RoomHandle, JoinError> {
        for attempt in 1..=JOIN_ATTEMPTS {
            let Some(room) = self.get_or_create(&room_id) else {
                return Err(JoinError::ShuttingDown);
            };
            match room.register(member.clone()).await {
                Ok(()) => {
                    tracing::debug!(
                        room_id = %room_id,
                        connection_id = %member.connection_id(),
                        epoch = room.epoch(),
                        "Joined room"
                    );
                    return Ok(room);
                }
                Err(e) => {
                    tracing::debug!(room_id = %room_id, attempt, error = %e, "Room stopped during join");
                }
            }
        }

        Err(JoinError::Unavailable(room_id))
    }

    /// Forward a message to the room it names
    ///
    /// Returns `false` when no such room is live; the message is dropped.
    pub async fn route(&self, message: ChatMessage, origin: Option<ConnectionId>) -> bool {
        let Some(room) = self.room(&message.room_id) else {
            tracing::trace!(room_id = %message.room_id, "No live room, dropping message");
            return false;
        };
        room.broadcast(message, origin).await.is_ok()
    }

    /// Look up a live room
    pub fn room(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    /// Number of rooms in the directory
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Stop every room and wait for the actors to finish
    ///
    /// Member queues are closed with `GoingAway`; later joins fail.
    pub async fn shutdown(&self) {
        // Joins check the flag under the entry's shard lock, so once it is set
        // every room they created is visible to the sweep below
        self.closed.store(true, Ordering::SeqCst);

        let rooms: Vec<RoomHandle> = self.rooms.iter().map(|e| e.value().clone()).collect();
        self.rooms.clear();
        for room in &rooms {
            room.shutdown().await;
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        let count = tasks.len();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Room task failed");
            }
        }

        tracing::info!(rooms = rooms.len(), tasks = count, "Hub shut down");
    }

    /// Live room for `room_id`, or `None` once the hub is shutting down
    fn get_or_create(&self, room_id: &RoomId) -> Option<RoomHandle> {
        let entry = self.rooms.entry(room_id.clone());
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }

        let room = match entry {
            Entry::Occupied(entry) if !entry.get().is_closed() => entry.get().clone(),
            Entry::Occupied(mut entry) => {
                let room = self.spawn(room_id.clone());
                entry.insert(room.clone());
                room
            }
            Entry::Vacant(entry) => {
                let room = self.spawn(room_id.clone());
                entry.insert(room.clone());
                room
            }
        };
        Some(room)
    }

    /// Start a room actor that removes its own entry when it stops
    fn spawn(&self, room_id: RoomId) -> RoomHandle {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let directory: Weak<DashMap<RoomId, RoomHandle>> = Arc::downgrade(&self.rooms);
        let key = room_id.clone();
        let on_stop = Box::new(move || {
            if let Some(rooms) = directory.upgrade() {
                rooms.remove_if(&key, |_, room| room.epoch() == epoch);
            }
        });

        let (room, task) = spawn_room(room_id, epoch, self.echo_policy, on_stop);

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);

        tracing::debug!(room_id = %room.id(), epoch, "Room created");
        room
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("rooms", &self.rooms.len())
            .field("echo_policy", &self.echo_policy)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
