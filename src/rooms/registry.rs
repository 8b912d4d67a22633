use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use tokio::sync::{Mutex, MutexGuard, RwLock, mpsc};
use uuid::Uuid;

use crate::{ChatLogSink, HubError, HubResult};

use super::{dispatch, msg::Message};

pub type ConnId = Uuid;

/// Outbound side of an attached connection.
#[derive(Debug, Clone)]
pub struct Peer {
    pub name: String,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// A live room: the connections currently attached to it and the queue feeding
/// its dispatcher.
#[derive(Debug)]
pub struct Room {
    pub id: String,
    connections: RwLock<HashMap<ConnId, Peer>>,
    membership: Mutex<()>,
    queue: mpsc::UnboundedSender<Message>,
}

impl Room {
    /// Held from attach/detach until the resulting notice is queued, so notices
    /// reach the queue in the same order as the roster changes they describe.
    pub async fn lock_membership(&self) -> MutexGuard<'_, ()> {
        self.membership.lock().await
    }

    pub async fn attach(&self, conn: ConnId, peer: Peer) {
        self.connections.write().await.insert(conn, peer);
    }

    pub async fn detach(&self, conn: ConnId) -> Option<Peer> {
        self.connections.write().await.remove(&conn)
    }

    /// Display names of the attached connections, in map order.
    pub async fn online_names(&self) -> Vec<String> {
        self.connections.read().await
            .values()
            .map(|peer| peer.name.clone())
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Connections that should get `msg`, as of now.
    pub(crate) async fn recipients(&self, msg: &Message) -> Vec<(ConnId, Peer)> {
        self.connections.read().await
            .iter()
            .filter(|(_, peer)| msg.is_for(&peer.name))
            .map(|(id, peer)| (*id, peer.clone()))
            .collect()
    }

    /// Queues `msg` for this room's dispatcher. False once the dispatcher is gone.
    pub fn enqueue(&self, msg: Message) -> bool {
        self.queue.send(msg).is_ok()
    }
}

/// Every room of the process, keyed by room id. Each room owns a dispatcher
/// task that lives exactly as long as the room does.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    chat_log: Arc<dyn ChatLogSink>,
    this: Weak<RoomRegistry>,
}

impl RoomRegistry {
    pub fn new(chat_log: Arc<dyn ChatLogSink>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            rooms: RwLock::new(HashMap::new()),
            chat_log,
            this: this.clone(),
        })
    }

    /// Seeds the registry with rooms that already exist in the room store.
    pub async fn initialize<I>(&self, room_ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        for room_id in room_ids {
            self.create(room_id).await;
        }
    }

    pub async fn create(&self, room_id: impl Into<String>) -> Arc<Room> {
        let room_id = room_id.into();
        let (queue, rx) = mpsc::unbounded_channel();
        let room = Arc::new(Room {
            id: room_id.clone(),
            connections: RwLock::new(HashMap::new()),
            membership: Mutex::new(()),
            queue,
        });

        dispatch::spawn(
            self.this.clone(),
            Arc::downgrade(&room),
            rx,
            Arc::clone(&self.chat_log),
        );

        if self.rooms.write().await.insert(room_id.clone(), Arc::clone(&room)).is_some() {
            tracing::warn!("room {room_id} re-created, previous instance discarded");
        }
        tracing::debug!("room {room_id} created");

        room
    }

    pub async fn get(&self, room_id: &str) -> HubResult<Arc<Room>> {
        self.rooms.read().await
            .get(room_id)
            .cloned()
            .ok_or_else(|| HubError::RoomNotFound(room_id.to_owned()))
    }

    /// Removes the room. Its dispatcher stops once the last handle to the room
    /// is dropped; anything still queued for it is discarded.
    pub async fn delete(&self, room_id: &str) -> Option<Arc<Room>> {
        let room = self.rooms.write().await.remove(room_id);
        if room.is_some() {
            tracing::debug!("room {room_id} deleted");
        }
        room
    }

    pub async fn list_all(&self) -> Vec<Arc<Room>> {
        self.rooms.read().await.values().cloned().collect()
    }
}
