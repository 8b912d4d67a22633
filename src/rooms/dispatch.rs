//! Per-room dispatch loop.
//!
//! Each room has one queue and one consumer task. A message is logged and
//! fanned out to completion before the next one is taken, so ordering holds
//! within a room while a slow room never delays another.

use std::sync::{Arc, Weak};

use chrono::Local;
use tokio::sync::mpsc;

use crate::{ChatLogSink, chatlog};

use super::{
    msg::Message,
    registry::{Room, RoomRegistry},
};

pub(crate) fn spawn(
    registry: Weak<RoomRegistry>,
    room: Weak<Room>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    chat_log: Arc<dyn ChatLogSink>,
) {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Some(target) = resolve(&registry, &room, &msg.room_id).await else {
                tracing::debug!("room {} is gone, dropping message", msg.room_id);
                continue;
            };

            deliver(&target, &msg, chat_log.as_ref()).await;
        }

        tracing::debug!("dispatcher stopped");
    });
}

/// Looks the room up again at dispatch time. A room that was deleted, or
/// deleted and re-created under the same id, no longer belongs to this loop.
async fn resolve(registry: &Weak<RoomRegistry>, own: &Weak<Room>, room_id: &str) -> Option<Arc<Room>> {
    let registry = registry.upgrade()?;
    let room = registry.get(room_id).await.ok()?;
    Weak::ptr_eq(&Arc::downgrade(&room), own).then_some(room)
}

/// Logs `msg` once, then sends it to every connection currently in the room
/// that it is addressed to. Returns how many sends succeeded.
pub async fn deliver(room: &Room, msg: &Message, chat_log: &dyn ChatLogSink) -> usize {
    let line = chatlog::format_line(Local::now(), &room.id, &msg.sender, &msg.recipient, &msg.body);
    if let Err(e) = chat_log.append(&line) {
        tracing::error!("chat log append failed: {e}");
    }

    let mut delivered = 0;
    for (conn, peer) in room.recipients(msg).await {
        let out = Message {
            room_id: room.id.clone(),
            ..msg.clone()
        };

        match peer.tx.send(out) {
            Ok(()) => delivered += 1,
            Err(_) => tracing::warn!("send to {} ({conn}) in room {} failed", peer.name, room.id),
        }
    }

    delivered
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::UnboundedReceiver;
    use uuid::Uuid;

    use crate::{MemoryChatLog, rooms::registry::Peer};

    use super::*;

    async fn room_with(names: &[&str]) -> (Arc<RoomRegistry>, Arc<Room>, Vec<UnboundedReceiver<Message>>) {
        let registry = RoomRegistry::new(Arc::new(MemoryChatLog::new()));
        let room = registry.create("0007").await;

        let mut rxs = Vec::new();
        for name in names {
            let (tx, rx) = mpsc::unbounded_channel();
            room.attach(Uuid::now_v7(), Peer { name: name.to_string(), tx }).await;
            rxs.push(rx);
        }

        (registry, room, rxs)
    }

    fn chat(recipient: &str) -> Message {
        Message {
            room_id: "0007".into(),
            body: "hi".into(),
            sender: "Alice".into(),
            recipient: recipient.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn directed_message_reaches_recipient_and_sender() {
        let (_registry, room, mut rxs) = room_with(&["Alice", "Bob", "Carol"]).await;
        let log = MemoryChatLog::new();

        assert_eq!(deliver(&room, &chat("Bob"), &log).await, 2);

        assert_eq!(rxs[0].try_recv().unwrap().body, "hi");
        assert_eq!(rxs[1].try_recv().unwrap().recipient, "Bob");
        assert!(rxs[2].try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone() {
        let (_registry, room, mut rxs) = room_with(&["Alice", "Bob", "Carol"]).await;
        let log = MemoryChatLog::new();

        assert_eq!(deliver(&room, &chat(""), &log).await, 3);
        for rx in &mut rxs {
            assert_eq!(rx.try_recv().unwrap().sender, "Alice");
        }
    }

    #[tokio::test]
    async fn unknown_recipient_only_echoes() {
        let (_registry, room, mut rxs) = room_with(&["Alice", "Bob"]).await;
        let log = MemoryChatLog::new();

        assert_eq!(deliver(&room, &chat("Nobody"), &log).await, 1);
        assert!(rxs[0].try_recv().is_ok());
        assert!(rxs[1].try_recv().is_err());
        assert_eq!(log.lines().len(), 1);
    }

    #[tokio::test]
    async fn failed_send_does_not_stop_fanout_or_logging() {
        let (_registry, room, mut rxs) = room_with(&["Alice", "Bob", "Carol"]).await;
        let log = MemoryChatLog::new();

        // Bob hung up without detaching yet
        drop(rxs.remove(1));

        assert_eq!(deliver(&room, &chat(""), &log).await, 2);
        assert!(rxs[0].try_recv().is_ok());
        assert!(rxs[1].try_recv().is_ok());
        assert_eq!(log.lines().len(), 1);
    }

    #[tokio::test]
    async fn log_line_flattens_body() {
        let (_registry, room, _rxs) = room_with(&["Alice"]).await;
        let log = MemoryChatLog::new();

        let msg = Message { body: "line1\nline2".into(), ..chat("") };
        deliver(&room, &msg, &log).await;

        let lines = log.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("[S0007] From(Alice) To () Msg(line1 line2)"), "{}", lines[0]);
    }
}
