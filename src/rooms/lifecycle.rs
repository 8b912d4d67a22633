//! Per-connection state machine: join handshake, inbound loop, departure.
//!
//! The transport is abstracted as a stream of [`Frame`]s plus an outbound
//! channel, so the websocket handler and tests drive the same code.

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{HubError, HubResult, session::Identity};

use super::{
    Hub,
    msg::{JoinRequest, Message, SERVER_NAME},
    registry::{ConnId, Peer},
    render,
};

/// One inbound transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A JSON text frame.
    Text(String),
    /// Anything carrying no chat payload (ping, pong, binary).
    Other,
    /// The peer closed the stream, or the transport failed for good.
    Closed,
}

pub struct Connection {
    id: ConnId,
    identity: Identity,
    outbound: mpsc::UnboundedSender<Message>,
    hub: Hub,
}

impl Connection {
    pub fn new(hub: Hub, identity: Identity, outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::now_v7(),
            identity,
            outbound,
            hub,
        }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Runs the connection until the peer goes away. Consumes the connection;
    /// nothing can be done with it once it is closed.
    #[tracing::instrument(skip_all, fields(conn = %self.id, user = %self.identity.name))]
    pub async fn run<S>(self, mut frames: S) -> HubResult<()>
    where
        S: Stream<Item = Frame> + Unpin,
    {
        let room_id = self.join(&mut frames).await?;
        tracing::info!("joined room {room_id}");

        self.receive(&mut frames, &room_id).await;

        self.leave(&room_id).await?;
        tracing::info!("left room {room_id}");
        Ok(())
    }

    async fn join<S>(&self, frames: &mut S) -> HubResult<String>
    where
        S: Stream<Item = Frame> + Unpin,
    {
        let request: JoinRequest = loop {
            match frames.next().await {
                Some(Frame::Text(text)) => break serde_json::from_str(&text).map_err(HubError::BadJoin)?,
                Some(Frame::Other) => continue,
                Some(Frame::Closed) | None => return Err(HubError::ClosedBeforeJoin),
            }
        };

        let room = self.hub.registry.get(&request.room_id).await?;
        let user_id = &self.identity.user_id;

        if !self.hub.members.is_member(user_id, &room.id).await? {
            self.hub.members.add_member(user_id, &room.id, false).await?;
        }

        let guard = room.lock_membership().await;
        room.attach(self.id, Peer {
            name: self.identity.name.clone(),
            tx: self.outbound.clone(),
        }).await;

        let roster = match self.hub.roster(&room.id).await {
            Ok(roster) => roster,
            Err(e) => {
                room.detach(self.id).await;
                return Err(e);
            }
        };

        room.enqueue(Message {
            room_id: room.id.clone(),
            body: format!("{} joined", self.identity.name),
            sender: SERVER_NAME.to_owned(),
            recipient: String::new(),
            all_participants: Some(roster.all),
            online_participants: Some(roster.online),
        });
        drop(guard);

        let welcome = Message {
            room_id: room.id.clone(),
            body: format!("Welcome to room {}", room.id),
            sender: SERVER_NAME.to_owned(),
            recipient: render::sanitize(&request.sender),
            all_participants: None,
            online_participants: None,
        };
        if self.outbound.send(welcome).is_err() {
            tracing::warn!("welcome to room {} not delivered", room.id);
        }

        Ok(room.id.clone())
    }

    async fn receive<S>(&self, frames: &mut S, room_id: &str)
    where
        S: Stream<Item = Frame> + Unpin,
    {
        loop {
            let text = match frames.next().await {
                Some(Frame::Text(text)) => text,
                Some(Frame::Other) => continue,
                Some(Frame::Closed) | None => return,
            };

            let msg: Message = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("ignoring malformed frame: {e}");
                    continue;
                }
            };

            let msg = self.stamp(msg, room_id);
            match self.hub.registry.get(room_id).await {
                Ok(room) => {
                    if !room.enqueue(msg) {
                        tracing::debug!("dispatcher for room {room_id} is gone");
                    }
                }
                Err(e) => tracing::debug!("dropping message: {e}"),
            }
        }
    }

    /// Sanitizes a client message and pins it to this connection's room and name.
    fn stamp(&self, msg: Message, room_id: &str) -> Message {
        let recipient = if msg.recipient.is_empty() {
            msg.recipient
        } else {
            render::sanitize(&msg.recipient)
        };

        Message {
            room_id: room_id.to_owned(),
            body: render::render(&msg.body),
            sender: self.identity.name.clone(),
            recipient,
            all_participants: None,
            online_participants: None,
        }
    }

    async fn leave(self, room_id: &str) -> HubResult<()> {
        let room = self.hub.registry.get(room_id).await?;
        let _guard = room.lock_membership().await;
        room.detach(self.id).await;

        let roster = self.hub.roster(room_id).await?;
        room.enqueue(Message {
            room_id: room_id.to_owned(),
            body: format!("{} left", self.identity.name),
            sender: SERVER_NAME.to_owned(),
            recipient: String::new(),
            all_participants: Some(roster.all),
            online_participants: Some(roster.online),
        });

        Ok(())
    }
}
