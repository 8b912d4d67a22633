pub mod dispatch;
pub mod lifecycle;
pub mod msg;
pub mod registry;
pub mod render;
pub mod roster;

mod new;
mod room;
mod ws;

use std::sync::Arc;

use axum::{Router, routing::{delete, get}};
use rand::Rng;

use crate::{AppState, HubError, HubResult, ParticipationStore, RoomStore, session::Identity};

use registry::RoomRegistry;
use roster::Roster;

/// Room ids are four digits, `0000`..=`9999`.
const ROOM_ID_SPACE: u32 = 10_000;
const ROOM_ID_ATTEMPTS: usize = 64;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::room_ws))
        .route("/username", get(room::username))
        .route("/rooms", get(room::rooms).post(new::new_room))
        .route("/rooms/{room_id}", delete(room::delete_room))
        .route("/joinrooms", get(room::joined_rooms))
}

/// What a participant's removal request did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The master removed the room itself.
    Deleted,
    /// A regular member gave up their membership.
    Left,
}

/// Everything a connection needs: the live rooms plus the stores behind them.
#[derive(Clone)]
pub struct Hub {
    pub registry: Arc<RoomRegistry>,
    pub rooms: Arc<dyn RoomStore>,
    pub members: Arc<dyn ParticipationStore>,
}

impl Hub {
    pub fn new(
        registry: Arc<RoomRegistry>,
        rooms: Arc<dyn RoomStore>,
        members: Arc<dyn ParticipationStore>,
    ) -> Self {
        Self { registry, rooms, members }
    }

    /// Makes every persisted room joinable again. Returns how many were loaded.
    pub async fn seed(&self) -> HubResult<usize> {
        let ids = self.rooms.list_room_ids().await?;
        let count = ids.len();
        self.registry.initialize(ids).await;
        Ok(count)
    }

    pub async fn roster(&self, room_id: &str) -> HubResult<Roster> {
        roster::resolve(self.members.as_ref(), &self.registry, room_id).await
    }

    /// Allocates an unused room id, persists the room with `owner` as master and
    /// makes it live. The room only goes live once its master is recorded.
    pub async fn open_room(&self, owner: &Identity) -> HubResult<String> {
        let room_id = self.claim_room_id().await?;

        if let Err(e) = self.members.add_member(&owner.user_id, &room_id, true).await {
            if let Err(rollback) = self.rooms.delete_room(&room_id).await {
                tracing::error!("rolling back room {room_id} failed: {rollback:#}");
            }
            return Err(e.into());
        }
        self.registry.create(room_id.clone()).await;

        tracing::info!("{} opened room {room_id}", owner.name);
        Ok(room_id)
    }

    /// Persists a fresh random id. A candidate taken by a concurrent open just
    /// costs another attempt.
    async fn claim_room_id(&self) -> HubResult<String> {
        for _ in 0..ROOM_ID_ATTEMPTS {
            let candidate = format!("{:04}", rand::rng().random_range(0..ROOM_ID_SPACE));
            if self.rooms.create_room(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(anyhow::anyhow!("no free room id after {ROOM_ID_ATTEMPTS} attempts").into())
    }

    /// The master deletes the room for everyone; anyone else just leaves it.
    pub async fn remove(&self, who: &Identity, room_id: &str) -> HubResult<Removal> {
        if !self.rooms.room_exists(room_id).await? {
            return Err(HubError::RoomNotFound(room_id.to_owned()));
        }

        match self.members.membership(&who.user_id, room_id).await? {
            Some(true) => {
                self.members.remove_room_members(room_id).await?;
                self.rooms.delete_room(room_id).await?;
                self.registry.delete(room_id).await;
                tracing::info!("{} deleted room {room_id}", who.name);
                Ok(Removal::Deleted)
            }
            Some(false) => {
                self.members.remove_member(&who.user_id, room_id).await?;
                Ok(Removal::Left)
            }
            None => Err(HubError::RoomNotFound(room_id.to_owned())),
        }
    }
}
