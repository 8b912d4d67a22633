use axum::{Json, debug_handler, extract::{Path, State}};
use serde::Serialize;
use tower_sessions::Session;

use crate::{AppResult, AppState, session};

use super::{Hub, Removal};

#[derive(Debug, Serialize)]
pub(crate) struct RoomsList {
    #[serde(rename = "roomslist")]
    rooms: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserName {
    name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct Removed {
    #[serde(rename = "roomid")]
    room_id: String,
    deleted: bool,
}

/// Display name of the current session, empty when logged out.
#[debug_handler]
pub(crate) async fn username(session: Session) -> Json<UserName> {
    let name = session::identity(&session).await
        .map(|identity| identity.name)
        .unwrap_or_default();
    Json(UserName { name })
}

#[debug_handler(state = AppState)]
pub(crate) async fn rooms(State(hub): State<Hub>) -> AppResult<Json<RoomsList>> {
    let rooms = hub.rooms.list_room_ids().await?;
    Ok(Json(RoomsList { rooms }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn joined_rooms(
    State(hub): State<Hub>,
    session: Session,
) -> AppResult<Json<RoomsList>> {
    let who = session::identity(&session).await?;
    let rooms = hub.members.rooms_of(&who.user_id).await?;
    Ok(Json(RoomsList { rooms }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_room(
    State(hub): State<Hub>,
    session: Session,
    Path(room_id): Path<String>,
) -> AppResult<Json<Removed>> {
    let who = session::identity(&session).await?;
    let removal = hub.remove(&who, &room_id).await?;

    Ok(Json(Removed {
        room_id,
        deleted: removal == Removal::Deleted,
    }))
}
