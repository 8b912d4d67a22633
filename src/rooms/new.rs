use axum::{Json, debug_handler, extract::State};
use serde::Serialize;
use tower_sessions::Session;

use crate::{AppResult, AppState, session};

use super::Hub;

#[derive(Debug, Serialize)]
pub(crate) struct NewRoom {
    #[serde(rename = "roomid")]
    room_id: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_room(
    State(hub): State<Hub>,
    session: Session,
) -> AppResult<Json<NewRoom>> {
    let owner = session::identity(&session).await?;
    let room_id = hub.open_room(&owner).await?;

    Ok(Json(NewRoom { room_id }))
}
