use crate::{HubResult, ParticipationStore};

use super::registry::RoomRegistry;

/// Placeholder heading both rosters so anonymous posts always have a name to
/// be addressed under.
pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    pub all: Vec<String>,
    pub online: Vec<String>,
}

/// Placeholder, then every persisted participant in store order.
pub async fn all_participants(store: &dyn ParticipationStore, room_id: &str) -> HubResult<Vec<String>> {
    let members = store.list_members(room_id).await?;

    let mut names = Vec::with_capacity(members.len() + 1);
    names.push(ANONYMOUS.to_owned());
    names.extend(members.into_iter().map(|member| member.name));
    Ok(names)
}

/// Placeholder, then the display name of every attached connection.
pub async fn online_participants(registry: &RoomRegistry, room_id: &str) -> HubResult<Vec<String>> {
    let room = registry.get(room_id).await?;

    let mut names = vec![ANONYMOUS.to_owned()];
    names.extend(room.online_names().await);
    Ok(names)
}

/// Both rosters, looked up concurrently. Either lookup failing fails the whole
/// roster with that error.
pub async fn resolve(
    store: &dyn ParticipationStore,
    registry: &RoomRegistry,
    room_id: &str,
) -> HubResult<Roster> {
    let (all, online) = tokio::try_join!(
        all_participants(store, room_id),
        online_participants(registry, room_id),
    )?;

    Ok(Roster { all, online })
}
