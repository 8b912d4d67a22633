use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{HubError, HubResult};

pub const USER_ID: &str = "user_id";
pub const USER_NAME: &str = "user_name";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
}

pub async fn identity(session: &Session) -> HubResult<Identity> {
    let user_id = read(session, USER_ID).await?;
    let name = read(session, USER_NAME).await?;
    Ok(Identity { user_id, name })
}

async fn read(session: &Session, key: &str) -> HubResult<String> {
    match session.get::<String>(key).await {
        Ok(Some(value)) if !value.is_empty() => Ok(value),
        Ok(_) => Err(HubError::Unauthenticated),
        Err(e) => {
            tracing::warn!("session read failed: {e}");
            Err(HubError::Unauthenticated)
        }
    }
}
