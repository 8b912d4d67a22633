pub mod appresult;
pub mod chatlog;
pub mod config;
pub mod error;
pub mod rooms;
pub mod session;
pub mod store;

use axum::{Router, extract::FromRef};
use tower_http::trace::TraceLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};

pub use appresult::{AppError, AppResult};
pub use chatlog::{ChatLogSink, FileChatLog, MemoryChatLog};
pub use config::Config;
pub use error::{HubError, HubResult};
pub use rooms::Hub;
pub use store::{ParticipationStore, RoomStore, SqliteStore};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub hub: Hub,
}

pub fn app(state: AppState, session_layer: SessionManagerLayer<MemoryStore>) -> Router {
    Router::new()
        .merge(rooms::router())
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}
