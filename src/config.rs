use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Runtime configuration. Every flag can also come from the environment
/// (a `.env` file is read first by `main`).
#[derive(Debug, Clone, Parser)]
#[command(name = "chathub", about = "Room-scoped websocket chat hub")]
pub struct Config {
    /// Address the HTTP/websocket listener binds to
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// SQLite database holding users, rooms and memberships
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://chat.db?mode=rwc")]
    pub database_url: String,

    #[arg(long, env = "MAX_DB_CONNECTIONS", default_value_t = 16)]
    pub max_db_connections: u32,

    /// Append-only chat log, one line per dispatched message
    #[arg(long, env = "CHAT_LOG", default_value = "logs/chat.log")]
    pub chat_log: PathBuf,

    /// Sessions expire after this many minutes without activity
    #[arg(long, env = "SESSION_IDLE_MINUTES", default_value_t = 60)]
    pub session_idle_minutes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config = Config::try_parse_from(["chathub"]).unwrap();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.chat_log, PathBuf::from("logs/chat.log"));
        assert_eq!(config.session_idle_minutes, 60);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "chathub",
            "--listen-addr", "127.0.0.1:9000",
            "--chat-log", "/tmp/chat.log",
        ]).unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.chat_log, PathBuf::from("/tmp/chat.log"));
    }
}
