use async_trait::async_trait;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn room_exists(&self, room_id: &str) -> anyhow::Result<bool>;
    async fn list_room_ids(&self) -> anyhow::Result<Vec<String>>;

    /// False when `room_id` is already taken.
    async fn create_room(&self, room_id: &str) -> anyhow::Result<bool>;
    async fn delete_room(&self, room_id: &str) -> anyhow::Result<()>;
}

/// A persisted participant of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: String,
    pub name: String,
}

#[async_trait]
pub trait ParticipationStore: Send + Sync {
    async fn is_member(&self, user_id: &str, room_id: &str) -> anyhow::Result<bool>;

    /// Records a membership. Recording an existing (user, room) pair again is a no-op.
    async fn add_member(&self, user_id: &str, room_id: &str, is_master: bool) -> anyhow::Result<()>;

    async fn list_members(&self, room_id: &str) -> anyhow::Result<Vec<Member>>;

    /// `Some(is_master)` if the user is a member of the room.
    async fn membership(&self, user_id: &str, room_id: &str) -> anyhow::Result<Option<bool>>;
    async fn rooms_of(&self, user_id: &str) -> anyhow::Result<Vec<String>>;
    async fn remove_member(&self, user_id: &str, room_id: &str) -> anyhow::Result<()>;
    async fn remove_room_members(&self, room_id: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database, mostly for tests. The connection
    /// is never recycled since that would drop the database with it.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS participating_rooms (
                user_id TEXT NOT NULL,
                room_id TEXT NOT NULL,
                is_master BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, room_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Accounts are owned by the external user system; this only mirrors one in.
    pub async fn register_user(&self, user_id: &str, name: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO users (id,name) VALUES (?,?) ON CONFLICT(id) DO UPDATE SET name=excluded.name")
            .bind(user_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RoomStore for SqliteStore {
    async fn room_exists(&self, room_id: &str) -> anyhow::Result<bool> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM rooms WHERE id=?)")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn list_room_ids(&self) -> anyhow::Result<Vec<String>> {
        let ids = sqlx::query_as::<_, (String,)>("SELECT id FROM rooms ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn create_room(&self, room_id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO rooms (id) VALUES (?)")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_room(&self, room_id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM rooms WHERE id=?")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ParticipationStore for SqliteStore {
    async fn is_member(&self, user_id: &str, room_id: &str) -> anyhow::Result<bool> {
        Ok(self.membership(user_id, room_id).await?.is_some())
    }

    async fn add_member(&self, user_id: &str, room_id: &str, is_master: bool) -> anyhow::Result<()> {
        sqlx::query("INSERT OR IGNORE INTO participating_rooms (user_id,room_id,is_master) VALUES (?,?,?)")
            .bind(user_id)
            .bind(room_id)
            .bind(is_master)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_members(&self, room_id: &str) -> anyhow::Result<Vec<Member>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT u.id,u.name FROM participating_rooms p
             JOIN users u ON u.id = p.user_id
             WHERE p.room_id=?
             ORDER BY p.rowid",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(user_id, name)| Member { user_id, name }).collect())
    }

    async fn membership(&self, user_id: &str, room_id: &str) -> anyhow::Result<Option<bool>> {
        let row: Option<(bool,)> = sqlx::query_as("SELECT is_master FROM participating_rooms WHERE user_id=? AND room_id=?")
            .bind(user_id)
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(is_master,)| is_master))
    }

    async fn rooms_of(&self, user_id: &str) -> anyhow::Result<Vec<String>> {
        let ids = sqlx::query_as::<_, (String,)>("SELECT room_id FROM participating_rooms WHERE user_id=? ORDER BY rowid")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn remove_member(&self, user_id: &str, room_id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM participating_rooms WHERE user_id=? AND room_id=?")
            .bind(user_id)
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_room_members(&self, room_id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM participating_rooms WHERE room_id=?")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn membership_recorded_once() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.register_user("u1", "Alice").await.unwrap();
        store.create_room("0007").await.unwrap();

        assert!(!store.is_member("u1", "0007").await.unwrap());
        store.add_member("u1", "0007", false).await.unwrap();
        store.add_member("u1", "0007", false).await.unwrap();

        assert!(store.is_member("u1", "0007").await.unwrap());
        assert_eq!(
            store.list_members("0007").await.unwrap(),
            vec![Member { user_id: "u1".into(), name: "Alice".into() }]
        );
    }

    #[tokio::test]
    async fn members_listed_in_join_order() {
        let store = SqliteStore::in_memory().await.unwrap();
        for (id, name) in [("u2", "Bob"), ("u1", "Alice"), ("u3", "Carol")] {
            store.register_user(id, name).await.unwrap();
            store.add_member(id, "0007", false).await.unwrap();
        }

        let names: Vec<_> = store.list_members("0007").await.unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, ["Bob", "Alice", "Carol"]);
    }

    #[tokio::test]
    async fn master_flag_and_room_cleanup() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.register_user("u1", "Alice").await.unwrap();
        store.register_user("u2", "Bob").await.unwrap();
        store.create_room("0100").await.unwrap();
        store.add_member("u1", "0100", true).await.unwrap();
        store.add_member("u2", "0100", false).await.unwrap();

        assert_eq!(store.membership("u1", "0100").await.unwrap(), Some(true));
        assert_eq!(store.membership("u2", "0100").await.unwrap(), Some(false));
        assert_eq!(store.rooms_of("u2").await.unwrap(), ["0100"]);

        store.remove_member("u2", "0100").await.unwrap();
        assert_eq!(store.membership("u2", "0100").await.unwrap(), None);

        store.remove_room_members("0100").await.unwrap();
        store.delete_room("0100").await.unwrap();
        assert!(!store.room_exists("0100").await.unwrap());
        assert!(store.list_members("0100").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn taken_room_id_is_reported() {
        let store = SqliteStore::in_memory().await.unwrap();

        assert!(store.create_room("0042").await.unwrap());
        assert!(!store.create_room("0042").await.unwrap());
        assert_eq!(store.list_room_ids().await.unwrap(), ["0042"]);
    }
}
