use crate::config;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tokio::sync::{mpsc, oneshot};

/// The single slot the whole note collection lives under, as a JSON array.
pub const NOTES_KEY: &str = "notes-app-data";

pub enum DbRequest {
    LoadNotes {
        reply: oneshot::Sender<Result<Option<String>>>,
    },
    SaveNotes {
        json: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Clear {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Handle to the database actor. The actor thread owns the connection; the
/// handle is cheap to clone and safe to use from async code.
#[derive(Clone)]
pub struct Repo {
    tx: mpsc::UnboundedSender<DbRequest>,
}

impl Repo {
    pub fn new() -> Result<Self> {
        let config_dir = config::get_config_dir();
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        Self::open(config_dir.join("local.db"))
    }

    /// Opens the store at an explicit path. Fails early if the database
    /// cannot be created or opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let actor =
            RepoInternal::new(path.as_ref()).context("Failed to initialize database actor")?;

        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            actor.run(rx);
        });

        Ok(Self { tx })
    }

    /// Reads the stored note collection. `None` means the slot was never
    /// written.
    pub async fn load_notes(&self) -> Result<Option<String>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DbRequest::LoadNotes { reply })
            .map_err(|_| anyhow::anyhow!("DB actor shutdown"))?;
        rx.await.context("DB actor dropped reply")?
    }

    /// Overwrites the slot with the full serialized collection.
    pub async fn save_notes(&self, json: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DbRequest::SaveNotes {
                json: json.to_string(),
                reply,
            })
            .map_err(|_| anyhow::anyhow!("DB actor shutdown"))?;
        rx.await.context("DB actor dropped reply")?
    }

    pub async fn clear(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DbRequest::Clear { reply })
            .map_err(|_| anyhow::anyhow!("DB actor shutdown"))?;
        rx.await.context("DB actor dropped reply")?
    }
}

// Synchronous internal implementation
struct RepoInternal {
    conn: Connection,
}

impl RepoInternal {
    fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open database")?;
        let internal = Self { conn };
        internal
            .create_tables()
            .context("Failed to create tables")?;
        Ok(internal)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT
            );",
            [],
        )?;
        Ok(())
    }

    fn run(&self, mut rx: mpsc::UnboundedReceiver<DbRequest>) {
        while let Some(req) = rx.blocking_recv() {
            match req {
                DbRequest::LoadNotes { reply } => {
                    let _ = reply.send(self.get_kv(NOTES_KEY));
                }
                DbRequest::SaveNotes { json, reply } => {
                    let _ = reply.send(self.set_kv(NOTES_KEY, &json));
                }
                DbRequest::Clear { reply } => {
                    let _ = reply.send(self.delete_kv(NOTES_KEY));
                }
            }
        }
    }

    fn get_kv(&self, key: &str) -> Result<Option<String>> {
        let res: Result<String, rusqlite::Error> = self.conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match res {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_kv(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete_kv(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::NoteBook;

    fn temp_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = Repo::open(dir.path().join("test.db")).expect("open repo");
        (dir, repo)
    }

    #[tokio::test]
    async fn load_before_any_save_is_none() {
        let (_dir, repo) = temp_repo();
        assert_eq!(repo.load_notes().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (_dir, repo) = temp_repo();

        let mut book = NoteBook::from_stored(None);
        book.create("Groceries", "Milk, eggs").unwrap();
        book.create("Chores", "Laundry").unwrap();
        let json = book.to_json().unwrap();

        repo.save_notes(&json).await.unwrap();
        let stored = repo.load_notes().await.unwrap().unwrap();
        let reloaded = NoteBook::from_stored(Some(&stored));
        assert_eq!(reloaded.notes(), book.notes());
    }

    #[tokio::test]
    async fn save_overwrites_the_slot() {
        let (_dir, repo) = temp_repo();
        repo.save_notes("[1]").await.unwrap();
        repo.save_notes("[2]").await.unwrap();
        assert_eq!(repo.load_notes().await.unwrap().as_deref(), Some("[2]"));
    }

    #[tokio::test]
    async fn clear_empties_the_slot() {
        let (_dir, repo) = temp_repo();
        repo.save_notes("[]").await.unwrap();
        repo.clear().await.unwrap();
        assert_eq!(repo.load_notes().await.unwrap(), None);
    }

    #[tokio::test]
    async fn survives_reopen_on_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let repo = Repo::open(&path).unwrap();
        repo.save_notes("[{\"id\":1}]").await.unwrap();
        drop(repo);

        let repo = Repo::open(&path).unwrap();
        assert_eq!(
            repo.load_notes().await.unwrap().as_deref(),
            Some("[{\"id\":1}]")
        );
    }
}
