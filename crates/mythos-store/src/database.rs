//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! schema migrations (and the best-effort data migrations) have run before
//! any other operation. All access goes through [`Database::read`] or
//! [`Database::transaction`], which hand the caller a [`Scope`].

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::{Connection, TransactionBehavior};

use crate::data_migrations;
use crate::error::{Result, StoreError};
use crate::live::{LiveQueries, Runner, SubscriptionId};
use crate::migrations;
use crate::scope::{Scope, Table};

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
    live: LiveQueries,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/mythos/mythos.db`
    /// - macOS:   `~/Library/Application Support/com.mythos.mythos/mythos.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\mythos\mythos\data\mythos.db`
    pub fn new() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "mythos", "mythos").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Self::open_at(&data_dir.join("mythos.db"))
    }

    /// Open (or create) a database at an explicit path.
    ///
    /// Opening is idempotent: pending schema versions are applied in order
    /// and existing rows are preserved.
    pub fn open_at(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "opening database");
        Self::init(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        // Recommended SQLite settings.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // Run schema migrations.
        migrations::run_migrations(&mut conn)?;

        // Never fatal: failures are logged and retried on the next open.
        data_migrations::run_pending(&mut conn);

        Ok(Self {
            conn,
            live: LiveQueries::default(),
        })
    }

    /// Raw connection. Writes made through it bypass scopes and live-query
    /// notification.
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }

    /// Run `body` against a read-only scope. Any write attempt fails with
    /// [`StoreError::OutOfScope`].
    pub fn read<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Scope<'_>) -> Result<T>,
    {
        body(&Scope::read_only(&self.conn))
    }

    /// Run `body` inside one transaction that may write `tables`.
    ///
    /// Either every write commits or, if `body` returns an error, none does.
    /// After a successful commit, live queries watching any written table are
    /// re-run.
    pub fn transaction<T, F>(&mut self, tables: &[Table], body: F) -> Result<T>
    where
        F: FnOnce(&Scope<'_>) -> Result<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let scope = Scope::writable(&tx, tables);
        let value = match body(&scope) {
            Ok(value) => value,
            Err(e) => {
                drop(scope);
                tx.rollback()?;
                tracing::debug!(error = %e, "transaction rolled back");
                return Err(e);
            }
        };

        let touched = scope.into_touched();
        tx.commit()?;

        if !touched.is_empty() {
            self.live.notify(&self.conn, &touched);
        }
        Ok(value)
    }

    /// Subscribe to a live query over `table`.
    ///
    /// `query` runs immediately and after every committed transaction that
    /// wrote `table`; each result is handed to `deliver`.
    pub fn subscribe<T, Q, D>(&mut self, table: Table, mut query: Q, mut deliver: D) -> Result<SubscriptionId>
    where
        Q: FnMut(&Scope<'_>) -> Result<T> + Send + 'static,
        D: FnMut(T) + Send + 'static,
    {
        let mut run: Runner = Box::new(move |scope| {
            let value = query(scope)?;
            deliver(value);
            Ok(())
        });
        run(&Scope::read_only(&self.conn))?;
        Ok(self.live.add(table, run))
    }

    /// Drop a live query. Returns `false` if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.live.remove(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::models::{Image, OutputData, TextOutput};

    fn image(uri: &str) -> Image {
        Image {
            id: uuid::Uuid::new_v4(),
            image_data_uri: uri.to_string(),
        }
    }

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
        drop(db);

        // reopening applies nothing new and keeps working
        let db = Database::open_at(&path).expect("should reopen");
        let version: u32 = db
            .conn()
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap();
        assert_eq!(version, migrations::CURRENT_VERSION);
    }

    #[test]
    fn upgrade_keeps_rows_from_first_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");

        {
            let conn = Connection::open(&path).unwrap();
            migrations::v001_initial::up(&conn).unwrap();
            conn.pragma_update(None, "user_version", 1).unwrap();
            conn.execute(
                "INSERT INTO creations (id, name, type, created_at, updated_at, params)
                 VALUES (?1, 'Thor', 'generated', 5, 5, '{\"entity\":\"Thor\"}')",
                [uuid::Uuid::new_v4().to_string()],
            )
            .unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        let creations = db.read(|s| s.list_creations()).unwrap();
        assert_eq!(creations.len(), 1);
        assert_eq!(creations[0].name, "Thor");
        assert!(!creations[0].is_translated);
    }

    #[test]
    fn failed_body_rolls_back_every_write() {
        let mut db = Database::open_in_memory().unwrap();

        let result: Result<()> = db.transaction(&Table::ALL, |s| {
            s.add_image(&image("data:image/png;base64,AA=="))?;
            s.add_output(&TextOutput {
                id: uuid::Uuid::new_v4(),
                data: OutputData::Prompt { prompt: "p".into() },
            })?;
            Err(StoreError::Migration("abort".into()))
        });
        assert!(result.is_err());

        let (images, outputs) = db
            .read(|s| Ok((s.count(Table::Images)?, s.count(Table::TextOutputs)?)))
            .unwrap();
        assert_eq!((images, outputs), (0, 0));
    }

    #[test]
    fn writes_outside_declared_tables_are_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let err = db
            .transaction(&[Table::Creations], |s| s.add_image(&image("data:,")))
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfScope("images")));

        let err = db.read(|s| s.clear(Table::Images)).unwrap_err();
        assert!(matches!(err, StoreError::OutOfScope(_)));
    }

    #[test]
    fn add_twice_fails_and_delete_is_idempotent() {
        let mut db = Database::open_in_memory().unwrap();
        let img = image("data:image/png;base64,AA==");

        db.transaction(&[Table::Images], |s| s.add_image(&img)).unwrap();
        let err = db
            .transaction(&[Table::Images], |s| s.add_image(&img))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        assert!(db.transaction(&[Table::Images], |s| s.delete_image(img.id)).unwrap());
        assert!(!db.transaction(&[Table::Images], |s| s.delete_image(img.id)).unwrap());
    }

    #[test]
    fn image_and_output_updates_require_existing_rows() {
        let mut db = Database::open_in_memory().unwrap();
        let mut img = image("data:image/png;base64,AA==");
        let mut out = TextOutput {
            id: uuid::Uuid::new_v4(),
            data: OutputData::Prompt { prompt: "p".into() },
        };

        let err = db
            .transaction(&[Table::Images], |s| s.update_image(&img))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { table: "images", .. }));
        let err = db
            .transaction(&[Table::TextOutputs], |s| s.update_output(&out))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { table: "text_outputs", .. }));

        db.transaction(&Table::ALL, |s| {
            s.put_image(&img)?;
            s.put_output(&out)
        })
        .unwrap();

        img.image_data_uri = "data:image/png;base64,AQ==".into();
        out.data = OutputData::Prompt { prompt: "q".into() };
        db.transaction(&Table::ALL, |s| {
            s.update_image(&img)?;
            s.update_output(&out)
        })
        .unwrap();

        let (stored_img, stored_out) = db
            .read(|s| Ok((s.get_image(img.id)?, s.get_output(out.id)?)))
            .unwrap();
        assert_eq!(stored_img, Some(img));
        assert_eq!(stored_out, Some(out));
    }

    #[test]
    fn bulk_add_collision_rolls_back_the_batch() {
        let mut db = Database::open_in_memory().unwrap();
        let existing = image("data:image/png;base64,AA==");
        db.transaction(&[Table::Images], |s| s.add_image(&existing))
            .unwrap();

        let fresh = image("data:image/png;base64,AQ==");
        let err = db
            .transaction(&[Table::Images], |s| {
                s.bulk_add_images(&[fresh.clone(), existing.clone()])
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { table: "images", .. }));
        assert_eq!(db.read(|s| s.get_image(fresh.id)).unwrap(), None);

        let outputs: Vec<TextOutput> = (0..2)
            .map(|i| TextOutput {
                id: uuid::Uuid::new_v4(),
                data: OutputData::Prompt { prompt: format!("p{i}") },
            })
            .collect();
        let added = db
            .transaction(&[Table::TextOutputs], |s| s.bulk_add_outputs(&outputs))
            .unwrap();
        assert_eq!(added, 2);
        let err = db
            .transaction(&[Table::TextOutputs], |s| s.bulk_add_outputs(&outputs[..1]))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { table: "text_outputs", .. }));
    }

    #[test]
    fn live_query_follows_commits_on_watched_table() {
        let mut db = Database::open_in_memory().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let id = db
            .subscribe(
                Table::Images,
                |s| s.count(Table::Images),
                move |count| sink.lock().unwrap().push(count),
            )
            .unwrap();

        db.transaction(&[Table::Images], |s| s.add_image(&image("data:,a")))
            .unwrap();
        // other table: no re-run
        db.transaction(&[Table::TextOutputs], |s| {
            s.add_output(&TextOutput {
                id: uuid::Uuid::new_v4(),
                data: OutputData::Prompt { prompt: "p".into() },
            })
        })
        .unwrap();
        // rolled back: no re-run
        let _ = db.transaction(&[Table::Images], |s| {
            s.add_image(&image("data:,b"))?;
            Err::<(), _>(StoreError::Migration("abort".into()))
        });

        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);

        assert!(db.unsubscribe(id));
        db.transaction(&[Table::Images], |s| s.add_image(&image("data:,c")))
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
