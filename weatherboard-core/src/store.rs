use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, Mutex},
};
use tracing::{debug, info, warn};

use crate::{
    StoreError,
    model::{DEFAULT_LEVEL, ScoreRecord},
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS high_scores (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  player_name TEXT NOT NULL,
  score INTEGER NOT NULL,
  level_name TEXT NOT NULL DEFAULT 'Default',
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_high_scores_level_score
  ON high_scores (level_name, score);
"#;

const SELECT_COLUMNS: &str = "SELECT id, player_name, score, level_name, created_at FROM high_scores";

// Backing files with a live RecordStore in this process.
static OPEN_PATHS: LazyLock<Mutex<HashSet<PathBuf>>> = LazyLock::new(Default::default);

enum State {
    Open(Connection),
    Failed(String),
}

/// High-score table in an embedded SQLite file.
///
/// At most one instance per backing file is live at a time. Initialization
/// failures are not retried: the store stays in a failed state and every
/// operation reports [`StoreError::Unavailable`].
///
/// The store is `Send` but not `Sync`; callers serialize access.
pub struct RecordStore {
    path: PathBuf,
    state: State,
    claimed: bool,
}

impl RecordStore {
    /// Open (or create) the store at `path` and ensure the schema exists.
    ///
    /// Only a second live instance on the same file is an `Err`; I/O
    /// failures produce a store whose operations return `Unavailable`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let requested = path.as_ref();
        let path = match resolve(requested) {
            Ok(path) => path,
            Err(message) => return Ok(Self::failed(requested.to_path_buf(), message)),
        };
        claim(&path)?;

        let state = match init(&path) {
            Ok(conn) => {
                info!(path = %path.display(), "record store opened");
                State::Open(conn)
            }
            Err(message) => {
                warn!(path = %path.display(), "record store unavailable: {message}");
                State::Failed(message)
            }
        };

        Ok(Self {
            path,
            state,
            claimed: true,
        })
    }

    /// Open the store at the configured per-user data location.
    pub fn open_default(config: &crate::Config) -> Result<Self, StoreError> {
        match config.data_file_path() {
            Ok(path) => Self::open(path),
            Err(err) => Ok(Self::failed(PathBuf::new(), err.to_string())),
        }
    }

    // Never claims the process-wide slot, so dropping it frees nothing.
    fn failed(path: PathBuf, message: String) -> Self {
        warn!(path = %path.display(), "record store unavailable: {message}");
        Self {
            path,
            state: State::Failed(message),
            claimed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Add a score for the default level.
    pub fn add(&self, player_name: &str, score: i64) -> Result<ScoreRecord, StoreError> {
        self.add_for_level(player_name, score, DEFAULT_LEVEL)
    }

    pub fn add_for_level(
        &self,
        player_name: &str,
        score: i64,
        level_name: &str,
    ) -> Result<ScoreRecord, StoreError> {
        if player_name.trim().is_empty() {
            return Err(StoreError::InvalidInput("player name cannot be empty".into()));
        }

        let conn = self.conn()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO high_scores (player_name, score, level_name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![player_name, score, level_name, created_at],
        )?;
        let id = conn.last_insert_rowid();

        debug!(id, player_name, score, level_name, "high score added");
        Ok(ScoreRecord {
            id,
            player_name: player_name.to_string(),
            score,
            level_name: level_name.to_string(),
            created_at,
        })
    }

    /// Up to `limit` scores, highest first; equal scores keep insertion order.
    pub fn top_scores(&self, limit: i64) -> Result<Vec<ScoreRecord>, StoreError> {
        let conn = self.conn()?;
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let mut stmt =
            conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY score DESC, id ASC LIMIT ?1"))?;
        let rows = stmt
            .query_map(params![limit], score_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Like [`RecordStore::top_scores`], restricted to an exact (case-sensitive) level name.
    pub fn top_scores_for_level(
        &self,
        level_name: &str,
        limit: i64,
    ) -> Result<Vec<ScoreRecord>, StoreError> {
        let conn = self.conn()?;
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE level_name = ?1 ORDER BY score DESC, id ASC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![level_name, limit], score_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM high_scores", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Delete every row. Identifiers are never reused afterwards.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let removed = self.conn()?.execute("DELETE FROM high_scores", [])?;
        info!(removed, "all high scores cleared");
        Ok(())
    }

    /// Release the connection. The process-wide slot for this path is freed on drop.
    pub fn close(mut self) -> Result<(), StoreError> {
        let state = std::mem::replace(&mut self.state, State::Failed("store closed".into()));
        if let State::Open(conn) = state {
            conn.close().map_err(|(_, err)| StoreError::Io(err))?;
            info!(path = %self.path.display(), "record store closed");
        }
        Ok(())
    }

    fn conn(&self) -> Result<&Connection, StoreError> {
        match &self.state {
            State::Open(conn) => Ok(conn),
            State::Failed(message) => Err(StoreError::Unavailable(message.clone())),
        }
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        if self.claimed {
            release(&self.path);
        }
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("path", &self.path)
            .field("available", &self.is_available())
            .finish()
    }
}

fn claim(path: &Path) -> Result<(), StoreError> {
    let mut open = OPEN_PATHS.lock().unwrap_or_else(|e| e.into_inner());
    if !open.insert(path.to_path_buf()) {
        return Err(StoreError::AlreadyOpen(path.to_path_buf()));
    }
    Ok(())
}

fn release(path: &Path) {
    let mut open = OPEN_PATHS.lock().unwrap_or_else(|e| e.into_inner());
    open.remove(path);
}

/// Canonical location of the backing file, creating its directory first.
///
/// Different spellings of one file (`..`, symlinks) resolve to the same key.
fn resolve(path: &Path) -> Result<PathBuf, String> {
    if path.as_os_str().is_empty() {
        return Err("database path is empty".to_string());
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| format!("database path {} has no file name", path.display()))?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|e| format!("failed to create data directory {}: {e}", parent.display()))?;
    let parent = fs::canonicalize(parent)
        .map_err(|e| format!("failed to resolve data directory {}: {e}", parent.display()))?;

    let candidate = parent.join(file_name);
    Ok(fs::canonicalize(&candidate).unwrap_or(candidate))
}

fn init(path: &Path) -> Result<Connection, String> {
    let conn = Connection::open(path)
        .map_err(|e| format!("failed to open database {}: {e}", path.display()))?;
    conn.execute_batch(SCHEMA)
        .map_err(|e| format!("failed to initialize schema: {e}"))?;
    Ok(conn)
}

fn score_from_row(row: &Row<'_>) -> rusqlite::Result<ScoreRecord> {
    let created_at: DateTime<Utc> = row.get(4)?;
    Ok(ScoreRecord {
        id: row.get(0)?,
        player_name: row.get(1)?,
        score: row.get(2)?,
        level_name: row.get(3)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_LIMIT;
    use tempfile::TempDir;

    fn temp_store() -> (RecordStore, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let store = RecordStore::open(dir.path().join("scores.db")).expect("open store");
        assert!(store.is_available());
        (store, dir)
    }

    fn names(rows: &[ScoreRecord]) -> Vec<(&str, i64)> {
        rows.iter().map(|r| (r.player_name.as_str(), r.score)).collect()
    }

    #[test]
    fn top_scores_orders_by_score_descending() {
        let (store, _dir) = temp_store();
        store.add("Alice", 100).unwrap();
        store.add("Bob", 200).unwrap();

        let top = store.top_scores(DEFAULT_LIMIT).unwrap();
        assert_eq!(names(&top), vec![("Bob", 200), ("Alice", 100)]);
        assert!(top.iter().all(|r| r.level_name == DEFAULT_LEVEL));
    }

    #[test]
    fn ties_keep_insertion_order_and_limit_applies() {
        let (store, _dir) = temp_store();
        store.add("first", 50).unwrap();
        store.add("second", 50).unwrap();
        store.add("third", 10).unwrap();
        store.add("first", 50).unwrap();

        let top = store.top_scores(3).unwrap();
        assert_eq!(names(&top), vec![("first", 50), ("second", 50), ("first", 50)]);
        assert!(top[0].id < top[1].id && top[1].id < top[2].id);
    }

    #[test]
    fn level_filter_is_exact_and_case_sensitive() {
        let (store, _dir) = temp_store();
        store.add_for_level("A", 50, "Level1").unwrap();
        store.add_for_level("B", 60, "Level2").unwrap();
        store.add_for_level("C", 70, "level1").unwrap();

        let level1 = store.top_scores_for_level("Level1", DEFAULT_LIMIT).unwrap();
        assert_eq!(names(&level1), vec![("A", 50)]);
        assert_eq!(level1[0].level_name, "Level1");

        assert!(store.top_scores_for_level("Level3", 10).unwrap().is_empty());
    }

    #[test]
    fn non_positive_limit_returns_nothing() {
        let (store, _dir) = temp_store();
        store.add("Alice", 100).unwrap();

        assert!(store.top_scores(0).unwrap().is_empty());
        assert!(store.top_scores(-5).unwrap().is_empty());
        assert!(store.top_scores_for_level(DEFAULT_LEVEL, 0).unwrap().is_empty());
    }

    #[test]
    fn empty_player_name_is_rejected() {
        let (store, _dir) = temp_store();

        for name in ["", "  "] {
            let err = store.add(name, 10).unwrap_err();
            assert!(matches!(err, StoreError::InvalidInput(_)));
        }
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn duplicates_are_permitted_and_counted() {
        let (store, _dir) = temp_store();
        store.add("Alice", 100).unwrap();
        store.add("Alice", 100).unwrap();

        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.top_scores(1).unwrap().len(), 1);
    }

    #[test]
    fn clear_all_empties_table_without_reusing_ids() {
        let (store, _dir) = temp_store();
        let a = store.add("Alice", 100).unwrap();
        let b = store.add("Bob", 200).unwrap();
        assert!(b.id > a.id);

        store.clear_all().unwrap();
        assert_eq!(store.count().unwrap(), 0);

        let c = store.add("Carol", 5).unwrap();
        assert!(c.id > b.id);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn rows_survive_close_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");

        let store = RecordStore::open(&path).unwrap();
        let alice = store.add_for_level("Alice", 100, "Level1").unwrap();
        store.add("Bob", 200).unwrap();
        let before = store.top_scores(DEFAULT_LIMIT).unwrap();
        store.close().unwrap();

        let reopened = RecordStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 2);
        assert_eq!(reopened.top_scores(DEFAULT_LIMIT).unwrap(), before);

        let level1 = reopened.top_scores_for_level("Level1", 10).unwrap();
        assert_eq!(level1[0].id, alice.id);
        assert_eq!(level1[0].created_at, alice.created_at);
    }

    #[test]
    fn second_instance_on_same_file_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");

        let first = RecordStore::open(&path).unwrap();
        let err = RecordStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyOpen(_)));

        drop(first);
        assert!(RecordStore::open(&path).is_ok());
    }

    #[test]
    fn failed_init_reports_unavailable_for_every_operation() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let store = RecordStore::open(blocker.join("scores.db")).expect("store value");
        assert!(!store.is_available());

        assert!(matches!(store.add("Alice", 1), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.top_scores(10), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.top_scores(0), Err(StoreError::Unavailable(_))));
        assert!(matches!(
            store.top_scores_for_level("Level1", 10),
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(store.count(), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.clear_all(), Err(StoreError::Unavailable(_))));
        assert!(store.close().is_ok());
    }

    #[test]
    fn aliased_path_to_open_file_is_refused() {
        let dir = TempDir::new().unwrap();
        let first = RecordStore::open(dir.path().join("scores.db")).unwrap();
        assert!(first.is_available());

        let alias = dir.path().join("sub").join("..").join("scores.db");
        let err = RecordStore::open(&alias).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyOpen(ref p) if p == first.path()));

        first.add("Alice", 1).unwrap();
        drop(first);

        let reopened = RecordStore::open(&alias).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn empty_path_yields_unavailable_store() {
        let store = RecordStore::open("").expect("store value");

        assert!(!store.is_available());
        assert!(matches!(store.add("Alice", 1), Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn failed_write_is_io_error_and_leaves_no_row() {
        let (store, _dir) = temp_store();
        store.add("Alice", 100).unwrap();

        let other = Connection::open(store.path()).unwrap();
        other
            .execute_batch(
                "CREATE TRIGGER reject_inserts BEFORE INSERT ON high_scores
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let err = store.add("Bob", 200).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(err.kind(), "io");
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(names(&store.top_scores(10).unwrap()), vec![("Alice", 100)]);

        other.execute_batch("DROP TRIGGER reject_inserts;").unwrap();
        store.add("Bob", 200).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }
}
