use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use thiserror::Error;

use crate::model::{NewTodo, RecordMeta, Todo};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
  CREATE TABLE IF NOT EXISTS todos (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    body        TEXT NOT NULL CHECK (body <> ''),
    completed   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    deleted_at  TEXT
  );
  CREATE INDEX IF NOT EXISTS idx_todos_deleted_at ON todos (deleted_at);
";

const SELECT_TODO: &str = "SELECT id, body, completed, created_at, updated_at, deleted_at FROM todos";

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("record not found")]
  NotFound,
  #[error("connection pool error: {0}")]
  Pool(#[from] r2d2::Error),
  #[error("database error: {0}")]
  Sql(#[from] rusqlite::Error),
  #[error("database url has no path: {0:?}")]
  InvalidUrl(String),
}

/// Data-access operations over todo records.
///
/// Calls block; async callers should run them on a blocking thread.
pub trait TodoRepository: Send + Sync {
  /// Every live todo, ordered by id.
  fn list(&self) -> Result<Vec<Todo>, StoreError>;
  fn create(&self, new: NewTodo) -> Result<Todo, StoreError>;
  /// Fails with [`StoreError::NotFound`] for unknown or soft-deleted ids.
  fn find(&self, id: i64) -> Result<Todo, StoreError>;
  /// Persists `body` and `completed` of a live record and refreshes `updated_at`.
  fn update(&self, todo: &Todo) -> Result<Todo, StoreError>;
  fn delete(&self, todo: &Todo) -> Result<(), StoreError>;
}

/// Where a `DATABASE_URL` points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
  Memory,
  File(String),
}

impl DbLocation {
  /// `None` when the url names no database at all.
  pub fn parse(database_url: &str) -> Option<Self> {
    let raw = database_url.trim();
    let path = raw
      .strip_prefix("sqlite://")
      .or_else(|| raw.strip_prefix("sqlite:"))
      .unwrap_or(raw)
      .trim();
    if path.is_empty() {
      return None;
    }
    let memory_uri =
      path.starts_with("file::memory:") || (path.starts_with("file:") && path.contains("mode=memory"));
    if path == ":memory:" || memory_uri {
      Some(DbLocation::Memory)
    } else {
      Some(DbLocation::File(path.to_string()))
    }
  }
}

pub struct SqliteTodoRepository {
  pool: Pool<SqliteConnectionManager>,
}

impl SqliteTodoRepository {
  /// Opens the pool. Connections are established eagerly, so an unreachable
  /// database fails here rather than on the first request.
  pub fn connect(database_url: &str, pool_size: u32) -> Result<Self, StoreError> {
    let location =
      DbLocation::parse(database_url).ok_or_else(|| StoreError::InvalidUrl(database_url.to_string()))?;
    let (manager, max_size) = match location {
      // every in-memory connection is its own database
      DbLocation::Memory => (SqliteConnectionManager::memory(), 1),
      DbLocation::File(path) => (SqliteConnectionManager::file(path), pool_size),
    };
    let manager = manager.with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
    let pool = Pool::builder().max_size(max_size).build(manager)?;
    Ok(Self { pool })
  }

  /// Creates the table if it is absent. Existing data is left untouched.
  pub fn migrate(&self) -> Result<(), StoreError> {
    let conn = self.pool.get()?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
  }
}

fn row_to_todo(row: &Row<'_>) -> rusqlite::Result<Todo> {
  Ok(Todo {
    id: row.get(0)?,
    body: row.get(1)?,
    completed: row.get(2)?,
    meta: RecordMeta {
      created_at: row.get(3)?,
      updated_at: row.get(4)?,
      deleted_at: row.get::<_, Option<DateTime<Utc>>>(5)?,
    },
  })
}

impl TodoRepository for SqliteTodoRepository {
  fn list(&self) -> Result<Vec<Todo>, StoreError> {
    let conn = self.pool.get()?;
    let mut stmt = conn.prepare(&format!("{} WHERE deleted_at IS NULL ORDER BY id", SELECT_TODO))?;
    let todos = stmt
      .query_map([], row_to_todo)?
      .collect::<Result<Vec<_>, _>>()?;
    Ok(todos)
  }

  fn create(&self, new: NewTodo) -> Result<Todo, StoreError> {
    let conn = self.pool.get()?;
    let meta = RecordMeta::new(Utc::now());
    conn.execute(
      "INSERT INTO todos (body, completed, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
      params![new.body, new.completed, meta.created_at, meta.updated_at],
    )?;
    Ok(Todo {
      id: conn.last_insert_rowid(),
      body: new.body,
      completed: new.completed,
      meta,
    })
  }

  fn find(&self, id: i64) -> Result<Todo, StoreError> {
    let conn = self.pool.get()?;
    conn
      .query_row(
        &format!("{} WHERE id = ?1 AND deleted_at IS NULL", SELECT_TODO),
        params![id],
        row_to_todo,
      )
      .optional()?
      .ok_or(StoreError::NotFound)
  }

  fn update(&self, todo: &Todo) -> Result<Todo, StoreError> {
    let conn = self.pool.get()?;
    let now = Utc::now();
    let changed = conn.execute(
      "UPDATE todos SET body = ?1, completed = ?2, updated_at = ?3 WHERE id = ?4 AND deleted_at IS NULL",
      params![todo.body, todo.completed, now, todo.id],
    )?;
    if changed == 0 {
      return Err(StoreError::NotFound);
    }
    let mut updated = todo.clone();
    updated.meta.updated_at = now;
    Ok(updated)
  }

  fn delete(&self, todo: &Todo) -> Result<(), StoreError> {
    let conn = self.pool.get()?;
    let changed = conn.execute(
      "UPDATE todos SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
      params![Utc::now(), todo.id],
    )?;
    if changed == 0 {
      return Err(StoreError::NotFound);
    }
    Ok(())
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  pub(crate) fn memory_repo() -> SqliteTodoRepository {
    let repo = SqliteTodoRepository::connect(":memory:", 4).unwrap();
    repo.migrate().unwrap();
    repo
  }

  fn new_todo(body: &str) -> NewTodo {
    NewTodo {
      body: body.to_string(),
      completed: false,
    }
  }

  #[test]
  fn parses_database_urls() {
    assert_eq!(DbLocation::parse(":memory:"), Some(DbLocation::Memory));
    assert_eq!(DbLocation::parse("sqlite::memory:"), Some(DbLocation::Memory));
    assert_eq!(DbLocation::parse("file::memory:"), Some(DbLocation::Memory));
    assert_eq!(DbLocation::parse("sqlite:file::memory:?cache=shared"), Some(DbLocation::Memory));
    assert_eq!(DbLocation::parse("file:todos?mode=memory"), Some(DbLocation::Memory));
    assert_eq!(DbLocation::parse("sqlite://todos.db"), Some(DbLocation::File("todos.db".into())));
    assert_eq!(DbLocation::parse("sqlite:data/todos.db"), Some(DbLocation::File("data/todos.db".into())));
    assert_eq!(DbLocation::parse("/var/lib/todos.db"), Some(DbLocation::File("/var/lib/todos.db".into())));
  }

  #[test]
  fn urls_without_a_path_are_rejected() {
    assert_eq!(DbLocation::parse("sqlite://"), None);
    assert_eq!(DbLocation::parse("sqlite:"), None);
    assert!(matches!(
      SqliteTodoRepository::connect("sqlite://", 2),
      Err(StoreError::InvalidUrl(_))
    ));
  }

  #[test]
  fn memory_uri_shares_one_database_across_the_pool() {
    let repo = SqliteTodoRepository::connect("file::memory:", 4).unwrap();
    repo.migrate().unwrap();
    repo.create(new_todo("visible everywhere")).unwrap();
    assert_eq!(repo.list().unwrap().len(), 1);
  }

  #[test]
  fn list_is_empty_on_fresh_table() {
    let repo = memory_repo();
    assert!(repo.list().unwrap().is_empty());
  }

  #[test]
  fn create_assigns_increasing_ids_and_timestamps() {
    let repo = memory_repo();
    let first = repo.create(new_todo("first")).unwrap();
    let second = repo
      .create(NewTodo {
        body: "second".into(),
        completed: true,
      })
      .unwrap();

    assert!(second.id > first.id);
    assert!(!first.completed);
    assert!(second.completed);
    assert_eq!(first.meta.created_at, first.meta.updated_at);
    assert!(first.meta.deleted_at.is_none());

    let listed = repo.list().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first.id);
    assert_eq!(listed[0].body, "first");
    assert_eq!(listed[1].id, second.id);
  }

  #[test]
  fn empty_body_is_rejected_by_the_table() {
    let repo = memory_repo();
    assert!(matches!(repo.create(new_todo("")), Err(StoreError::Sql(_))));
    assert!(repo.list().unwrap().is_empty());
  }

  #[test]
  fn find_unknown_id_is_not_found() {
    let repo = memory_repo();
    assert!(matches!(repo.find(0), Err(StoreError::NotFound)));
    assert!(matches!(repo.find(42), Err(StoreError::NotFound)));
  }

  #[test]
  fn update_persists_completion_and_touches_updated_at() {
    let repo = memory_repo();
    let mut todo = repo.create(new_todo("walk dog")).unwrap();
    todo.completed = true;

    let updated = repo.update(&todo).unwrap();
    assert!(updated.meta.updated_at >= todo.meta.updated_at);

    let stored = repo.find(todo.id).unwrap();
    assert!(stored.completed);
    assert_eq!(stored.meta.created_at, todo.meta.created_at);
  }

  #[test]
  fn delete_hides_record_and_never_reuses_its_id() {
    let repo = memory_repo();
    let todo = repo.create(new_todo("gone soon")).unwrap();
    repo.delete(&todo).unwrap();

    assert!(repo.list().unwrap().is_empty());
    assert!(matches!(repo.find(todo.id), Err(StoreError::NotFound)));
    assert!(matches!(repo.delete(&todo), Err(StoreError::NotFound)));
    assert!(matches!(repo.update(&todo), Err(StoreError::NotFound)));

    let next = repo.create(new_todo("after")).unwrap();
    assert!(next.id > todo.id);
  }

  #[test]
  fn migrate_keeps_existing_rows() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("todos.db").display());

    let repo = SqliteTodoRepository::connect(&url, 2).unwrap();
    repo.migrate().unwrap();
    let todo = repo.create(new_todo("survives restart")).unwrap();
    drop(repo);

    let reopened = SqliteTodoRepository::connect(&url, 2).unwrap();
    reopened.migrate().unwrap();
    let listed = reopened.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, todo.id);
    assert_eq!(listed[0].body, "survives restart");
  }
}
