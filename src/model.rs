use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Bookkeeping timestamps owned by the store. Clients never see or set these.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMeta {
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// Set when the row is soft-deleted.
  pub deleted_at: Option<DateTime<Utc>>,
}

impl RecordMeta {
  pub fn new(now: DateTime<Utc>) -> Self {
    Self {
      created_at: now,
      updated_at: now,
      deleted_at: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Todo {
  pub id: i64,
  pub body: String,
  pub completed: bool,
  #[serde(skip)]
  pub meta: RecordMeta,
}

/// Body of `POST /api/todos`. Omitted and `null` fields both take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTodo {
  #[serde(default, deserialize_with = "null_as_default")]
  pub body: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub completed: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessRes {
  pub success: bool,
}

impl SuccessRes {
  pub fn ok() -> Self {
    Self { success: true }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorRes {
  pub error: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn todo_serializes_without_timestamps() {
    let todo = Todo {
      id: 7,
      body: "buy milk".into(),
      completed: false,
      meta: RecordMeta::new(Utc::now()),
    };

    let value = serde_json::to_value(&todo).unwrap();
    assert_eq!(value, json!({"id": 7, "body": "buy milk", "completed": false}));
  }

  #[test]
  fn new_todo_fields_default_when_omitted() {
    let req: NewTodo = serde_json::from_str("{}").unwrap();
    assert_eq!(req.body, "");
    assert!(!req.completed);

    // a client-supplied id is ignored
    let req: NewTodo = serde_json::from_str(r#"{"id": 99, "body": "x", "completed": true}"#).unwrap();
    assert_eq!(req.body, "x");
    assert!(req.completed);
  }

  #[test]
  fn null_fields_read_as_defaults() {
    let req: NewTodo = serde_json::from_str(r#"{"body": null, "completed": null}"#).unwrap();
    assert_eq!(req.body, "");
    assert!(!req.completed);

    assert!(serde_json::from_str::<NewTodo>(r#"{"body": 12}"#).is_err());
  }
}
