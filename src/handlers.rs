use actix_web::{delete, get, patch, post, web, HttpResponse};
use serde_json::json;

use crate::db::TodoRepository;
use crate::error::ApiError;
use crate::model::{NewTodo, SuccessRes};

type Repo = web::Data<dyn TodoRepository>;

/// Cap on a create request. Todo bodies have no length rule of their own;
/// this only bounds how much a single request may buffer.
pub const MAX_JSON_PAYLOAD: usize = 16 * 1024 * 1024;

/// Registers the API routes and the JSON payload policy. The repository is
/// expected as `web::Data<dyn TodoRepository>` app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(
      web::JsonConfig::default()
        .limit(MAX_JSON_PAYLOAD)
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .service(health)
    .service(list_todos)
    .service(create_todo)
    .service(update_todo)
    .service(delete_todo);
}

// ids that don't parse can never match a row
fn parse_id(raw: &str) -> Result<i64, ApiError> {
  raw.parse().map_err(|_| ApiError::NotFound)
}

#[get("/health")]
async fn health() -> HttpResponse {
  HttpResponse::Ok().json(json!({"status": "ok"}))
}

#[get("/api/todos")]
async fn list_todos(repo: Repo) -> Result<HttpResponse, ApiError> {
  let todos = web::block(move || repo.list()).await??;
  Ok(HttpResponse::Ok().json(todos))
}

#[post("/api/todos")]
async fn create_todo(repo: Repo, req: web::Json<NewTodo>) -> Result<HttpResponse, ApiError> {
  let new = req.into_inner();
  if new.body.is_empty() {
    return Err(ApiError::BadRequest("Todo body cannot be empty".into()));
  }
  let todo = web::block(move || repo.create(new)).await??;
  tracing::debug!(id = todo.id, "created todo");
  Ok(HttpResponse::Created().json(todo))
}

/// Marks the todo completed. Repeated calls leave it completed.
#[patch("/api/todos/{id}")]
async fn update_todo(repo: Repo, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
  let id = parse_id(&path)?;
  web::block(move || {
    let mut todo = repo.find(id)?;
    todo.completed = true;
    repo.update(&todo)
  })
  .await??;
  Ok(HttpResponse::Ok().json(SuccessRes::ok()))
}

#[delete("/api/todos/{id}")]
async fn delete_todo(repo: Repo, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
  let id = parse_id(&path)?;
  web::block(move || {
    let todo = repo.find(id)?;
    repo.delete(&todo)
  })
  .await??;
  tracing::debug!(id, "deleted todo");
  Ok(HttpResponse::Ok().json(SuccessRes::ok()))
}
