mod config;
mod db;
mod error;
mod handlers;
mod model;

use std::process::ExitCode;
use std::sync::Arc;

use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use db::{SqliteTodoRepository, TodoRepository};
use error::StartupError;

const DEFAULT_LOG_FILTER: &str = "todo_api=info,actix_web=info";

fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    )
    .with_target(true)
    .init();
}

async fn run(config: Config) -> Result<(), StartupError> {
  info!(
    port = config.port,
    environment = ?config.environment,
    pool_size = config.pool_size,
    "starting todo api"
  );

  let sqlite = SqliteTodoRepository::connect(&config.database_url, config.pool_size)?;
  sqlite.migrate()?;
  info!("database ready, schema synchronized");

  let repo: Arc<dyn TodoRepository> = Arc::new(sqlite);
  let repo = web::Data::from(repo);
  let static_dir = config.environment.is_production().then(|| config.static_dir.clone());
  if let Some(dir) = &static_dir {
    info!(dir = %dir.display(), "serving static assets");
  }

  let server_repo = repo.clone();
  let server = HttpServer::new(move || {
    App::new()
      .wrap(Logger::default())
      .app_data(server_repo.clone())
      .configure(handlers::configure)
      .configure(|cfg| {
        // unmatched paths fall through to the bundled client
        if let Some(dir) = &static_dir {
          cfg.service(Files::new("/", dir.clone()).index_file("index.html"));
        }
      })
  })
  .bind(config.bind_addr())?;

  info!(host = %config.host, port = config.port, "listening");
  server.run().await?;

  info!("server stopped");
  Ok(())
}

#[actix_web::main]
async fn main() -> ExitCode {
  init_tracing();

  let config = match Config::load() {
    Ok(config) => config,
    Err(err) => {
      error!("{}", StartupError::from(err));
      return ExitCode::FAILURE;
    }
  };

  match run(config).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("{}", err);
      ExitCode::FAILURE
    }
  }
}
