use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::db::DbLocation;

pub const DEFAULT_PORT: u16 = 5050;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_POOL_SIZE: u32 = 10;
pub const DEFAULT_STATIC_DIR: &str = "./client/dist";
const ENV_FILE: &str = ".env";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to load .env: {0}")]
  EnvFile(#[from] dotenvy::Error),
  #[error("{0} must be set")]
  Missing(&'static str),
  #[error("invalid {name}: {value:?}")]
  Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
  Production,
  Development,
}

impl Environment {
  fn from_value(value: Option<&str>) -> Self {
    match value {
      Some("production") => Environment::Production,
      _ => Environment::Development,
    }
  }

  pub fn is_production(self) -> bool {
    self == Environment::Production
  }
}

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  pub host: String,
  pub port: u16,
  pub environment: Environment,
  pub pool_size: u32,
  pub static_dir: PathBuf,
}

impl Config {
  /// Reads the process environment. Outside production `./.env` must be
  /// present and well formed; variables already set win over its values.
  pub fn load() -> Result<Self, ConfigError> {
    Self::load_from(Path::new(ENV_FILE), |key| env::var(key).ok())
  }

  /// Like [`Config::load`] with an explicit env file and variable source. The
  /// file is only read from `env_file` itself, never from parent directories.
  pub fn load_from<F>(env_file: &Path, lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let environment = Environment::from_value(lookup("ENV").as_deref());
    let file_vars = if environment.is_production() {
      HashMap::new()
    } else {
      dotenvy::from_path_iter(env_file)?.collect::<Result<HashMap<_, _>, _>>()?
    };
    Self::from_lookup(|key| lookup(key).or_else(|| file_vars.get(key).cloned()))
  }

  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let database_url = lookup("DATABASE_URL")
      .filter(|url| !url.trim().is_empty())
      .ok_or(ConfigError::Missing("DATABASE_URL"))?;
    if DbLocation::parse(&database_url).is_none() {
      return Err(ConfigError::Invalid {
        name: "DATABASE_URL",
        value: database_url,
      });
    }

    let port = match lookup("PORT").filter(|p| !p.is_empty()) {
      Some(value) => value
        .parse()
        .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
      None => DEFAULT_PORT,
    };

    let pool_size = match lookup("DB_POOL_SIZE").filter(|p| !p.is_empty()) {
      Some(value) => match value.parse::<u32>() {
        Ok(size) if size > 0 => size,
        _ => return Err(ConfigError::Invalid { name: "DB_POOL_SIZE", value }),
      },
      None => DEFAULT_POOL_SIZE,
    };

    Ok(Config {
      database_url,
      host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
      port,
      environment: Environment::from_value(lookup("ENV").as_deref()),
      pool_size,
      static_dir: lookup("STATIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
    })
  }

  pub fn bind_addr(&self) -> (String, u16) {
    (self.host.clone(), self.port)
  }
}
