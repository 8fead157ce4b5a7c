//! Layered server configuration.
//!
//! Settings are read from a `common` + `env` file pair inside the config
//! directory (the `env` file overrides `common`), then from `STRATA_*`
//! environment variables. Every option has a default, so a missing
//! directory still yields a runnable configuration.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
  pub host: String,
  pub port: u16,
}

impl ServerSettings {
  pub fn addr(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
  pub host:     String,
  pub port:     u16,
  pub prefix:   String,
  pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  pub server: ServerSettings,
  pub redis:  RedisSettings,
}

impl Settings {
  /// Load settings from `dir` (`common.*` then `env.*`), falling back to
  /// defaults for anything unset.
  pub fn load(dir: &Path) -> Result<Self, config::ConfigError> {
    let source = |name: &str| {
      config::File::with_name(&dir.join(name).to_string_lossy())
        .required(false)
    };

    config::Config::builder()
      .set_default("server.host", "localhost")?
      .set_default("server.port", 8080)?
      .set_default("redis.host", "localhost")?
      .set_default("redis.port", 6379)?
      .set_default("redis.prefix", "rdb")?
      .set_default("redis.password", "")?
      .add_source(source("common"))
      .add_source(source("env"))
      .add_source(config::Environment::with_prefix("STRATA").separator("__"))
      .build()?
      .try_deserialize()
  }
}
