use anyhow::{Context, Result};

/// Runtime configuration read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    /// Only the comment store needs Postgres; analysis runs without it.
    pub database_url: Option<String>,
    pub rust_log: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Config {
            database_url: non_empty_env("DATABASE_URL"),
            rust_log: non_empty_env("RUST_LOG"),
        }
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to use the reviewer comment store")
    }

    /// Log filter directive; `RUST_LOG` wins over the verbosity flag.
    pub fn log_filter(&self, verbose: bool) -> String {
        match &self.rust_log {
            Some(filter) => filter.clone(),
            None if verbose => format!("{}=debug", env!("CARGO_CRATE_NAME")),
            None => format!("{}=info", env!("CARGO_CRATE_NAME")),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
