use anyhow::{Context as _, Result};
use nudge_core::channel::Channels;
use nudge_core::config::EnginePolicy;
use nudge_core::engine::ReminderEngine;
use nudge_core::store::SqliteConnector;
use std::path::PathBuf;

/// Global options shared by every command.
pub struct Context {
    pub db: PathBuf,
    pub config: Option<PathBuf>,
    pub json: bool,
}

impl Context {
    pub fn new(db: PathBuf, config: Option<PathBuf>, json: bool) -> Self {
        Self { db, config, json }
    }

    pub fn policy(&self) -> Result<EnginePolicy> {
        EnginePolicy::load(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("loading engine policy from {}", path.display()),
            None => "validating default engine policy".to_string(),
        })
    }

    /// Open the database, creating the file and schema when missing.
    pub fn connector(&self) -> Result<SqliteConnector> {
        SqliteConnector::open(&self.db)
            .with_context(|| format!("opening database {}", self.db.display()))
    }

    /// Channels are read from the environment once, here. Must be called
    /// outside any async runtime: the chat channel owns a blocking HTTP client.
    pub fn channels(&self, policy: &EnginePolicy) -> Channels {
        Channels::from_env(policy.send_timeout())
    }

    pub fn engine(&self) -> Result<ReminderEngine<SqliteConnector>> {
        let policy = self.policy()?;
        let channels = self.channels(&policy);
        Ok(ReminderEngine::new(self.connector()?, channels, policy))
    }
}
