use crate::error::{NudgeError, Result};
use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// EnginePolicy
// ---------------------------------------------------------------------------

/// Timing knobs for the reminder cycle.
///
/// `recency_window_secs` must be at least `tick_interval_secs`; a lookback
/// shorter than one tick cannot suppress a re-send from the next tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnginePolicy {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_recency_window")]
    pub recency_window_secs: u64,
    #[serde(default = "default_overdue_grace")]
    pub overdue_grace_hours: u32,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_tick_interval() -> u64 {
    60
}

fn default_recency_window() -> u64 {
    3600
}

fn default_overdue_grace() -> u32 {
    24
}

fn default_send_timeout() -> u64 {
    30
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            recency_window_secs: default_recency_window(),
            overdue_grace_hours: default_overdue_grace(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

impl EnginePolicy {
    /// Load from a YAML file, or fall back to defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let policy = match path {
            Some(p) => {
                let data = std::fs::read_to_string(p)?;
                serde_yaml::from_str::<EnginePolicy>(&data)?
            }
            None => EnginePolicy::default(),
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_secs == 0 {
            return Err(NudgeError::ConfigurationInvalid(
                "tick_interval_secs must be greater than zero".into(),
            ));
        }
        if self.recency_window_secs < self.tick_interval_secs {
            return Err(NudgeError::ConfigurationInvalid(format!(
                "recency_window_secs ({}) must be >= tick_interval_secs ({})",
                self.recency_window_secs, self.tick_interval_secs
            )));
        }
        if self.send_timeout_secs == 0 {
            return Err(NudgeError::ConfigurationInvalid(
                "send_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::seconds(self.tick_interval_secs as i64)
    }

    pub fn recency_window(&self) -> Duration {
        Duration::seconds(self.recency_window_secs as i64)
    }

    pub fn overdue_grace(&self) -> Duration {
        Duration::hours(i64::from(self.overdue_grace_hours))
    }

    pub fn send_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.send_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// MailConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS when true, STARTTLS otherwise.
    pub secure: bool,
    pub user: String,
    pub password: String,
    pub from: String,
}

impl MailConfig {
    /// Read `SMTP_*` variables through `lookup`.
    ///
    /// `SMTP_USER` and `SMTP_PASS` are required; everything else is defaulted.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("SMTP_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                NudgeError::ConfigurationInvalid(format!("SMTP_PORT is not a port number: {raw}"))
            })?,
            None => 587,
        };
        Ok(Self {
            host: lookup("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            port,
            secure: lookup("SMTP_SECURE").as_deref() == Some("true"),
            user: required(&lookup, "SMTP_USER")?,
            password: required(&lookup, "SMTP_PASS")?,
            from: lookup("SMTP_FROM")
                .unwrap_or_else(|| "LMS Reminder System <noreply@lms.com>".to_string()),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }
}

// ---------------------------------------------------------------------------
// WhatsAppConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_base: String,
}

impl WhatsAppConfig {
    /// Read `TWILIO_*` variables through `lookup`, validating credential shape.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let account_sid = required(&lookup, "TWILIO_ACCOUNT_SID")?;
        let auth_token = required(&lookup, "TWILIO_AUTH_TOKEN")?;

        let sid_shape = Regex::new(r"^AC[0-9A-Za-z]{32}$")
            .map_err(|e| NudgeError::ConfigurationInvalid(e.to_string()))?;
        if !sid_shape.is_match(&account_sid) {
            return Err(NudgeError::ConfigurationInvalid(
                "TWILIO_ACCOUNT_SID must start with \"AC\" and be 34 characters long".into(),
            ));
        }
        if auth_token.len() != 32 {
            return Err(NudgeError::ConfigurationInvalid(
                "TWILIO_AUTH_TOKEN must be 32 characters long".into(),
            ));
        }

        Ok(Self {
            account_sid,
            auth_token,
            from_number: lookup("TWILIO_WHATSAPP_NUMBER")
                .unwrap_or_else(|| "whatsapp:+14155238886".to_string()),
            api_base: lookup("TWILIO_API_BASE")
                .unwrap_or_else(|| "https://api.twilio.com".to_string()),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(NudgeError::ConfigurationInvalid(format!("{key} is not set"))),
    }
}
