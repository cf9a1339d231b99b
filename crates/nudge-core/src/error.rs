use thiserror::Error;

use crate::types::ChannelKind;

#[derive(Debug, Error)]
pub enum NudgeError {
    /// Connection-level failure. Fatal for the current cycle only.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("{channel} send failed: {reason}")]
    ChannelSendFailed { channel: ChannelKind, reason: String },

    #[error("channel disabled: {0}")]
    ChannelDisabled(ChannelKind),

    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl From<rusqlite::Error> for NudgeError {
    fn from(e: rusqlite::Error) -> Self {
        NudgeError::QueryFailed(e.to_string())
    }
}

impl NudgeError {
    /// True when the error means the store could not be reached at all.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, NudgeError::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, NudgeError>;
