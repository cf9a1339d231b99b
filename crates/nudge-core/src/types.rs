use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::NudgeError;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Submitted,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Submitted => "submitted",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = NudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "submitted" => Ok(TaskStatus::Submitted),
            other => Err(NudgeError::UnknownVariant {
                kind: "task status",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Whatsapp,
}

impl ChannelKind {
    pub fn all() -> &'static [ChannelKind] {
        &[ChannelKind::Email, ChannelKind::Whatsapp]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Whatsapp => "whatsapp",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChannelKind {
    type Err = NudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(ChannelKind::Email),
            "whatsapp" => Ok(ChannelKind::Whatsapp),
            other => Err(NudgeError::UnknownVariant {
                kind: "channel",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// AttemptOutcome
// ---------------------------------------------------------------------------

/// Result of one dispatch attempt as recorded in the attempt log.
///
/// Only `Sent` rows count toward the recency and frequency guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Sent,
    Failed,
}

impl AttemptOutcome {
    pub fn from_delivered(delivered: bool) -> Self {
        if delivered {
            AttemptOutcome::Sent
        } else {
            AttemptOutcome::Failed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttemptOutcome::Sent => "sent",
            AttemptOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttemptOutcome {
    type Err = NudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(AttemptOutcome::Sent),
            "failed" => Ok(AttemptOutcome::Failed),
            other => Err(NudgeError::UnknownVariant {
                kind: "attempt outcome",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_kind_parses_its_own_display() {
        for kind in ChannelKind::all() {
            let parsed: ChannelKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let err = "sms".parse::<ChannelKind>().unwrap_err();
        assert!(err.to_string().contains("sms"), "got: {err}");
    }

    #[test]
    fn outcome_from_delivered_flag() {
        assert_eq!(AttemptOutcome::from_delivered(true), AttemptOutcome::Sent);
        assert_eq!(AttemptOutcome::from_delivered(false), AttemptOutcome::Failed);
    }

    #[test]
    fn task_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::Submitted).unwrap();
        assert_eq!(json, "\"submitted\"");
    }
}
