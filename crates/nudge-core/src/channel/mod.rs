//! Notification channels.
//!
//! Every channel implements [`Notifier`]. Ordinary delivery failures are
//! reported as `false` from `send`; only construction can fail, and a channel
//! that fails to construct is simply absent from [`Channels`].

pub mod mail;
pub mod notice;
pub mod whatsapp;

use std::collections::HashMap;
use std::time::Duration;

use crate::config::{MailConfig, WhatsAppConfig};
use crate::types::ChannelKind;

pub use mail::MailNotifier;
pub use notice::{Notice, Rendered, Urgency};
pub use whatsapp::WhatsAppNotifier;

pub trait Notifier: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Turn urgency context into channel-specific text or markup.
    fn render(&self, notice: &Notice) -> Rendered;

    /// Attempt delivery. Never panics or errors for delivery problems.
    fn send(&self, destination: &str, subject: &str, body: &str) -> bool;

    /// Check that the transport is reachable with the configured credentials.
    fn verify(&self) -> bool {
        true
    }
}

/// The set of usable channels, keyed by kind and resolved once at startup.
#[derive(Default)]
pub struct Channels {
    by_kind: HashMap<ChannelKind, Box<dyn Notifier>>,
}

impl Channels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a notifier, replacing any previous one of the same kind.
    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.by_kind.insert(notifier.kind(), Box::new(notifier));
        self
    }

    pub fn get(&self, kind: ChannelKind) -> Option<&dyn Notifier> {
        self.by_kind.get(&kind).map(|n| n.as_ref())
    }

    pub fn is_enabled(&self, kind: ChannelKind) -> bool {
        self.by_kind.contains_key(&kind)
    }

    pub fn enabled(&self) -> Vec<ChannelKind> {
        ChannelKind::all()
            .iter()
            .copied()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }

    /// Build every channel whose configuration is present in the environment.
    ///
    /// A channel with missing or malformed credentials is left out and logged;
    /// the others stay usable.
    pub fn from_env(send_timeout: Duration) -> Self {
        let mut channels = Channels::new();

        match MailConfig::from_env().and_then(|cfg| MailNotifier::new(cfg, send_timeout)) {
            Ok(mail) => channels = channels.with(mail),
            Err(e) => tracing::warn!("email channel disabled: {e}"),
        }

        match WhatsAppConfig::from_env().and_then(|cfg| WhatsAppNotifier::new(cfg, send_timeout))
        {
            Ok(chat) => channels = channels.with(chat),
            Err(e) => tracing::warn!("whatsapp channel disabled: {e}"),
        }

        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent(ChannelKind);

    impl Notifier for Silent {
        fn kind(&self) -> ChannelKind {
            self.0
        }

        fn render(&self, notice: &Notice) -> Rendered {
            Rendered {
                subject: notice.task_name.clone(),
                body: String::new(),
            }
        }

        fn send(&self, _destination: &str, _subject: &str, _body: &str) -> bool {
            true
        }
    }

    #[test]
    fn empty_set_has_nothing_enabled() {
        let channels = Channels::new();
        assert!(channels.enabled().is_empty());
        assert!(channels.get(ChannelKind::Email).is_none());
    }

    #[test]
    fn registered_kind_is_resolvable() {
        let channels = Channels::new().with(Silent(ChannelKind::Whatsapp));
        assert_eq!(channels.enabled(), vec![ChannelKind::Whatsapp]);
        assert_eq!(
            channels.get(ChannelKind::Whatsapp).map(|n| n.kind()),
            Some(ChannelKind::Whatsapp)
        );
        assert!(!channels.is_enabled(ChannelKind::Email));
    }
}
