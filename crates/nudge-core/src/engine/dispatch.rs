use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::{Channels, Notice};
use crate::error::{NudgeError, Result};
use crate::reminder::{AttemptLog, ReminderWithTask};
use crate::store::ReminderStore;
use crate::types::AttemptOutcome;

/// What happened to one candidate on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Delivered and logged as `sent`.
    Sent,
    /// Delivery attempted and logged as `failed`; eligible again next tick.
    Failed,
    /// A `sent` attempt already exists inside the recency window.
    SkippedRecent,
    /// The `sent` count has reached the reminder's frequency.
    SkippedExhausted,
}

impl DispatchOutcome {
    pub fn fired(self) -> bool {
        self == DispatchOutcome::Sent
    }
}

/// Guards, renders, sends, and logs a single candidate.
pub struct Dispatcher {
    channels: Channels,
    recency_window: Duration,
}

impl Dispatcher {
    pub fn new(channels: Channels, recency_window: Duration) -> Self {
        Self {
            channels,
            recency_window,
        }
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    /// Errors are store query failures before any send happened; the caller
    /// isolates them to this reminder.
    pub fn dispatch<S: ReminderStore>(
        &self,
        store: &S,
        candidate: &ReminderWithTask,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome> {
        let id = candidate.id();
        let reminder = &candidate.reminder;

        let recent = store.count_recent_sent(id, now - self.recency_window)?;
        if recent > 0 {
            tracing::debug!(reminder_id = id, "already sent within recency window, skipping");
            return Ok(DispatchOutcome::SkippedRecent);
        }

        let total = store.count_total_sent(id)?;
        if total >= reminder.frequency {
            tracing::debug!(
                reminder_id = id,
                frequency = reminder.frequency,
                "frequency limit reached, left for cleanup"
            );
            return Ok(DispatchOutcome::SkippedExhausted);
        }

        let notice = Notice::for_candidate(candidate, now);
        tracing::info!(
            reminder_id = id,
            attempt = total + 1,
            frequency = reminder.frequency,
            channel = %reminder.channel,
            "sending reminder: {}",
            notice.urgency
        );

        let delivered = match self.channels.get(reminder.channel) {
            Some(notifier) => {
                let rendered = notifier.render(&notice);
                notifier.send(&reminder.destination, &rendered.subject, &rendered.body)
            }
            None => {
                tracing::warn!(reminder_id = id, "{}", NudgeError::ChannelDisabled(reminder.channel));
                false
            }
        };

        let outcome = AttemptOutcome::from_delivered(delivered);
        // The send already happened; a lost log entry degrades to at-least-once.
        if let Err(e) = store.insert_attempt_log(&AttemptLog::new(candidate, outcome, now)) {
            tracing::warn!(reminder_id = id, "failed to record {outcome} attempt: {e}");
        }

        Ok(match outcome {
            AttemptOutcome::Sent => DispatchOutcome::Sent,
            AttemptOutcome::Failed => DispatchOutcome::Failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{noon, seed_reminder, tmp_store, Recorder};
    use crate::store::CandidateQuery;
    use crate::types::ChannelKind;

    fn candidate_at(
        store: &crate::store::SqliteStore,
        now: DateTime<Utc>,
    ) -> ReminderWithTask {
        let mut found = store
            .find_candidate_reminders(&CandidateQuery {
                now,
                tick_interval: Duration::minutes(1),
                overdue_grace: Duration::hours(24),
            })
            .unwrap();
        assert_eq!(found.len(), 1, "expected exactly one candidate");
        found.remove(0).unwrap()
    }

    #[test]
    fn sends_rendered_notice_and_logs_sent() {
        let (_dir, _c, store) = tmp_store();
        let id = seed_reminder(&store, "T1", noon() + Duration::hours(2), 2, 1);
        let recorder = Recorder::new(ChannelKind::Email, true);
        let sent = recorder.sent();
        let dispatcher = Dispatcher::new(Channels::new().with(recorder), Duration::hours(1));

        let c = candidate_at(&store, noon());
        let outcome = dispatcher.dispatch(&store, &c, noon()).unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, "ada@example.com");
        assert!(sent[0].subject.contains("Essay"));
        let logs = store.attempt_logs_for(id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].outcome, AttemptOutcome::Sent);
    }

    #[test]
    fn disabled_channel_logs_failed_attempt() {
        let (_dir, _c, store) = tmp_store();
        let id = seed_reminder(&store, "T1", noon() + Duration::hours(2), 2, 1);
        let dispatcher = Dispatcher::new(Channels::new(), Duration::hours(1));

        let c = candidate_at(&store, noon());
        assert_eq!(
            dispatcher.dispatch(&store, &c, noon()).unwrap(),
            DispatchOutcome::Failed
        );
        let logs = store.attempt_logs_for(id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].outcome, AttemptOutcome::Failed);
    }

    #[test]
    fn recent_sent_attempt_blocks_second_send() {
        let (_dir, _c, store) = tmp_store();
        seed_reminder(&store, "T1", noon() + Duration::hours(2), 2, 5);
        let recorder = Recorder::new(ChannelKind::Email, true);
        let sent = recorder.sent();
        let dispatcher = Dispatcher::new(Channels::new().with(recorder), Duration::hours(1));

        let c = candidate_at(&store, noon());
        dispatcher.dispatch(&store, &c, noon()).unwrap();
        let again = dispatcher
            .dispatch(&store, &c, noon() + Duration::seconds(30))
            .unwrap();

        assert_eq!(again, DispatchOutcome::SkippedRecent);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn exhausted_reminder_is_not_sent() {
        let (_dir, _c, store) = tmp_store();
        let id = seed_reminder(&store, "T1", noon() + Duration::hours(2), 2, 1);
        store
            .insert_attempt_log(&AttemptLog {
                reminder_id: id,
                channel: ChannelKind::Email,
                destination: "ada@example.com".into(),
                outcome: AttemptOutcome::Sent,
                sent_at: noon() - Duration::hours(5),
            })
            .unwrap();
        let recorder = Recorder::new(ChannelKind::Email, true);
        let sent = recorder.sent();
        let dispatcher = Dispatcher::new(Channels::new().with(recorder), Duration::hours(1));

        let c = candidate_at(&store, noon());
        assert_eq!(
            dispatcher.dispatch(&store, &c, noon()).unwrap(),
            DispatchOutcome::SkippedExhausted
        );
        assert!(sent.lock().unwrap().is_empty());
    }
}
