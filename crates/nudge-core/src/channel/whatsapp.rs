//! WhatsApp channel via the Twilio Messages REST API.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::WhatsAppConfig;
use crate::error::{NudgeError, Result};
use crate::types::ChannelKind;

use super::{Notice, Notifier, Rendered};

pub struct WhatsAppNotifier {
    client: Client,
    config: WhatsAppConfig,
}

impl WhatsAppNotifier {
    pub fn new(config: WhatsAppConfig, send_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(send_timeout)
            .build()
            .map_err(|e| NudgeError::ConfigurationInvalid(format!("http client: {e}")))?;
        tracing::info!(from = %config.from_number, "whatsapp channel configured");
        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    fn account_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    fn post_message(&self, destination: &str, body: &str) -> Result<()> {
        let to = format!("whatsapp:{destination}");
        let form = [
            ("Body", body),
            ("From", self.config.from_number.as_str()),
            ("To", to.as_str()),
        ];
        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .map_err(|e| send_failed(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let detail = resp.text().unwrap_or_default();
            Err(send_failed(format!("HTTP {status}: {detail}")))
        }
    }
}

fn send_failed(reason: String) -> NudgeError {
    NudgeError::ChannelSendFailed {
        channel: ChannelKind::Whatsapp,
        reason,
    }
}

impl Notifier for WhatsAppNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Whatsapp
    }

    fn render(&self, notice: &Notice) -> Rendered {
        let body = format!(
            "*Task Reminder*\n\n\
             Hi {student}!\n\n\
             You have an upcoming task:\n\n\
             *{task}*\n\
             Course: {course}\n\
             Due: {due}\n\
             {urgency}\n\n\
             Don't forget to complete your task on time. Good luck!",
            student = notice.student_name,
            task = notice.task_name,
            course = notice.course_name,
            due = notice.due_label(),
            urgency = notice.urgency,
        );
        Rendered {
            subject: "Task Reminder".to_string(),
            body,
        }
    }

    /// The subject is unused: WhatsApp messages carry only a body.
    fn send(&self, destination: &str, _subject: &str, body: &str) -> bool {
        match self.post_message(destination, body) {
            Ok(()) => {
                tracing::debug!(to = destination, "whatsapp message sent");
                true
            }
            Err(e) => {
                tracing::warn!(to = destination, "{e}");
                false
            }
        }
    }

    fn verify(&self) -> bool {
        match self
            .client
            .get(self.account_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .send()
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("whatsapp connection check failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Urgency;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    const SID: &str = "AC0123456789abcdef0123456789abcdef";
    const TOKEN: &str = "0123456789abcdef0123456789abcdef";

    fn notifier(api_base: String) -> WhatsAppNotifier {
        let cfg = WhatsAppConfig {
            account_sid: SID.into(),
            auth_token: TOKEN.into(),
            from_number: "whatsapp:+14155238886".into(),
            api_base,
        };
        WhatsAppNotifier::new(cfg, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn successful_post_returns_true() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", format!("/2010-04-01/Accounts/{SID}/Messages.json").as_str())
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("To".into(), "whatsapp:+15550001111".into()),
                Matcher::UrlEncoded("From".into(), "whatsapp:+14155238886".into()),
                Matcher::UrlEncoded("Body".into(), "hello".into()),
            ]))
            .with_status(201)
            .with_body(r#"{"sid":"SM123"}"#)
            .create();

        assert!(notifier(server.url()).send("+15550001111", "ignored", "hello"));
        mock.assert();
    }

    #[test]
    fn error_status_returns_false() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", format!("/2010-04-01/Accounts/{SID}/Messages.json").as_str())
            .with_status(401)
            .with_body(r#"{"message":"Authenticate"}"#)
            .create();

        assert!(!notifier(server.url()).send("+15550001111", "", "hello"));
        mock.assert();
    }

    #[test]
    fn unreachable_endpoint_returns_false() {
        // Port 9 (discard) on localhost is closed in test environments.
        assert!(!notifier("http://127.0.0.1:9".into()).send("+1555", "", "hello"));
    }

    #[test]
    fn verify_checks_account_endpoint() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", format!("/2010-04-01/Accounts/{SID}.json").as_str())
            .with_status(200)
            .with_body("{}")
            .create();

        assert!(notifier(server.url()).verify());
        mock.assert();
    }

    #[test]
    fn render_includes_urgency_and_course() {
        let notice = Notice {
            urgency: Urgency::Overdue { hours: 3 },
            student_name: "Ada".into(),
            task_name: "Essay".into(),
            course_name: "History".into(),
            due_at: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
        };
        let rendered = notifier("http://unused".into()).render(&notice);
        assert!(rendered.body.contains("*Essay*"));
        assert!(rendered.body.contains("Course: History"));
        assert!(rendered.body.contains("OVERDUE by 3 hours"));
    }
}
