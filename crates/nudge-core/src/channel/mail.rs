//! Email channel over SMTP.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};

use crate::config::MailConfig;
use crate::error::{NudgeError, Result};
use crate::types::ChannelKind;

use super::{Notice, Notifier, Rendered, Urgency};

pub struct MailNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

impl MailNotifier {
    /// Build the SMTP transport. No connection is made until the first send.
    pub fn new(config: MailConfig, send_timeout: Duration) -> Result<Self> {
        let from: Mailbox = config.from.parse().map_err(|e| {
            NudgeError::ConfigurationInvalid(format!("SMTP_FROM '{}': {e}", config.from))
        })?;

        let builder = if config.secure {
            SmtpTransport::relay(&config.host)
        } else {
            SmtpTransport::starttls_relay(&config.host)
        }
        .map_err(|e| NudgeError::ConfigurationInvalid(format!("SMTP_HOST: {e}")))?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            secure = config.secure,
            user = %config.user,
            pass = "***masked***",
            "email channel configured"
        );

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(config.user, config.password))
            .timeout(Some(send_timeout))
            .build();

        Ok(Self { transport, from })
    }

    fn build_message(&self, destination: &str, subject: &str, body: &str) -> Result<Message> {
        let to: Mailbox = destination.parse().map_err(|e| NudgeError::ChannelSendFailed {
            channel: ChannelKind::Email,
            reason: format!("invalid address '{destination}': {e}"),
        })?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| NudgeError::ChannelSendFailed {
                channel: ChannelKind::Email,
                reason: e.to_string(),
            })
    }
}

impl Notifier for MailNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn render(&self, notice: &Notice) -> Rendered {
        Rendered {
            subject: subject_line(notice),
            body: html_body(notice),
        }
    }

    fn send(&self, destination: &str, subject: &str, body: &str) -> bool {
        let message = match self.build_message(destination, subject, body) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("{e}");
                return false;
            }
        };
        match self.transport.send(&message) {
            Ok(_) => {
                tracing::debug!(to = destination, "email sent");
                true
            }
            Err(e) => {
                tracing::warn!(to = destination, "email send failed: {e}");
                false
            }
        }
    }

    fn verify(&self) -> bool {
        match self.transport.test_connection() {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!("email connection check failed: {e}");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn subject_line(notice: &Notice) -> String {
    match notice.urgency {
        Urgency::Overdue { hours } => {
            format!("OVERDUE: {} - {hours} hours overdue", notice.task_name)
        }
        Urgency::DueWithinHour { minutes } => {
            format!("URGENT: {} - Due in {minutes} minutes", notice.task_name)
        }
        Urgency::Upcoming { hours } => {
            format!("Reminder: {} - Due in {hours} hours", notice.task_name)
        }
    }
}

fn html_body(notice: &Notice) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\">",
            "<title>Task Reminder</title></head>",
            "<body style=\"font-family:Arial,sans-serif;max-width:600px;margin:0 auto;padding:20px\">",
            "<h1>Task Reminder</h1>",
            "<p>Hi <strong>{student}</strong>!</p>",
            "<p>This is a friendly reminder about your task:</p>",
            "<div style=\"border-left:4px solid #dc2626;padding:16px\">",
            "<div><strong>{task}</strong></div>",
            "<div><strong>Course:</strong> {course}</div>",
            "<div><strong>Due Date:</strong> {due}</div>",
            "<div style=\"color:#dc2626;font-weight:bold\">{urgency}</div>",
            "</div>",
            "<p>Don't forget to complete your task on time. Good luck!</p>",
            "<p>This is an automated reminder from your LMS system.</p>",
            "</body></html>"
        ),
        student = escape_html(&notice.student_name),
        task = escape_html(&notice.task_name),
        course = escape_html(&notice.course_name),
        due = notice.due_label(),
        urgency = notice.urgency,
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn notifier() -> MailNotifier {
        let cfg = MailConfig {
            host: "localhost".into(),
            port: 2525,
            secure: false,
            user: "user".into(),
            password: "pass".into(),
            from: "Reminders <noreply@example.com>".into(),
        };
        MailNotifier::new(cfg, Duration::from_secs(1)).unwrap()
    }

    fn notice(urgency: Urgency) -> Notice {
        Notice {
            urgency,
            student_name: "Ada <Lovelace>".into(),
            task_name: "Essay".into(),
            course_name: "History".into(),
            due_at: Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap(),
        }
    }

    #[test]
    fn subject_reflects_urgency_category() {
        let n = notifier();
        assert_eq!(
            n.render(&notice(Urgency::Overdue { hours: 2 })).subject,
            "OVERDUE: Essay - 2 hours overdue"
        );
        assert_eq!(
            n.render(&notice(Urgency::DueWithinHour { minutes: 15 })).subject,
            "URGENT: Essay - Due in 15 minutes"
        );
        assert_eq!(
            n.render(&notice(Urgency::Upcoming { hours: 2 })).subject,
            "Reminder: Essay - Due in 2 hours"
        );
    }

    #[test]
    fn body_escapes_names_and_includes_due_date() {
        let body = notifier()
            .render(&notice(Urgency::Upcoming { hours: 2 }))
            .body;
        assert!(body.contains("Ada &lt;Lovelace&gt;"));
        assert!(body.contains("2025-03-10 14:00 UTC"));
        assert!(body.contains("due in 2 hours"));
    }

    #[test]
    fn invalid_destination_fails_without_sending() {
        assert!(!notifier().send("not an address", "s", "b"));
    }

    #[test]
    fn malformed_from_address_is_a_configuration_error() {
        let cfg = MailConfig {
            host: "localhost".into(),
            port: 2525,
            secure: false,
            user: "user".into(),
            password: "pass".into(),
            from: "not an address".into(),
        };
        assert!(matches!(
            MailNotifier::new(cfg, Duration::from_secs(1)),
            Err(NudgeError::ConfigurationInvalid(_))
        ));
    }
}
