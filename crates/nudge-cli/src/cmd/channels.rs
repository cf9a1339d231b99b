use crate::context::Context;
use crate::output::{print_json, print_table, yes_no};
use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use clap::Subcommand;
use nudge_core::channel::{Notice, Urgency};
use nudge_core::types::ChannelKind;
use nudge_core::NudgeError;

// ---------------------------------------------------------------------------
// Subcommand definition
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug)]
pub enum ChannelsSubcommand {
    /// Show which channels are configured and whether they can connect
    Check,
    /// Send a sample reminder through one channel
    SendTest {
        /// email | whatsapp
        #[arg(long)]
        channel: ChannelKind,
        /// Email address or phone number in E.164 form
        #[arg(long)]
        to: String,
    },
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn run(ctx: &Context, subcommand: ChannelsSubcommand) -> Result<()> {
    match subcommand {
        ChannelsSubcommand::Check => check(ctx),
        ChannelsSubcommand::SendTest { channel, to } => send_test(ctx, channel, &to),
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[derive(serde::Serialize)]
struct ChannelHealth {
    channel: ChannelKind,
    enabled: bool,
    reachable: bool,
}

fn check(ctx: &Context) -> Result<()> {
    let policy = ctx.policy()?;
    let channels = ctx.channels(&policy);

    let health: Vec<ChannelHealth> = ChannelKind::all()
        .iter()
        .map(|&kind| {
            let notifier = channels.get(kind);
            ChannelHealth {
                channel: kind,
                enabled: notifier.is_some(),
                reachable: notifier.is_some_and(|n| n.verify()),
            }
        })
        .collect();

    if ctx.json {
        return print_json(&health);
    }

    let rows: Vec<Vec<String>> = health
        .iter()
        .map(|h| {
            vec![
                h.channel.to_string(),
                yes_no(h.enabled),
                if h.enabled { yes_no(h.reachable) } else { "-".to_string() },
            ]
        })
        .collect();
    print_table(&["CHANNEL", "ENABLED", "REACHABLE"], &rows, "");
    Ok(())
}

// ---------------------------------------------------------------------------
// send-test
// ---------------------------------------------------------------------------

fn send_test(ctx: &Context, kind: ChannelKind, to: &str) -> Result<()> {
    let policy = ctx.policy()?;
    let channels = ctx.channels(&policy);
    let Some(notifier) = channels.get(kind) else {
        return Err(NudgeError::ChannelDisabled(kind).into());
    };

    let now = Utc::now();
    let due_at = now + Duration::hours(2);
    let notice = Notice {
        urgency: Urgency::between(now, due_at),
        student_name: "Student".to_string(),
        task_name: "Sample Task".to_string(),
        course_name: "Sample Course".to_string(),
        due_at,
    };
    let rendered = notifier.render(&notice);

    if !notifier.send(to, &rendered.subject, &rendered.body) {
        bail!("{kind} delivery to {to} failed; see log output for the transport error");
    }

    if ctx.json {
        print_json(&serde_json::json!({ "channel": kind, "to": to, "sent": true }))
    } else {
        println!("sent test {kind} reminder to {to}");
        Ok(())
    }
}
