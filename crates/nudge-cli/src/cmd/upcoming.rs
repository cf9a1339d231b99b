use crate::context::Context;
use crate::output::{print_json, print_table};
use anyhow::Result;
use chrono::Duration;
use nudge_core::engine::CycleRunner;

pub fn run(ctx: &Context, minutes: u32) -> Result<()> {
    let engine = ctx.engine()?;
    let upcoming = engine.upcoming(Duration::minutes(i64::from(minutes)))?;

    if ctx.json {
        let entries: Vec<serde_json::Value> = upcoming
            .iter()
            .map(|r| {
                serde_json::json!({
                    "fire_at": r.fire_at(),
                    "reminder": r,
                })
            })
            .collect();
        return print_json(&entries);
    }

    let rows: Vec<Vec<String>> = upcoming
        .iter()
        .map(|r| {
            vec![
                r.id().to_string(),
                r.fire_at().format("%Y-%m-%d %H:%M").to_string(),
                r.reminder.task_name.clone(),
                r.course_name.clone(),
                r.student_name.clone(),
                r.reminder.channel.to_string(),
                r.reminder.destination.clone(),
            ]
        })
        .collect();
    print_table(
        &["ID", "FIRES AT (UTC)", "TASK", "COURSE", "STUDENT", "CHANNEL", "DESTINATION"],
        &rows,
        &format!("No reminders fire in the next {minutes} minutes."),
    );
    Ok(())
}
