use crate::context::Context;
use crate::output::{print_json, print_table};
use anyhow::Result;
use nudge_core::engine::CycleRunner;

pub fn run(ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let report = engine.trigger_once()?;

    if ctx.json {
        return print_json(&report);
    }

    println!("{}", report.message());
    let c = &report.cleanup;
    let rows = vec![
        vec!["sent".to_string(), report.succeeded.to_string()],
        vec!["failed".to_string(), report.failed.to_string()],
        vec!["skipped".to_string(), report.skipped.to_string()],
        vec!["errored".to_string(), report.errored.to_string()],
        vec!["removed (submitted)".to_string(), c.submitted.to_string()],
        vec!["removed (overdue)".to_string(), c.overdue.to_string()],
        vec!["removed (exhausted)".to_string(), c.exhausted.to_string()],
        vec!["orphaned logs".to_string(), c.orphaned_logs.to_string()],
    ];
    println!();
    print_table(&["OUTCOME", "COUNT"], &rows, "");
    if !c.failed_steps.is_empty() {
        println!("\ncleanup steps that failed: {}", c.failed_steps.join(", "));
    }
    Ok(())
}
