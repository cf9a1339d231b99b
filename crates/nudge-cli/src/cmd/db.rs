use crate::context::Context;
use crate::output::print_json;
use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum DbSubcommand {
    /// Create the database file and schema (idempotent)
    Init,
}

pub fn run(ctx: &Context, subcommand: DbSubcommand) -> Result<()> {
    match subcommand {
        DbSubcommand::Init => {
            let connector = ctx.connector()?;
            let path = connector.path().display().to_string();
            if ctx.json {
                print_json(&serde_json::json!({ "initialized": path }))
            } else {
                println!("initialized {path}");
                Ok(())
            }
        }
    }
}
