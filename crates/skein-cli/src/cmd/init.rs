use anyhow::Result;
use clap::Args;
use serde::Serialize;

use skein_core::EngineConfig;

use super::Context;
use crate::output::render;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file with defaults.
    #[arg(long)]
    pub force: bool,
}

#[derive(Serialize)]
struct InitResult {
    db: String,
    config: String,
    created_config: bool,
}

/// Execute `sk init`: open (creating and migrating) the store, and write a
/// default config file if none exists.
pub fn run_init(args: &InitArgs, ctx: &Context) -> Result<()> {
    // Opening creates the database and runs migrations.
    drop(ctx.open_engine()?);

    let created_config = args.force || !ctx.config_path.exists();
    if created_config {
        EngineConfig::default().save(&ctx.config_path)?;
    }

    let result = InitResult {
        db: ctx.db_path.display().to_string(),
        config: ctx.config_path.display().to_string(),
        created_config,
    };
    render(ctx.output, &result, |r, w| {
        writeln!(w, "store ready at {}", r.db)?;
        if r.created_config {
            writeln!(w, "wrote default config to {}", r.config)?;
        }
        Ok(())
    })
}
