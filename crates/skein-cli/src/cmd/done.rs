use anyhow::Result;
use clap::Args;

use skein_core::model::{ItemId, UserId};
use skein_core::propagate::FieldChanges;

use super::Context;
use crate::output::render;

#[derive(Args, Debug)]
pub struct DoneArgs {
    pub item_id: String,

    /// Mark the item (and its linked children) not completed.
    #[arg(long)]
    pub undo: bool,

    /// Show which linked items would change, without changing anything.
    #[arg(long)]
    pub preview: bool,
}

pub fn run_done(args: &DoneArgs, user: &UserId, ctx: &Context) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    let item_id: ItemId = args.item_id.parse()?;
    let new_status = !args.undo;

    if args.preview {
        let affected = engine.preview_status_propagation(user, &item_id, new_status)?;
        return render(ctx.output, &affected, |affected, w| {
            if affected.is_empty() {
                writeln!(w, "no linked items would change")?;
            }
            for row in affected {
                writeln!(
                    w,
                    "{} in {} would become {}",
                    row.item_id,
                    row.list_id,
                    if row.new_status { "completed" } else { "not completed" },
                )?;
            }
            Ok(())
        });
    }

    let outcome =
        engine.update_item_with_propagation(user, &item_id, &FieldChanges::status(new_status))?;
    render(ctx.output, &outcome, |outcome, w| {
        writeln!(
            w,
            "{} is now {}",
            outcome.updated_item.id,
            if outcome.updated_item.is_completed { "completed" } else { "not completed" },
        )?;
        for update in &outcome.propagated {
            writeln!(w, "  also {} in {}", update.item_id, update.list_id)?;
        }
        Ok(())
    })
}
