use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use serde::Serialize;

use skein_core::model::{ItemId, ListId, UserId};

use super::Context;
use crate::output::render;

#[derive(Args, Debug)]
pub struct ItemArgs {
    #[command(subcommand)]
    pub action: ItemAction,
}

#[derive(Subcommand, Debug)]
pub enum ItemAction {
    /// Append an item to a list.
    Add {
        #[arg(long)]
        list: String,
        content: String,
        /// Target date (YYYY-MM-DD), for countdown lists.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete an item; its links go with it.
    Delete { item_id: String },
}

#[derive(Serialize)]
struct DeleteResult {
    deleted: ItemId,
}

pub fn run_item(args: &ItemArgs, user: &UserId, ctx: &Context) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    match &args.action {
        ItemAction::Add { list, content, date } => {
            let list_id: ListId = list.parse()?;
            let item = engine.create_item(user, &list_id, content, *date)?;
            render(ctx.output, &item, |item, w| {
                writeln!(w, "added {} \"{}\" to {}", item.id, item.content, item.list_id)
            })
        }
        ItemAction::Delete { item_id } => {
            let item_id: ItemId = item_id.parse()?;
            engine.delete_item(user, &item_id)?;
            let result = DeleteResult { deleted: item_id };
            render(ctx.output, &result, |r, w| writeln!(w, "deleted {}", r.deleted))
        }
    }
}
