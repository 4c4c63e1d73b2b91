use anyhow::Result;
use clap::Args;
use serde::Serialize;

use skein_core::model::{Item, ItemId, LinkedItemRow, UserId};

use super::Context;
use crate::output::{checkbox, render};

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub item_id: String,
}

#[derive(Serialize)]
struct ItemDetail {
    #[serde(flatten)]
    item: Item,
    parents: Vec<LinkedItemRow>,
    children: Vec<LinkedItemRow>,
}

pub fn run_show(args: &ShowArgs, user: &UserId, ctx: &Context) -> Result<()> {
    let engine = ctx.open_engine()?;
    let item_id: ItemId = args.item_id.parse()?;

    let detail = ItemDetail {
        item: engine.get_item(user, &item_id)?,
        parents: engine.get_parent_items(user, &item_id)?,
        children: engine.get_child_items(user, &item_id)?,
    };

    render(ctx.output, &detail, |detail, w| {
        writeln!(
            w,
            "{} {}  {}",
            checkbox(detail.item.is_completed),
            detail.item.id,
            detail.item.content,
        )?;
        writeln!(w, "list: {}", detail.item.list_id)?;
        if let Some(date) = detail.item.target_date {
            writeln!(w, "target: {date}")?;
        }
        if !detail.parents.is_empty() {
            writeln!(w, "part of:")?;
            for row in &detail.parents {
                writeln!(
                    w,
                    "  {} {}  {} ({})",
                    checkbox(row.is_completed),
                    row.id,
                    row.content,
                    row.list_title,
                )?;
            }
        }
        if !detail.children.is_empty() {
            writeln!(w, "linked items:")?;
            for row in &detail.children {
                writeln!(
                    w,
                    "  {} {}  {} ({})",
                    checkbox(row.is_completed),
                    row.id,
                    row.content,
                    row.list_title,
                )?;
            }
        }
        Ok(())
    })
}
