use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use skein_core::model::{Item, List, ListId, ListType, UserId};

use super::Context;
use crate::output::{checkbox, render};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(subcommand)]
    pub action: ListAction,
}

#[derive(Subcommand, Debug)]
pub enum ListAction {
    /// Create a new list.
    Create {
        #[arg(long)]
        title: String,
        /// List flavor: simple, grocery, or countdown.
        #[arg(long, default_value = "simple")]
        kind: ListType,
    },
    /// Show a list with its items.
    Show { list_id: String },
    /// Share a list with another user.
    Share {
        list_id: String,
        #[arg(long)]
        with: String,
    },
}

#[derive(Serialize)]
struct ListWithItems {
    #[serde(flatten)]
    list: List,
    items: Vec<Item>,
}

pub fn run_list(args: &ListArgs, user: &UserId, ctx: &Context) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    match &args.action {
        ListAction::Create { title, kind } => {
            let list = engine.create_list(user, title, *kind)?;
            render(ctx.output, &list, |list, w| {
                writeln!(w, "created {} list {} \"{}\"", list.list_type, list.id, list.title)
            })
        }
        ListAction::Show { list_id } => {
            let list_id: ListId = list_id.parse()?;
            let list = engine.get_list(user, &list_id)?;
            let items = engine.items_in_list(user, &list_id)?;
            let value = ListWithItems { list, items };
            render(ctx.output, &value, |value, w| {
                writeln!(w, "{} ({}, owner {})", value.list.title, value.list.list_type, value.list.owner)?;
                for item in &value.items {
                    let links = if item.linked.is_empty() {
                        String::new()
                    } else {
                        format!("  ({} links)", item.linked.degree())
                    };
                    writeln!(w, "  {} {}  {}{links}", checkbox(item.is_completed), item.id, item.content)?;
                }
                Ok(())
            })
        }
        ListAction::Share { list_id, with } => {
            let list_id: ListId = list_id.parse()?;
            let with: UserId = with.parse()?;
            let list = engine.share_list(user, &list_id, &with)?;
            render(ctx.output, &list, |list, w| {
                let shared: Vec<&str> = list.shared_with.iter().map(UserId::as_str).collect();
                writeln!(w, "{} now shared with: {}", list.id, shared.join(", "))
            })
        }
    }
}
