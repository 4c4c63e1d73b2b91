use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use skein_core::model::{ItemId, UserId};

use super::Context;
use crate::output::render;

#[derive(Args, Debug)]
pub struct LinkArgs {
    #[command(subcommand)]
    pub action: LinkAction,
}

#[derive(Subcommand, Debug)]
pub enum LinkAction {
    /// Link children under a parent. Invalid proposals become warnings;
    /// the rest are created.
    Add {
        parent: String,
        #[arg(required = true)]
        children: Vec<String>,
    },
    /// Validate a proposed batch without creating anything.
    Check {
        parent: String,
        #[arg(required = true)]
        children: Vec<String>,
    },
    /// Remove one parent→child link.
    Remove { parent: String, child: String },
}

fn parse_children(raw: &[String]) -> Result<Vec<ItemId>> {
    raw.iter()
        .map(|child| Ok(child.parse()?))
        .collect()
}

#[derive(Serialize)]
struct RemoveResult {
    parent: ItemId,
    child: ItemId,
    removed: bool,
}

pub fn run_link(args: &LinkArgs, user: &UserId, ctx: &Context) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    match &args.action {
        LinkAction::Add { parent, children } => {
            let parent: ItemId = parent.parse()?;
            let children = parse_children(children)?;
            let outcome = engine.create_parent_child_link(user, &parent, &children)?;
            render(ctx.output, &outcome, |outcome, w| {
                writeln!(w, "created {} link(s)", outcome.created)?;
                for warning in &outcome.warnings {
                    writeln!(w, "warning: {warning}")?;
                }
                Ok(())
            })
        }
        LinkAction::Check { parent, children } => {
            let parent: ItemId = parent.parse()?;
            let children = parse_children(children)?;
            let validation = engine.validate_link_creation(user, &parent, &children)?;
            render(ctx.output, &validation, |validation, w| {
                for child in &validation.acceptable {
                    writeln!(w, "ok: {child}")?;
                }
                for warning in validation.warnings() {
                    writeln!(w, "rejected: {warning}")?;
                }
                Ok(())
            })
        }
        LinkAction::Remove { parent, child } => {
            let parent: ItemId = parent.parse()?;
            let child: ItemId = child.parse()?;
            let removed = engine.remove_parent_child_link(user, &parent, &child)?;
            let result = RemoveResult { parent, child, removed };
            render(ctx.output, &result, |r, w| {
                if r.removed {
                    writeln!(w, "unlinked {} -> {}", r.parent, r.child)
                } else {
                    writeln!(w, "no link {} -> {}", r.parent, r.child)
                }
            })
        }
    }
}
