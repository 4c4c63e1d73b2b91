#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cmd::Context;
use skein_core::model::UserId;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "skein: typed lists linked into one graph",
    long_about = None
)]
struct Cli {
    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Store path.
    #[arg(long, global = true, default_value = "skein.db")]
    db: PathBuf,

    /// Config file path.
    #[arg(long, global = true, default_value = "skein.toml")]
    config: PathBuf,

    /// Acting user id (falls back to SKEIN_USER).
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.json { OutputMode::Json } else { OutputMode::Human }
    }

    fn resolve_user(&self) -> anyhow::Result<UserId> {
        let raw = match &self.user {
            Some(raw) => raw.clone(),
            None => env::var("SKEIN_USER").map_err(|_| {
                anyhow::anyhow!("no acting user: pass --user or set SKEIN_USER")
            })?,
        };
        Ok(raw.parse()?)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Initialize a store and config file",
        after_help = "EXAMPLES:\n    sk init\n    sk --db ~/skein.db init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        about = "Create, share, and inspect lists",
        after_help = "EXAMPLES:\n    sk list create --title Groceries --kind grocery\n    sk list show sl-abc123\n    sk list share sl-abc123 --with su-bob"
    )]
    List(cmd::list::ListArgs),

    #[command(
        about = "Add or delete items",
        after_help = "EXAMPLES:\n    sk item add --list sl-abc123 \"buy wine\"\n    sk item add --list sl-abc123 \"departure\" --date 2026-09-12\n    sk item delete sk-def456"
    )]
    Item(cmd::item::ItemArgs),

    #[command(
        about = "Link and unlink items across lists",
        after_help = "EXAMPLES:\n    sk link add sk-parent sk-child1 sk-child2\n    sk link check sk-parent sk-child1\n    sk link remove sk-parent sk-child1"
    )]
    Link(cmd::link::LinkArgs),

    #[command(
        about = "Complete or uncomplete an item, propagating to linked children",
        after_help = "EXAMPLES:\n    sk done sk-abc123\n    sk done sk-abc123 --preview\n    sk done sk-abc123 --undo"
    )]
    Done(cmd::done::DoneArgs),

    #[command(
        about = "Show an item with its parent and child links",
        after_help = "EXAMPLES:\n    sk show sk-abc123\n    sk show sk-abc123 --json"
    )]
    Show(cmd::show::ShowArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SKEIN_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "skein=debug,info"
        } else {
            "skein=info,warn"
        })
    });

    let format = env::var("SKEIN_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let ctx = Context {
        db_path: cli.db.clone(),
        config_path: cli.config.clone(),
        output: cli.output_mode(),
    };

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, &ctx),
        Commands::List(ref args) => cmd::list::run_list(args, &cli.resolve_user()?, &ctx),
        Commands::Item(ref args) => cmd::item::run_item(args, &cli.resolve_user()?, &ctx),
        Commands::Link(ref args) => cmd::link::run_link(args, &cli.resolve_user()?, &ctx),
        Commands::Done(ref args) => cmd::done::run_done(args, &cli.resolve_user()?, &ctx),
        Commands::Show(ref args) => cmd::show::run_show(args, &cli.resolve_user()?, &ctx),
    }
}
