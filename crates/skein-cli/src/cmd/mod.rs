//! Command handlers. Each module exposes one `run_*` entry point taking its
//! parsed args, the acting user, and the shared [`Context`].

pub mod done;
pub mod init;
pub mod item;
pub mod link;
pub mod list;
pub mod show;

use std::path::PathBuf;

use skein_core::{Engine, EngineConfig};

use crate::output::OutputMode;

/// Shared state resolved once in `main`.
pub struct Context {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub output: OutputMode,
}

impl Context {
    /// Open the engine with the configured store and tunables.
    pub fn open_engine(&self) -> anyhow::Result<Engine> {
        let config = EngineConfig::load_or_default(&self.config_path)?;
        Engine::open(&self.db_path, config)
    }
}
