pub mod backup;
pub mod full;
pub mod inc;
pub mod list;
pub mod verify;

use anyhow::Result;
use clap::Subcommand;

use bkp_config::{Config, StatusCodes};
use bkp_engine::Engine;
use bkp_git::SubprocessGit;
use bkp_utils::timestamp::SystemClock;
use bkp_utils::CancelToken;

use crate::format::ConsoleSink;
use crate::Cli;

#[derive(Subcommand)]
pub enum Commands {
    /// Create a full archive of the current directory
    Full(full::FullArgs),
    /// Create an incremental archive against the latest full archive
    Inc(inc::IncArgs),
    /// Create a timestamped backup of a single file
    Backup(backup::BackupArgs),
    /// Verify an archive against its embedded checksums
    Verify(verify::VerifyArgs),
    /// List archives with their verification state
    List(list::ListArgs),
}

pub fn run(cli: Cli) -> Result<i32> {
    match &cli.command {
        Commands::Full(args) => full::run(args, &cli),
        Commands::Inc(args) => inc::run(args, &cli),
        Commands::Backup(args) => backup::run(args, &cli),
        Commands::Verify(args) => verify::run(args, &cli),
        Commands::List(args) => list::run(args, &cli),
    }
}

/// Load configuration, wire the production capabilities, and hand the
/// engine to one command closure. Configuration failures exit with the
/// configured (or default) status code instead of aborting.
pub(crate) fn with_engine(cli: &Cli, command: impl FnOnce(&Engine) -> i32) -> Result<i32> {
    let root = std::env::current_dir()?;

    let mut cfg = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("error: {e}");
                return Ok(StatusCodes::default().code_for(e.kind()));
            }
        },
        None => Config::default(),
    };
    cfg.apply_env();

    let git = SubprocessGit;
    let sink = ConsoleSink::default();
    let clock = SystemClock;

    match Engine::new(&cfg, root, &git, &sink, &clock, CancelToken::new()) {
        Ok(engine) => Ok(command(&engine)),
        Err(e) => {
            eprintln!("error: {e}");
            Ok(cfg.status_codes.code_for(e.kind()))
        }
    }
}
