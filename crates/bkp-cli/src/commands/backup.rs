use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::Cli;

#[derive(Args)]
pub struct BackupArgs {
    /// File to back up
    pub file: PathBuf,

    /// Show what would be backed up without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Attach a note to the backup name
    #[arg(long)]
    pub note: Option<String>,
}

pub fn run(args: &BackupArgs, cli: &Cli) -> Result<i32> {
    super::with_engine(cli, |engine| {
        engine.backup_file(&args.file, args.note.as_deref(), args.dry_run)
    })
}
