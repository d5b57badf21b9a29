use anyhow::Result;
use clap::Args;

use crate::Cli;

#[derive(Args)]
pub struct IncArgs {
    /// Show what would be archived without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Verify the archive right after creation
    #[arg(long)]
    pub verify: bool,

    /// Attach a note to the archive name
    #[arg(long)]
    pub note: Option<String>,
}

pub fn run(args: &IncArgs, cli: &Cli) -> Result<i32> {
    super::with_engine(cli, |engine| {
        engine.incremental(args.note.as_deref(), args.dry_run, args.verify)
    })
}
