use anyhow::Result;
use clap::Args;

use crate::Cli;

#[derive(Args)]
pub struct VerifyArgs {
    /// Archive name; defaults to the most recent archive
    pub archive: Option<String>,
}

pub fn run(args: &VerifyArgs, cli: &Cli) -> Result<i32> {
    super::with_engine(cli, |engine| engine.verify(args.archive.as_deref()))
}
