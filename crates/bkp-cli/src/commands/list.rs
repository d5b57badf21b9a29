use anyhow::Result;
use clap::Args;

use crate::Cli;

#[derive(Args)]
pub struct ListArgs {}

pub fn run(_args: &ListArgs, cli: &Cli) -> Result<i32> {
    super::with_engine(cli, |engine| engine.list())
}
