use clap::CommandFactory;
use eyre::Result;
use std::io::Write;

use crate::cli::Cli;

/// Write completions for `shell` to `out`
pub fn run(shell: clap_complete::Shell, out: &mut impl Write) -> Result<()> {
    clap_complete::generate(shell, &mut Cli::command(), "pagelog", out);
    Ok(())
}
