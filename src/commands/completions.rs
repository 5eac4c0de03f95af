use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::Cli;

/// Prints the completion script for `shell` to stdout.
pub fn print_completions(shell: Shell) {
    generate(shell, &mut io::stdout());
}

fn generate(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let app_name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, app_name, out);
}
