use anyhow::Result;
use clap::{ArgAction, Parser};
use clap_complete::Shell;

use crate::{
    commands::{FetchCommand, completions},
    output::Output,
};

#[derive(Debug, Clone, Parser)]
#[command(name = "ssocreds", version, about = "Fetch AWS SSO role credentials into the shared credentials file", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub fetch: FetchCommand,

    #[arg(short = 'v', long, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[arg(
        long,
        value_enum,
        value_name = "SHELL",
        help = "Print a shell completion script and exit"
    )]
    pub completions: Option<Shell>,
}

impl Cli {
    pub async fn execute(self, output: &Output) -> Result<()> {
        if let Some(shell) = self.completions {
            completions::print_completions(shell);
            return Ok(());
        }

        self.fetch.execute(output).await
    }
}
