use std::{
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::constants::{
    AWS_CLI_DOCKER_IMAGE, AWS_CONFIG_FILE_NAME, MIN_AWS_CLI_MAJOR_VERSION, get_aws_dir,
};

/// The AWS CLI, used only for the interactive `aws sso login` step.
#[derive(Debug, Clone, Default)]
pub struct AwsCli {
    docker: bool,
    config: Option<PathBuf>,
}

impl AwsCli {
    pub fn new(docker: bool) -> Self {
        Self {
            docker,
            config: None,
        }
    }

    /// Config file the containerized CLI should read, when it is not `~/.aws/config`.
    pub fn with_config(mut self, config: &Path) -> Self {
        self.config = Some(config.to_path_buf());
        self
    }

    fn command(&self, tty: bool) -> Result<Command> {
        if !self.docker {
            return Ok(Command::new("aws"));
        }

        let aws_dir = get_aws_dir().context("Failed to determine home directory")?;
        let mut cmd = Command::new("docker");
        cmd.args(["run", "--rm", if tty { "-it" } else { "-i" }])
            .arg("-v")
            .arg(format!("{}:/root/.aws", aws_dir.display()));

        // AWS_CONFIG_FILE outside ~/.aws is invisible to the container otherwise
        if let Some(config) = self
            .config
            .as_ref()
            .filter(|config| **config != aws_dir.join(AWS_CONFIG_FILE_NAME))
        {
            cmd.arg("-v").arg(format!(
                "{}:/root/.aws/{AWS_CONFIG_FILE_NAME}:ro",
                config.display()
            ));
        }

        cmd.arg(AWS_CLI_DOCKER_IMAGE);
        Ok(cmd)
    }

    /// Fails unless the CLI runs and reports at least version 2.
    pub fn check_version(&self) -> Result<String> {
        let output = self
            .command(false)?
            .arg("--version")
            .output()
            .context("Failed to run the AWS CLI. Is it installed and on PATH?")?;

        // v1 prints its version on stderr
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        debug!("aws --version: {}", text.trim());

        let Some((major, minor, patch)) = parse_cli_version(&text) else {
            bail!("Could not determine AWS CLI version from: {}", text.trim());
        };

        if major < MIN_AWS_CLI_MAJOR_VERSION {
            bail!(
                "AWS CLI version {major}.{minor}.{patch} found, but SSO login requires version {MIN_AWS_CLI_MAJOR_VERSION} or newer"
            );
        }

        Ok(format!("{major}.{minor}.{patch}"))
    }

    /// Runs `aws sso login` with the terminal attached.
    pub fn sso_login(&self, profile: &str) -> Result<()> {
        info!("Running aws sso login for profile: {}", profile);

        let status = self
            .command(true)?
            .args(["sso", "login", "--profile", profile])
            .status()
            .context("Failed to run aws sso login")?;

        if !status.success() {
            bail!("aws sso login failed with {status}");
        }

        Ok(())
    }
}

/// Extracts the version from output like `aws-cli/2.15.30 Python/3.11.8 ...`.
pub fn parse_cli_version(text: &str) -> Option<(u32, u32, u32)> {
    let version = text
        .split_whitespace()
        .find_map(|token| token.strip_prefix("aws-cli/"))?;

    let mut parts = version.split('.').map(|part| part.parse::<u32>().ok());
    let major = parts.next()??;
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);

    Some((major, minor, patch))
}
