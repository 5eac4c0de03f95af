use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::Args;
use tracing::info;

use crate::{
    aws::{self, Credentials, RoleCredentialsExchange, SsoPortal},
    cache::{self, CacheStrategy},
    config::{self, Profile, Resolution},
    constants::{AwsPaths, DEFAULT_PROFILE_NAME},
    login::AwsCli,
    output::Output,
    prompt::TerminalPrompt,
};

#[derive(Debug, Clone, Default, Args)]
pub struct FetchCommand {
    #[arg(help = "AWS profile name (prompts for one when omitted)")]
    pub profile: Option<String>,

    #[arg(
        short = 'd',
        long,
        help = "Also write the credentials and the profile's settings to the default profile"
    )]
    pub use_default: bool,

    #[arg(short = 'l', long, help = "Run `aws sso login` before fetching credentials")]
    pub login: bool,

    #[arg(
        long,
        help = "Run the AWS CLI from the amazon/aws-cli docker image (mounts ~/.aws and AWS_CONFIG_FILE)"
    )]
    pub docker: bool,

    #[arg(
        short = 's',
        long,
        help = "Find the SSO cache file by its startUrl instead of its hashed name"
    )]
    pub scan: bool,
}

/// Switches that shape a single credential fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub strategy: CacheStrategy,
    pub use_default: bool,
}

impl FetchCommand {
    pub async fn execute(self, output: &Output) -> Result<()> {
        let paths = AwsPaths::from_env()?;
        let aws_cli = AwsCli::new(self.docker).with_config(&paths.config);

        if self.login {
            let version = aws_cli.check_version()?;
            output.detail(format!("Found AWS CLI {version}"));
        }

        let profile =
            match config::resolve_profile(&paths.config, self.profile.as_deref(), &TerminalPrompt)?
            {
                Resolution::Profile(profile) => profile,
                Resolution::Cancelled => bail!("No profile selected, aborting"),
            };

        info!("Fetching credentials for profile: {}", profile.name);

        if self.login {
            aws_cli.sso_login(&profile.name)?;
        }

        fetch_credentials(
            &profile,
            self.options(),
            &paths,
            &SsoPortal,
            Utc::now(),
            output,
        )
        .await?;

        Ok(())
    }

    pub fn options(&self) -> FetchOptions {
        FetchOptions {
            strategy: if self.scan {
                CacheStrategy::Scan
            } else {
                CacheStrategy::Hash
            },
            use_default: self.use_default,
        }
    }
}

/// Cached login -> role credentials -> credentials file, for an already resolved profile.
pub async fn fetch_credentials(
    profile: &Profile,
    options: FetchOptions,
    paths: &AwsPaths,
    exchange: &impl RoleCredentialsExchange,
    now: DateTime<Utc>,
    output: &Output,
) -> Result<Credentials> {
    // SSO settings from the profile
    let sso = profile.sso_settings()?;

    // Cached login token, validated against the profile and the clock
    let login = cache::find_login(
        &paths.sso_cache,
        &profile.name,
        &sso,
        options.strategy,
        now,
        output,
    )
    .await?;

    // Exchange the token for role credentials
    let credentials = exchange
        .get_role_credentials(&sso, &login)
        .await
        .with_context(|| format!("Failed to fetch credentials for profile '{}'", profile.name))?;

    let expires = credentials
        .expiration_local()
        .map_or_else(|| "unknown".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S %Z").to_string());
    output.success(format!(
        "Fetched credentials for {} ({}), valid until {expires}",
        sso.role_name, sso.account_id
    ));

    // Save to the profile's own section
    aws::credentials::save_credentials(
        &paths.credentials,
        &profile.name,
        profile.region(),
        &credentials,
    )
    .await
    .context("Failed to save AWS credentials")?;
    output.success(format!("AWS credentials saved to {} profile.", profile.name));

    // Mirror credentials and settings into default
    if options.use_default && profile.name != DEFAULT_PROFILE_NAME {
        aws::credentials::save_credentials(
            &paths.credentials,
            DEFAULT_PROFILE_NAME,
            profile.region(),
            &credentials,
        )
        .await
        .context("Failed to save AWS credentials to default profile")?;
        config::clone_to_default(&paths.config, profile)?;
        output.success(format!(
            "Profile {} copied to {DEFAULT_PROFILE_NAME}.",
            profile.name
        ));
    }

    Ok(credentials)
}
