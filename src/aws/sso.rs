use anyhow::{Context, Result, anyhow};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sso::{Client as SsoClient, error::DisplayErrorContext};
use aws_smithy_types::DateTime;
use tracing::{debug, info};

use super::Credentials;
use crate::{cache::CachedLogin, config::SsoSettings};

/// Trades a cached SSO access token for role credentials.
#[allow(async_fn_in_trait)]
pub trait RoleCredentialsExchange {
    async fn get_role_credentials(
        &self,
        sso: &SsoSettings,
        login: &CachedLogin,
    ) -> Result<Credentials>;
}

/// The AWS SSO portal `GetRoleCredentials` API.
#[derive(Debug, Default, Clone, Copy)]
pub struct SsoPortal;

impl RoleCredentialsExchange for SsoPortal {
    async fn get_role_credentials(
        &self,
        sso: &SsoSettings,
        login: &CachedLogin,
    ) -> Result<Credentials> {
        info!("Calling AWS SSO GetRoleCredentials");
        debug!("Account: {}", sso.account_id);
        debug!("Role: {}", sso.role_name);
        debug!("SSO region: {}", sso.region);

        // The portal authenticates with the bearer token alone
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(sso.region.clone()))
            .no_credentials()
            .load()
            .await;

        let client = SsoClient::new(&config);

        let response = client
            .get_role_credentials()
            .role_name(&sso.role_name)
            .account_id(&sso.account_id)
            .access_token(&login.access_token)
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to get role credentials from AWS SSO: {}",
                    DisplayErrorContext(&e)
                )
            })?;

        let role_creds = response
            .role_credentials()
            .context("AWS SSO returned no role credentials")?;

        let credentials = Credentials {
            access_key_id: role_creds
                .access_key_id()
                .context("AWS SSO returned no access key id")?
                .to_string(),
            secret_access_key: role_creds
                .secret_access_key()
                .context("AWS SSO returned no secret access key")?
                .to_string(),
            session_token: role_creds
                .session_token()
                .context("AWS SSO returned no session token")?
                .to_string(),
            expiration: DateTime::from_millis(role_creds.expiration()),
        };

        info!("Successfully obtained AWS credentials");
        Ok(credentials)
    }
}
