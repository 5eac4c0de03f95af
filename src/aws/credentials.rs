use std::path::Path;

use anyhow::{Context, Result};
use ini::Ini;
use tokio::fs;
use tracing;

use super::Credentials;

/// Writes `creds` under `profile`, replacing whatever that section held before.
pub async fn save_credentials(
    path: &Path,
    profile: &str,
    region: &str,
    creds: &Credentials,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut ini = match path.exists() {
        true => Ini::load_from_file(path)
            .with_context(|| format!("Failed to read AWS credentials file: {}", path.display()))?,
        false => Ini::new(),
    };

    // Stale keys from an older section must not survive.
    ini.delete(Some(profile));
    ini.with_section(Some(profile))
        .set("region", region)
        .set("aws_access_key_id", &creds.access_key_id)
        .set("aws_secret_access_key", &creds.secret_access_key)
        .set("aws_session_token", &creds.session_token);

    ini.write_to_file(path)
        .context("Failed to write credentials file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path).await?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(path, permissions).await?;
    }

    tracing::info!("Credentials saved to profile: {}", profile);
    Ok(())
}
