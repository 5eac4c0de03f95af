//! Lookup and validation of the access tokens `aws sso login` leaves in
//! `~/.aws/sso/cache`.
//!
//! The AWS CLI names each cache file after the SHA-1 of the session's start
//! URL. Older CLI releases and parallel logins can leave further copies under
//! other names, so the scan strategy reads every file, picks the first live
//! token for the start URL and copies it over the stale ones.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de};
use sha1::{Digest, Sha1};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::{config::SsoSettings, constants::EXPIRY_WARNING_MINUTES, output::Output};

/// A token written by `aws sso login`. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedLogin {
    pub start_url: String,
    pub region: String,
    #[serde(deserialize_with = "deserialize_expires_at")]
    pub expires_at: DateTime<Utc>,
    pub access_token: String,
}

/// How the cache file for a start URL is found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Only the file named after the start URL hash.
    #[default]
    Hash,
    /// Every file in the directory whose `startUrl` matches.
    Scan,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(
        "No cached SSO login found at {}. Run `aws sso login --profile {profile}` or pass --login",
        path.display()
    )]
    NotFound { profile: String, path: PathBuf },

    #[error("Failed to read cached SSO login {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cached SSO login {} is not valid JSON. Log in again with --login", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cached SSO login was issued in region '{actual}' but the profile expects '{expected}'")]
    RegionMismatch { expected: String, actual: String },

    #[error("Cached SSO login expired at {expires_at}. Log in again with --login")]
    Expired { expires_at: DateTime<Utc> },
}

impl CachedLogin {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Set when a live token has less than the warning window left.
    pub fn expiry_warning(&self, now: DateTime<Utc>) -> Option<String> {
        let remaining = self.expires_at - now;
        if !self.is_active(now) || remaining >= Duration::minutes(EXPIRY_WARNING_MINUTES) {
            return None;
        }

        Some(format!(
            "Warning: SSO login expires in {} minutes. Consider running with --login",
            remaining.num_minutes()
        ))
    }
}

fn deserialize_expires_at<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_expires_at(&raw).ok_or_else(|| de::Error::custom(format!("invalid expiresAt: {raw}")))
}

/// Accepts RFC 3339 plus the `...UTC` suffix older AWS CLI releases wrote.
pub fn parse_expires_at(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%SUTC", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|dt| dt.and_utc())
}

/// File name the AWS CLI uses for a start URL's token.
pub fn cache_file_name(start_url: &str) -> String {
    format!("{}.json", hex::encode(Sha1::digest(start_url.as_bytes())))
}

/// Finds, repairs if needed, and validates the cached login for `sso`.
pub async fn find_login(
    cache_dir: &Path,
    profile: &str,
    sso: &SsoSettings,
    strategy: CacheStrategy,
    now: DateTime<Utc>,
    output: &Output,
) -> Result<CachedLogin> {
    let path = locate(cache_dir, &sso.start_url, strategy, now, output).await?;
    output.detail(format!("Using cached SSO login {}", path.display()));

    let login = load_login(&path, profile, &sso.region, now, output).await?;
    Ok(login)
}

/// Path of the cache file to use for `start_url`.
pub async fn locate(
    cache_dir: &Path,
    start_url: &str,
    strategy: CacheStrategy,
    now: DateTime<Utc>,
    output: &Output,
) -> Result<PathBuf> {
    let canonical = cache_dir.join(cache_file_name(start_url));

    if strategy == CacheStrategy::Hash {
        return Ok(canonical);
    }

    // Every readable record for this start URL, split by liveness
    let matches = scan(cache_dir, start_url).await?;
    let (active, expired): (Vec<_>, Vec<_>) =
        matches.into_iter().partition(|(_, login)| login.is_active(now));

    debug!(
        "Found {} active and {} expired cache files for {}",
        active.len(),
        expired.len(),
        start_url
    );

    // Nothing live to copy from, let validation report the canonical file
    let Some((source, _)) = active.into_iter().next() else {
        return Ok(canonical);
    };

    // Overwrite stale copies and the hash-named file, never the source itself
    let mut targets: Vec<PathBuf> = expired.into_iter().map(|(path, _)| path).collect();
    if canonical != source && !targets.contains(&canonical) {
        targets.push(canonical);
    }

    for target in &targets {
        fs::copy(&source, target).await.with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.display(),
                target.display()
            )
        })?;
        output.detail(format!(
            "Refreshed {} from {}",
            target.display(),
            source.display()
        ));
    }

    if !targets.is_empty() {
        info!("Repaired {} SSO cache files", targets.len());
    }

    Ok(source)
}

/// Every parseable cache file for `start_url`, in file-name order.
async fn scan(cache_dir: &Path, start_url: &str) -> Result<Vec<(PathBuf, CachedLogin)>> {
    let mut entries = match fs::read_dir(cache_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("SSO cache directory {} does not exist", cache_dir.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to read SSO cache directory {}", cache_dir.display())
            });
        }
    };

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .context("Failed to list SSO cache directory")?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut matches = Vec::new();
    for path in paths {
        // Client registrations and half-written files share the directory
        let Ok(raw) = fs::read_to_string(&path).await else {
            debug!("Skipping unreadable cache file {}", path.display());
            continue;
        };
        let Ok(login) = serde_json::from_str::<CachedLogin>(&raw) else {
            debug!("Skipping unparseable cache file {}", path.display());
            continue;
        };
        if login.start_url == start_url {
            matches.push((path, login));
        }
    }

    Ok(matches)
}

/// Reads `path` and checks it belongs to `expected_region` and has not expired.
pub async fn load_login(
    path: &Path,
    profile: &str,
    expected_region: &str,
    now: DateTime<Utc>,
    output: &Output,
) -> std::result::Result<CachedLogin, CacheError> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CacheError::NotFound {
                profile: profile.to_string(),
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(CacheError::Unreadable {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let login: CachedLogin =
        serde_json::from_str(&raw).map_err(|source| CacheError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

    if login.region != expected_region {
        return Err(CacheError::RegionMismatch {
            expected: expected_region.to_string(),
            actual: login.region,
        });
    }

    if !login.is_active(now) {
        return Err(CacheError::Expired {
            expires_at: login.expires_at,
        });
    }

    if let Some(warning) = login.expiry_warning(now) {
        output.warn(warning);
    }

    Ok(login)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs as std_fs;
    use tempfile::TempDir;

    const START_URL: &str = "https://example.awsapps.com/start";
    const CANONICAL: &str = "e8be5486177c5b5392bd9aa76563515b29358e6e.json";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn quiet() -> Output {
        Output::new(false, false)
    }

    fn settings(region: &str) -> SsoSettings {
        SsoSettings {
            start_url: START_URL.to_string(),
            region: region.to_string(),
            role_name: "Developer".to_string(),
            account_id: "111111111111".to_string(),
        }
    }

    fn record(start_url: &str, region: &str, expires_at: &str, token: &str) -> String {
        format!(
            r#"{{"startUrl": "{start_url}", "region": "{region}", "expiresAt": "{expires_at}", "accessToken": "{token}"}}"#
        )
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std_fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_cache_file_name_is_sha1_of_start_url() {
        assert_eq!(cache_file_name(START_URL), CANONICAL);
        assert_eq!(
            cache_file_name("https://other.awsapps.com/start"),
            "1aaaa0986422da8cae53ffba7ae2768ebabe07fa.json"
        );
    }

    #[test]
    fn test_parse_expires_at_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 20, 0, 0).unwrap();
        assert_eq!(parse_expires_at("2025-01-01T20:00:00Z"), Some(expected));
        assert_eq!(parse_expires_at("2025-01-01T21:00:00+01:00"), Some(expected));
        assert_eq!(parse_expires_at("2025-01-01T20:00:00UTC"), Some(expected));
        assert_eq!(parse_expires_at("2025-01-01T20:00:00"), Some(expected));
        assert_eq!(parse_expires_at("tomorrow"), None);
    }

    #[test]
    fn test_cached_login_ignores_extra_fields() {
        let raw = r#"{
            "startUrl": "https://example.awsapps.com/start",
            "region": "eu-west-1",
            "accessToken": "token",
            "expiresAt": "2025-01-01T20:00:00Z",
            "clientId": "abc",
            "refreshToken": "refresh"
        }"#;
        let login: CachedLogin = serde_json::from_str(raw).unwrap();
        assert_eq!(login.access_token, "token");
        assert!(login.is_active(now()));
    }

    #[tokio::test]
    async fn test_hash_strategy_uses_canonical_path() {
        let dir = TempDir::new().unwrap();
        write(&dir, "other.json", &record(START_URL, "eu-west-1", "2025-01-01T20:00:00Z", "x"));

        let path = locate(dir.path(), START_URL, CacheStrategy::Hash, now(), &quiet())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join(CANONICAL));
    }

    #[tokio::test]
    async fn test_scan_heals_expired_and_canonical_copies() {
        let dir = TempDir::new().unwrap();
        let active = record(START_URL, "eu-west-1", "2025-01-01T20:00:00Z", "fresh");
        let active_path = write(&dir, "a-login.json", &active);
        let expired_path = write(
            &dir,
            "b-login.json",
            &record(START_URL, "eu-west-1", "2025-01-01T08:00:00Z", "stale"),
        );
        write(&dir, "broken.json", "{ not json");
        write(&dir, "botocore-client-id.json", r#"{"clientId": "abc"}"#);
        let unrelated = write(
            &dir,
            "c-login.json",
            &record("https://other.awsapps.com/start", "eu-west-1", "2025-01-01T08:00:00Z", "other"),
        );

        let login = find_login(
            dir.path(),
            "dev",
            &settings("eu-west-1"),
            CacheStrategy::Scan,
            now(),
            &quiet(),
        )
        .await
        .unwrap();
        assert_eq!(login.access_token, "fresh");

        let canonical = std_fs::read_to_string(dir.path().join(CANONICAL)).unwrap();
        assert_eq!(std_fs::read_to_string(&active_path).unwrap(), active);
        assert_eq!(std_fs::read_to_string(&expired_path).unwrap(), active);
        assert_eq!(canonical, active);
        assert!(std_fs::read_to_string(&unrelated).unwrap().contains("other"));
    }

    #[tokio::test]
    async fn test_scan_without_active_falls_back_to_canonical() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "legacy.json",
            &record(START_URL, "eu-west-1", "2025-01-01T08:00:00Z", "stale"),
        );

        let path = locate(dir.path(), START_URL, CacheStrategy::Scan, now(), &quiet())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join(CANONICAL));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_scan_missing_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("sso").join("cache");

        let err = find_login(
            &cache_dir,
            "dev",
            &settings("eu-west-1"),
            CacheStrategy::Scan,
            now(),
            &quiet(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CacheError>(),
            Some(CacheError::NotFound { profile, .. }) if profile == "dev"
        ));
    }

    #[tokio::test]
    async fn test_expired_login_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            CANONICAL,
            &record(START_URL, "eu-west-1", "2025-01-01T11:59:59Z", "stale"),
        );

        let err = load_login(&path, "dev", "eu-west-1", now(), &quiet())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Expired { .. }));
    }

    #[tokio::test]
    async fn test_region_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            CANONICAL,
            &record(START_URL, "us-east-1", "2025-01-01T20:00:00Z", "fresh"),
        );

        let err = load_login(&path, "dev", "eu-west-1", now(), &quiet())
            .await
            .unwrap_err();
        match err {
            CacheError::RegionMismatch { expected, actual } => {
                assert_eq!(expected, "eu-west-1");
                assert_eq!(actual, "us-east-1");
            }
            other => panic!("Expected RegionMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_canonical_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, CANONICAL, "{\"startUrl\": ");

        let err = load_login(&path, "dev", "eu-west-1", now(), &quiet())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_login_close_to_expiry_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            CANONICAL,
            &record(START_URL, "eu-west-1", "2025-01-01T12:05:00Z", "fresh"),
        );

        let login = load_login(&path, "dev", "eu-west-1", now(), &quiet())
            .await
            .unwrap();
        assert_eq!(login.access_token, "fresh");
        assert_eq!(login.expires_at - now(), Duration::minutes(5));

        let warning = login.expiry_warning(now()).unwrap();
        assert!(warning.contains("expires in 5 minutes"));
    }

    #[test]
    fn test_expiry_warning_window() {
        let login = |expires_at: &str| CachedLogin {
            start_url: START_URL.to_string(),
            region: "eu-west-1".to_string(),
            expires_at: parse_expires_at(expires_at).unwrap(),
            access_token: "token".to_string(),
        };

        // Just inside the window
        let warning = login("2025-01-01T12:14:59Z").expiry_warning(now());
        assert!(warning.is_some_and(|w| w.contains("expires in 14 minutes")));

        // On and beyond the edge
        assert_eq!(login("2025-01-01T12:15:00Z").expiry_warning(now()), None);
        assert_eq!(login("2025-01-01T20:00:00Z").expiry_warning(now()), None);

        // Expired tokens are rejected elsewhere, not warned about
        assert_eq!(login("2025-01-01T11:00:00Z").expiry_warning(now()), None);
    }

    #[tokio::test]
    async fn test_scan_with_canonical_as_first_active_record() {
        let dir = TempDir::new().unwrap();
        let active = record(START_URL, "eu-west-1", "2025-01-01T20:00:00Z", "fresh");
        let canonical_path = write(&dir, CANONICAL, &active);
        let expired_path = write(
            &dir,
            "legacy-login.json",
            &record(START_URL, "eu-west-1", "2025-01-01T08:00:00Z", "stale"),
        );

        let path = locate(dir.path(), START_URL, CacheStrategy::Scan, now(), &quiet())
            .await
            .unwrap();
        assert_eq!(path, canonical_path);
        assert_eq!(std_fs::read_to_string(&canonical_path).unwrap(), active);
        assert_eq!(std_fs::read_to_string(&expired_path).unwrap(), active);

        let login = find_login(
            dir.path(),
            "dev",
            &settings("eu-west-1"),
            CacheStrategy::Scan,
            now(),
            &quiet(),
        )
        .await
        .unwrap();
        assert_eq!(login.access_token, "fresh");
    }
}
