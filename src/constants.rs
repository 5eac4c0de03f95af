use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use dirs;

/// AWS configuration directory name
pub const AWS_CONFIG_DIR_NAME: &str = ".aws";

/// AWS configuration file name
pub const AWS_CONFIG_FILE_NAME: &str = "config";

/// AWS shared credentials file name
pub const AWS_CREDENTIALS_FILE_NAME: &str = "credentials";

/// SSO token cache location, relative to the AWS configuration directory
pub const SSO_CACHE_DIR: [&str; 2] = ["sso", "cache"];

/// Profile name that SDKs and the AWS CLI fall back to
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// Prefix of named profile sections in the AWS config file
pub const PROFILE_SECTION_PREFIX: &str = "profile ";

/// Region written to the credentials file when the profile has none
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Cached logins expiring sooner than this get a warning
pub const EXPIRY_WARNING_MINUTES: i64 = 15;

/// Lowest AWS CLI major version that supports `aws sso login`
pub const MIN_AWS_CLI_MAJOR_VERSION: u32 = 2;

/// Container image used with `--docker`
pub const AWS_CLI_DOCKER_IMAGE: &str = "amazon/aws-cli";

/// Setting this variable to any value disables colored output
pub const NO_COLOR_ENV: &str = "NO_COLOR";

/// Locations of every file this tool reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsPaths {
    pub config: PathBuf,
    pub credentials: PathBuf,
    pub sso_cache: PathBuf,
}

impl AwsPaths {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            config: get_aws_config_path().context("Failed to determine AWS config path")?,
            credentials: get_aws_credentials_path()
                .context("Failed to determine AWS credentials path")?,
            sso_cache: get_sso_cache_dir().context("Failed to determine AWS SSO cache path")?,
        })
    }
}

/// Get the `~/.aws` directory
pub fn get_aws_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(AWS_CONFIG_DIR_NAME))
}

/// Get the AWS config file path
/// Respects AWS_CONFIG_FILE environment variable if set
pub fn get_aws_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }

    get_aws_dir().map(|dir| dir.join(AWS_CONFIG_FILE_NAME))
}

/// Get the AWS credentials file path
/// Respects AWS_SHARED_CREDENTIALS_FILE environment variable if set
pub fn get_aws_credentials_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }

    get_aws_dir().map(|dir| dir.join(AWS_CREDENTIALS_FILE_NAME))
}

/// Get the directory where `aws sso login` caches access tokens
pub fn get_sso_cache_dir() -> Option<PathBuf> {
    get_aws_dir().map(|dir| SSO_CACHE_DIR.iter().fold(dir, |path, part| path.join(part)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_get_aws_config_path_with_env() {
        let original = env::var("AWS_CONFIG_FILE").ok();

        unsafe {
            env::set_var("AWS_CONFIG_FILE", "/custom/aws/config");
        }
        let path = get_aws_config_path();
        assert_eq!(path, Some(PathBuf::from("/custom/aws/config")));

        unsafe {
            match original {
                Some(val) => env::set_var("AWS_CONFIG_FILE", val),
                None => env::remove_var("AWS_CONFIG_FILE"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_get_aws_config_path_default() {
        let original = env::var("AWS_CONFIG_FILE").ok();

        unsafe {
            env::remove_var("AWS_CONFIG_FILE");
        }
        let path = get_aws_config_path();

        if let Some(p) = path {
            assert!(p.ends_with(".aws/config"));
        }

        unsafe {
            if let Some(val) = original {
                env::set_var("AWS_CONFIG_FILE", val);
            }
        }
    }

    #[test]
    #[serial]
    fn test_get_aws_credentials_path_with_env() {
        let original = env::var("AWS_SHARED_CREDENTIALS_FILE").ok();

        unsafe {
            env::set_var("AWS_SHARED_CREDENTIALS_FILE", "/custom/path/credentials");
        }
        let path = get_aws_credentials_path();
        assert_eq!(path, Some(PathBuf::from("/custom/path/credentials")));

        unsafe {
            match original {
                Some(val) => env::set_var("AWS_SHARED_CREDENTIALS_FILE", val),
                None => env::remove_var("AWS_SHARED_CREDENTIALS_FILE"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_paths_from_env_follow_overrides() {
        let original_config = env::var("AWS_CONFIG_FILE").ok();
        let original_creds = env::var("AWS_SHARED_CREDENTIALS_FILE").ok();

        unsafe {
            env::set_var("AWS_CONFIG_FILE", "/tmp/ssocreds/config");
            env::set_var("AWS_SHARED_CREDENTIALS_FILE", "/tmp/ssocreds/credentials");
        }

        if let Ok(paths) = AwsPaths::from_env() {
            assert_eq!(paths.config, PathBuf::from("/tmp/ssocreds/config"));
            assert_eq!(paths.credentials, PathBuf::from("/tmp/ssocreds/credentials"));
            assert!(paths.sso_cache.ends_with("sso/cache"));
        }

        unsafe {
            match original_config {
                Some(val) => env::set_var("AWS_CONFIG_FILE", val),
                None => env::remove_var("AWS_CONFIG_FILE"),
            }
            match original_creds {
                Some(val) => env::set_var("AWS_SHARED_CREDENTIALS_FILE", val),
                None => env::remove_var("AWS_SHARED_CREDENTIALS_FILE"),
            }
        }
    }

    #[test]
    fn test_sso_cache_dir_is_under_aws_dir() {
        if let (Some(aws_dir), Some(cache_dir)) = (get_aws_dir(), get_sso_cache_dir()) {
            assert!(cache_dir.starts_with(&aws_dir));
            assert!(cache_dir.ends_with("sso/cache"));
        }
    }
}
