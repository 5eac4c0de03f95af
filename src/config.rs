use std::{collections::BTreeMap, collections::BTreeSet, path::Path};

use anyhow::{Context, Result, bail};
use ini::{Ini, Properties};
use tracing::{debug, info};

use crate::{
    constants::{DEFAULT_AWS_REGION, DEFAULT_PROFILE_NAME, PROFILE_SECTION_PREFIX},
    prompt::ProfilePrompt,
};

/// A profile section from the AWS config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub options: BTreeMap<String, String>,
}

/// The SSO keys a profile needs before a token can be exchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoSettings {
    pub start_url: String,
    pub region: String,
    pub role_name: String,
    pub account_id: String,
}

/// Outcome of profile resolution; `Cancelled` when the user dismissed the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Profile(Profile),
    Cancelled,
}

impl Profile {
    fn from_ini_section(name: &str, section: &Properties) -> Self {
        Self {
            name: name.to_string(),
            options: section
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Region written next to the credentials.
    pub fn region(&self) -> &str {
        self.get("region").unwrap_or(DEFAULT_AWS_REGION)
    }

    pub fn sso_settings(&self) -> Result<SsoSettings> {
        let require = |key: &str| {
            self.get(key).map(str::to_string).with_context(|| {
                format!("Profile '{}' is missing '{key}' in the AWS config", self.name)
            })
        };

        Ok(SsoSettings {
            start_url: require("sso_start_url")?,
            region: require("sso_region")?,
            role_name: require("sso_role_name")?,
            account_id: require("sso_account_id")?,
        })
    }

    fn save_to_ini(&self, ini: &mut Ini, profile: &str) {
        let section_name = section_name(profile);
        ini.delete(Some(section_name.as_str()));

        let mut section = ini.with_section(Some(section_name));
        for (key, value) in &self.options {
            section.set(key.as_str(), value.as_str());
        }
    }
}

/// `default` stays bare, everything else lives under `profile <name>`.
pub fn section_name(profile: &str) -> String {
    if profile == DEFAULT_PROFILE_NAME {
        profile.to_string()
    } else {
        format!("{PROFILE_SECTION_PREFIX}{profile}")
    }
}

fn profile_name(section: &str) -> Option<&str> {
    if section == DEFAULT_PROFILE_NAME {
        Some(section)
    } else {
        section
            .strip_prefix(PROFILE_SECTION_PREFIX)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

fn load_ini(path: &Path) -> Result<Ini> {
    Ini::load_from_file(path)
        .with_context(|| format!("Failed to load AWS config file: {}", path.display()))
}

/// Sorted, de-duplicated names of every profile in the config file.
pub fn list_profile_names(path: &Path) -> Result<Vec<String>> {
    let ini = load_ini(path)?;

    let names: BTreeSet<String> = ini
        .sections()
        .flatten()
        .filter_map(profile_name)
        .map(str::to_string)
        .collect();

    Ok(names.into_iter().collect())
}

pub fn load_profile(path: &Path, profile: &str) -> Result<Profile> {
    let ini = load_ini(path)?;

    let section = ini
        .section(Some(section_name(profile)))
        .with_context(|| {
            format!(
                "Profile '{profile}' not found in AWS config file {}",
                path.display()
            )
        })?;

    debug!("Loaded profile '{}' from {}", profile, path.display());
    Ok(Profile::from_ini_section(profile, section))
}

/// Loads the named profile, or asks the user to pick one when `profile` is `None`.
pub fn resolve_profile(
    path: &Path,
    profile: Option<&str>,
    prompt: &impl ProfilePrompt,
) -> Result<Resolution> {
    if let Some(name) = profile {
        return load_profile(path, name).map(Resolution::Profile);
    }

    let names = list_profile_names(path)?;
    if names.is_empty() {
        bail!("No profiles found in AWS config file {}", path.display());
    }

    match prompt.select_profile(&names)? {
        Some(name) => load_profile(path, &name).map(Resolution::Profile),
        None => Ok(Resolution::Cancelled),
    }
}

/// Replaces the config file's `default` section with a copy of `profile`.
pub fn clone_to_default(path: &Path, profile: &Profile) -> Result<()> {
    if profile.name == DEFAULT_PROFILE_NAME {
        return Ok(());
    }

    let mut ini = load_ini(path)?;
    profile.save_to_ini(&mut ini, DEFAULT_PROFILE_NAME);

    ini.write_to_file(path)
        .with_context(|| format!("Failed to write AWS config to {}", path.display()))?;

    info!("Copied profile '{}' to default in {}", profile.name, path.display());
    Ok(())
}
