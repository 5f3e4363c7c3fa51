//! Connection profile management
//!
//! Profiles are named connection settings (region, endpoint, credentials)
//! stored in the configuration file. A profile plus a bucket or queue name
//! yields a [`ClientConfig`].

use serde::{Deserialize, Serialize};

use crate::client::ClientConfig;
use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Region used when neither a flag, the environment nor a profile names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Named connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique name for this profile
    pub name: String,

    /// Service region
    #[serde(default = "default_region")]
    pub region: String,

    /// Override endpoint (LocalStack, MinIO, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    /// Access key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    /// Secret access key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Profile {
    /// Create a profile that uses the production endpoint and ambient credentials
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            endpoint_url: None,
            access_key: None,
            secret_key: None,
        }
    }

    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Client settings for `resource` (bucket or queue name)
    pub fn client_config(&self, resource: impl Into<String>) -> ClientConfig {
        ClientConfig {
            resource: resource.into(),
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            session_token: None,
        }
    }
}

/// Manager for profile operations
pub struct ProfileManager {
    config_manager: ConfigManager,
}

impl ProfileManager {
    /// Create a new ProfileManager with a specific ConfigManager
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Create a new ProfileManager using the default config location
    pub fn new() -> Result<Self> {
        let config_manager = ConfigManager::new()?;
        Ok(Self { config_manager })
    }

    /// List all configured profiles
    pub fn list(&self) -> Result<Vec<Profile>> {
        let config = self.config_manager.load()?;
        Ok(config.profiles)
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Result<Profile> {
        let config = self.config_manager.load()?;
        config
            .profiles
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// Resolve the profile to use: the named one, else the configured
    /// default, else none
    pub fn resolve(&self, name: Option<&str>) -> Result<Option<Profile>> {
        let config = self.config_manager.load()?;
        let Some(name) = name.or(config.defaults.profile.as_deref()) else {
            return Ok(None);
        };

        config
            .profiles
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// Add or update a profile, optionally making it the default
    pub fn set(&self, profile: Profile, make_default: bool) -> Result<()> {
        let mut config = self.config_manager.load()?;

        if make_default {
            config.defaults.profile = Some(profile.name.clone());
        }
        config.profiles.retain(|p| p.name != profile.name);
        config.profiles.push(profile);

        self.config_manager.save(&config)
    }

    /// Remove a profile; clears the default if it pointed at it
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let original_len = config.profiles.len();

        config.profiles.retain(|p| p.name != name);

        if config.profiles.len() == original_len {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        if config.defaults.profile.as_deref() == Some(name) {
            config.defaults.profile = None;
        }

        self.config_manager.save(&config)
    }

    /// Check if a profile exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        let config = self.config_manager.load()?;
        Ok(config.profiles.iter().any(|p| p.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_profile_manager() -> (ProfileManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_manager = ConfigManager::with_path(config_path);
        let profile_manager = ProfileManager::with_config_manager(config_manager);
        (profile_manager, temp_dir)
    }

    fn local() -> Profile {
        Profile::new("local", "us-east-1")
            .with_endpoint_url("http://localhost:4566")
            .with_credentials("test", "test")
    }

    #[test]
    fn test_profile_new() {
        let profile = Profile::new("prod", "sa-east-1");
        assert_eq!(profile.name, "prod");
        assert_eq!(profile.region, "sa-east-1");
        assert!(profile.endpoint_url.is_none());
        assert!(profile.access_key.is_none());
    }

    #[test]
    fn test_profile_client_config() {
        let config = local().client_config("test-bucket");
        assert_eq!(config.resource, "test-bucket");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.secret_key.as_deref(), Some("test"));
    }

    #[test]
    fn test_profile_region_defaults_when_missing() {
        let profile: Profile = toml::from_str(r#"name = "bare""#).unwrap();
        assert_eq!(profile.region, DEFAULT_REGION);
    }

    #[test]
    fn test_profile_manager_set_and_get() {
        let (manager, _temp_dir) = temp_profile_manager();

        manager.set(local(), false).unwrap();

        let retrieved = manager.get("local").unwrap();
        assert_eq!(retrieved, local());
    }

    #[test]
    fn test_profile_manager_list() {
        let (manager, _temp_dir) = temp_profile_manager();

        manager.set(Profile::new("a", "us-east-1"), false).unwrap();
        manager.set(Profile::new("b", "eu-west-1"), false).unwrap();

        let profiles = manager.list().unwrap();
        assert_eq!(profiles.len(), 2);
    }

    #[test]
    fn test_profile_update_existing() {
        let (manager, _temp_dir) = temp_profile_manager();

        manager.set(Profile::new("test", "us-east-1"), false).unwrap();
        manager.set(Profile::new("test", "eu-west-1"), false).unwrap();

        let profiles = manager.list().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].region, "eu-west-1");
    }

    #[test]
    fn test_resolve_uses_default_profile() {
        let (manager, _temp_dir) = temp_profile_manager();
        assert!(manager.resolve(None).unwrap().is_none());

        manager.set(local(), true).unwrap();
        manager.set(Profile::new("prod", "sa-east-1"), false).unwrap();

        assert_eq!(manager.resolve(None).unwrap().unwrap().name, "local");
        assert_eq!(manager.resolve(Some("prod")).unwrap().unwrap().name, "prod");
        assert!(matches!(
            manager.resolve(Some("nope")),
            Err(Error::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_remove_clears_default() {
        let (manager, _temp_dir) = temp_profile_manager();

        manager.set(local(), true).unwrap();
        assert!(manager.exists("local").unwrap());

        manager.remove("local").unwrap();
        assert!(!manager.exists("local").unwrap());
        assert!(manager.resolve(None).unwrap().is_none());
    }

    #[test]
    fn test_profile_manager_remove_not_found() {
        let (manager, _temp_dir) = temp_profile_manager();

        let result = manager.remove("nonexistent");
        assert!(matches!(result.unwrap_err(), Error::ProfileNotFound(_)));
    }
}
