use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A parsed application manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Ordered by service name.
    pub services: Vec<ServiceConfig>,
}

impl Project {
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Repository reference, e.g. `shop/web`.
    pub image: String,
    pub container_name: Option<String>,
    pub build: Option<BuildConfig>,
    pub platform: Option<String>,
    /// `x-*` extension fields.
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl ServiceConfig {
    pub fn container_name(&self) -> &str {
        self.container_name.as_deref().unwrap_or(&self.name)
    }

    /// The image reference without tag or digest.
    pub fn repository(&self) -> &str {
        repository_name(&self.image)
    }

    /// Reads a domain name from the extension `key`, lower-cased.
    ///
    /// Missing keys, nulls and blank strings all count as absent.
    pub fn domain_name(&self, key: &str) -> Option<String> {
        let domain = match self.extensions.get(key)? {
            serde_json::Value::Null => return None,
            serde_json::Value::String(s) => s.trim().to_ascii_lowercase(),
            other => other.to_string(),
        };
        if domain.is_empty() {
            None
        } else {
            Some(domain)
        }
    }
}

/// Strips a `:tag` or `@digest` from an image reference.
///
/// A colon before the last `/` is a registry port and is kept.
pub fn repository_name(image: &str) -> &str {
    let image = image.split('@').next().unwrap_or(image);
    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].find(':') {
        Some(colon) => &image[..name_start + colon],
        None => image,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub context: String,
    pub dockerfile: Option<String>,
}

/// Credentials for pushing to a container registry.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    /// Host name without scheme, e.g. `123456789012.dkr.ecr.us-east-1.amazonaws.com`.
    pub registry_address: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("registry_address", &self.registry_address)
            .finish()
    }
}
