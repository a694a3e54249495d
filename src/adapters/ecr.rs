use aws_sdk_ecr::error::DisplayErrorContext;
use aws_sdk_ecr::Client as EcrClient;
use base64::Engine;

use crate::domain::model::RegistryCredentials;
use crate::utils::error::{DeployError, Result};

#[derive(Debug, Clone)]
pub struct EcrRegistry {
    client: EcrClient,
}

impl EcrRegistry {
    pub fn new(client: EcrClient) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(EcrClient::new(config))
    }

    /// Exchanges the caller's AWS identity for docker registry credentials.
    pub async fn authenticate(&self) -> Result<RegistryCredentials> {
        let output = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| DeployError::RegistryAuthError {
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let data = output
            .authorization_data()
            .first()
            .ok_or_else(|| DeployError::RegistryAuthError {
                message: "no authorization data received".to_string(),
            })?;

        let token = data.authorization_token().unwrap_or_default();
        let endpoint = data.proxy_endpoint().unwrap_or_default();
        decode_credentials(token, endpoint)
    }
}

/// Decodes a base64 `user:password` token issued for `proxy_endpoint`.
pub fn decode_credentials(token: &str, proxy_endpoint: &str) -> Result<RegistryCredentials> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(token)
        .map_err(|e| DeployError::RegistryAuthError {
            message: format!("failed to decode authorization token: {}", e),
        })?;
    let decoded = String::from_utf8(decoded).map_err(|_| DeployError::RegistryAuthError {
        message: "authorization token is not valid UTF-8".to_string(),
    })?;

    let (username, password) =
        decoded
            .split_once(':')
            .ok_or_else(|| DeployError::RegistryAuthError {
                message: "invalid authorization token format".to_string(),
            })?;

    let registry_address = proxy_endpoint
        .trim_start_matches("https://")
        .trim_end_matches('/')
        .to_string();
    if registry_address.is_empty() {
        return Err(DeployError::RegistryAuthError {
            message: "authorization data has no registry endpoint".to_string(),
        });
    }

    Ok(RegistryCredentials {
        username: username.to_string(),
        password: password.to_string(),
        registry_address,
    })
}
