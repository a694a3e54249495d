//! Image publishing through the `docker` CLI.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::ecr::EcrRegistry;
use crate::domain::model::{repository_name, Project, RegistryCredentials, ServiceConfig};
use crate::domain::ports::ImagePublisher;
use crate::utils::error::{DeployError, Result};

pub const TAG_FORMAT: &str = "%Y%m%d%H%M";

/// `{registry}/{repository}:{timestamp}`, dropping any tag already on `image`.
pub fn image_tag(registry_address: &str, image: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}/{}:{}",
        registry_address,
        repository_name(image),
        at.format(TAG_FORMAT)
    )
}

pub fn latest_tag(registry_address: &str, image: &str) -> String {
    format!("{}/{}:latest", registry_address, repository_name(image))
}

/// Arguments of `docker build` for `service`, tagging the result `tag`.
pub fn build_args(service: &ServiceConfig, tag: &str) -> Result<Vec<String>> {
    let build = service.build.as_ref().ok_or_else(|| DeployError::ImageError {
        service: service.name.clone(),
        message: "no build configuration found".to_string(),
    })?;

    let mut args = vec!["build".to_string(), "--tag".to_string(), tag.to_string()];
    if let Some(dockerfile) = &build.dockerfile {
        args.push("--file".to_string());
        args.push(
            std::path::Path::new(&build.context)
                .join(dockerfile)
                .to_string_lossy()
                .to_string(),
        );
    }
    if let Some(platform) = &service.platform {
        args.push("--platform".to_string());
        args.push(platform.clone());
    }
    args.push(build.context.clone());
    Ok(args)
}

pub struct DockerCliPublisher {
    registry: EcrRegistry,
    credentials: OnceCell<RegistryCredentials>,
    docker: String,
}

impl DockerCliPublisher {
    pub fn new(registry: EcrRegistry) -> Self {
        Self {
            registry,
            credentials: OnceCell::new(),
            docker: "docker".to_string(),
        }
    }

    async fn credentials(&self) -> Result<&RegistryCredentials> {
        self.credentials
            .get_or_try_init(|| self.registry.authenticate())
            .await
    }

    async fn run(&self, service: &str, args: &[String], stdin: Option<&str>) -> Result<()> {
        debug!("Running {} {}", self.docker, args.join(" "));

        let mut child = Command::new(&self.docker)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DeployError::ImageError {
                service: service.to_string(),
                message: format!("failed to run {}: {}", self.docker, e),
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        debug!("{}", String::from_utf8_lossy(&output.stdout));

        if !output.status.success() {
            return Err(DeployError::ImageError {
                service: service.to_string(),
                message: format!(
                    "`{} {}` failed: {}",
                    self.docker,
                    args.first().map(String::as_str).unwrap_or_default(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

#[async_trait]
impl ImagePublisher for DockerCliPublisher {
    async fn publish(&self, _project: &Project, service: &ServiceConfig) -> Result<String> {
        let credentials = self.credentials().await?;
        let registry = &credentials.registry_address;
        let tag = image_tag(registry, &service.image, Utc::now());
        let latest = latest_tag(registry, &service.image);

        info!("🔨 Building image for service {} with tag {}", service.name, tag);
        self.run(&service.name, &build_args(service, &tag)?, None)
            .await?;

        self.run(
            &service.name,
            &strings(&[
                "login",
                "--username",
                credentials.username.as_str(),
                "--password-stdin",
                registry.as_str(),
            ]),
            Some(credentials.password.as_str()),
        )
        .await?;

        self.run(&service.name, &strings(&["tag", tag.as_str(), latest.as_str()]), None)
            .await?;
        for reference in [&tag, &latest] {
            info!("⬆️ Pushing {}", reference);
            self.run(&service.name, &strings(&["push", reference.as_str()]), None)
                .await?;
        }

        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::BuildConfig;
    use chrono::TimeZone;

    fn service() -> ServiceConfig {
        ServiceConfig {
            name: "web".to_string(),
            image: "shop/web".to_string(),
            build: Some(BuildConfig {
                context: "/src/web".to_string(),
                dockerfile: Some("Dockerfile.prod".to_string()),
            }),
            platform: Some("linux/arm64".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_image_tag_uses_minute_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 59).unwrap();
        assert_eq!(
            image_tag("123.dkr.ecr.us-east-1.amazonaws.com", "shop/web", at),
            "123.dkr.ecr.us-east-1.amazonaws.com/shop/web:202403091405"
        );
        assert_eq!(latest_tag("registry", "shop/web"), "registry/shop/web:latest");
    }

    #[test]
    fn test_tags_replace_manifest_tag() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(
            image_tag("registry", "shop/web:1.0", at),
            "registry/shop/web:202403091405"
        );
        assert_eq!(latest_tag("registry", "shop/web:1.0"), "registry/shop/web:latest");
    }

    #[test]
    fn test_build_args() {
        let args = build_args(&service(), "registry/shop/web:1").unwrap();
        assert_eq!(
            args,
            [
                "build",
                "--tag",
                "registry/shop/web:1",
                "--file",
                "/src/web/Dockerfile.prod",
                "--platform",
                "linux/arm64",
                "/src/web"
            ]
        );
    }

    #[test]
    fn test_build_args_require_build_section() {
        let mut service = service();
        service.build = None;
        match build_args(&service, "tag").unwrap_err() {
            DeployError::ImageError { service, .. } => assert_eq!(service, "web"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
