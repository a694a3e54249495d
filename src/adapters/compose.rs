//! Docker Compose manifest loading.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::domain::model::{BuildConfig, Project, ServiceConfig};
use crate::utils::env::substitute_env_vars;
use crate::utils::error::{DeployError, Result};

#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Deserialize)]
struct ComposeService {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    container_name: Option<String>,
    #[serde(default)]
    build: Option<ComposeBuild>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_yaml::Value>,
}

/// `build: ./dir` or `build: { context, dockerfile }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ComposeBuild {
    Context(String),
    Detailed {
        #[serde(default = "default_context")]
        context: String,
        #[serde(default)]
        dockerfile: Option<String>,
    },
}

fn default_context() -> String {
    ".".to_string()
}

impl From<ComposeBuild> for BuildConfig {
    fn from(build: ComposeBuild) -> Self {
        match build {
            ComposeBuild::Context(context) => BuildConfig {
                context,
                dockerfile: None,
            },
            ComposeBuild::Detailed {
                context,
                dockerfile,
            } => BuildConfig {
                context,
                dockerfile,
            },
        }
    }
}

pub struct ComposeLoader;

impl ComposeLoader {
    /// Loads the compose file at `path`.
    ///
    /// The project name is `name_override`, else the file's `name:`, else the
    /// name of the directory holding the file. Relative build contexts are
    /// resolved against that directory.
    pub fn load<P: AsRef<Path>>(path: P, name_override: Option<&str>) -> Result<Project> {
        let path = path.as_ref();
        info!("📄 Loading compose file {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| DeployError::ManifestError {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;

        let base_dir = path
            .canonicalize()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf));
        let dir_name = base_dir
            .as_deref()
            .and_then(|dir| dir.file_name())
            .and_then(|name| name.to_str())
            .map(str::to_string);

        let mut project = Self::parse(&content, name_override.map(str::to_string), dir_name)?;

        if let Some(base_dir) = base_dir {
            for service in &mut project.services {
                if let Some(build) = &mut service.build {
                    if Path::new(&build.context).is_relative() {
                        build.context = base_dir.join(&build.context).to_string_lossy().to_string();
                    }
                }
            }
        }
        Ok(project)
    }

    /// Parses compose YAML. `fallback_name` is used when the file has no `name:`.
    pub fn parse(
        content: &str,
        name_override: Option<String>,
        fallback_name: Option<String>,
    ) -> Result<Project> {
        let content = substitute_env_vars(content)?;
        let compose: ComposeFile =
            serde_yaml::from_str(&content).map_err(|e| DeployError::ManifestError {
                message: format!("invalid compose file: {}", e),
            })?;

        let name = name_override
            .or(compose.name)
            .or(fallback_name)
            .map(|name| normalize_project_name(&name))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DeployError::ManifestError {
                message: "cannot determine a project name; set 'name:' or project.name".to_string(),
            })?;

        if compose.services.is_empty() {
            return Err(DeployError::ManifestError {
                message: "no services defined".to_string(),
            });
        }

        let services = compose
            .services
            .into_iter()
            .map(|(service_name, service)| to_service_config(&name, service_name, service))
            .collect::<Result<Vec<_>>>()?;

        debug!("Loaded project {} with {} services", name, services.len());
        Ok(Project { name, services })
    }
}

/// Lower-cased, keeping only letters and digits.
fn normalize_project_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn to_service_config(project: &str, name: String, service: ComposeService) -> Result<ServiceConfig> {
    let extensions = service
        .rest
        .into_iter()
        .filter(|(key, _)| key.starts_with("x-"))
        .map(|(key, value)| Ok::<_, DeployError>((key, serde_json::to_value(value)?)))
        .collect::<Result<BTreeMap<_, _>>>()?;

    let image = service
        .image
        .filter(|image| !image.trim().is_empty())
        .unwrap_or_else(|| format!("{}-{}", project, name));

    Ok(ServiceConfig {
        name,
        image,
        container_name: service.container_name,
        build: service.build.map(BuildConfig::from),
        platform: service.platform,
        extensions,
    })
}
