use crate::core::profile::{
    ComputeOverrides, ComputeProfile, NetworkProfile, SynthesisProfile, DEFAULT_DOMAIN_KEY,
};
use crate::core::reconciler::{ExistencePolicy, DEFAULT_POLL_INTERVAL};
use crate::utils::env::substitute_env_vars;
use crate::utils::error::{DeployError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Settings file. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutodockConfig {
    pub project: ProjectSettings,
    pub network: NetworkProfile,
    pub compute: ComputeProfile,
    /// Per-service compute overrides keyed by compose service name.
    pub services: BTreeMap<String, ComputeOverrides>,
    pub reconcile: ReconcileSettings,
    pub aws: AwsSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Overrides the compose project name.
    pub name: Option<String>,
    pub domain_key: String,
    /// Services to deploy. Empty means every service.
    pub services: Vec<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            name: None,
            domain_key: DEFAULT_DOMAIN_KEY.to_string(),
            services: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    pub poll_interval_seconds: u64,
    pub timeout_seconds: Option<u64>,
    pub existence_policy: ExistencePolicy,
    pub continue_on_service_failure: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: DEFAULT_POLL_INTERVAL.as_secs(),
            timeout_seconds: None,
            existence_policy: ExistencePolicy::default(),
            continue_on_service_failure: false,
        }
    }
}

impl ReconcileSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    pub region: Option<String>,
}

impl AutodockConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DeployError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::debug!("Loading settings from {}", path.display());
            Self::from_file(path)
        } else {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DeployError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn synthesis_profile(&self) -> SynthesisProfile {
        SynthesisProfile {
            domain_key: self.project.domain_key.clone(),
            services: self.project.services.clone(),
            network: self.network.clone(),
            compute: self.compute.clone(),
            overrides: self.services.clone(),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(name) = &self.project.name {
            validation::validate_non_empty_string("project.name", name)?;
        }
        validation::validate_extension_key("project.domain_key", &self.project.domain_key)?;
        for service in &self.project.services {
            validation::validate_non_empty_string("project.services", service)?;
        }

        validation::validate_cidr("network.vpc_cidr", &self.network.vpc_cidr)?;
        for cidr in self
            .network
            .private_subnet_cidrs
            .iter()
            .chain(&self.network.public_subnet_cidrs)
        {
            validation::validate_cidr("network.subnet_cidrs", cidr)?;
        }

        validate_compute("compute", &self.compute)?;
        for (name, overrides) in &self.services {
            validate_compute(
                &format!("services.{}", name),
                &self.compute.with_overrides(overrides),
            )?;
        }

        validation::validate_positive_number(
            "reconcile.poll_interval_seconds",
            self.reconcile.poll_interval_seconds,
            1,
        )?;
        if let Some(timeout) = self.reconcile.timeout_seconds {
            validation::validate_positive_number(
                "reconcile.timeout_seconds",
                timeout,
                self.reconcile.poll_interval_seconds,
            )?;
        }

        if let Some(region) = &self.aws.region {
            validation::validate_non_empty_string("aws.region", region)?;
        }

        Ok(())
    }
}

fn validate_compute(section: &str, compute: &ComputeProfile) -> Result<()> {
    validation::validate_range(
        &format!("{}.container_port", section),
        compute.container_port,
        1,
        u16::MAX,
    )?;
    validation::validate_non_empty_string(&format!("{}.cpu", section), &compute.cpu)?;
    validation::validate_non_empty_string(&format!("{}.memory", section), &compute.memory)?;
    validation::validate_range(
        &format!("{}.desired_count", section),
        compute.desired_count,
        0,
        100,
    )?;
    if !compute.health_check_path.starts_with('/') {
        return Err(DeployError::InvalidConfigValueError {
            field: format!("{}.health_check_path", section),
            value: compute.health_check_path.clone(),
            reason: "Path must start with '/'".to_string(),
        });
    }
    validation::validate_range(
        &format!("{}.health_check_timeout_seconds", section),
        compute.health_check_timeout_seconds,
        2,
        compute.health_check_interval_seconds.saturating_sub(1).max(2),
    )
}

impl Validate for AutodockConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
