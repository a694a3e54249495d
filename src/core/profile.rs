//! Tunable inputs of the graph builders, with the defaults the generated
//! stacks have always used.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::model::{Project, ServiceConfig};
use crate::utils::error::{DeployError, Result};

pub const DEFAULT_DOMAIN_KEY: &str = "x-domain-name";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkProfile {
    pub vpc_cidr: String,
    pub private_subnet_cidrs: [String; 2],
    pub public_subnet_cidrs: [String; 2],
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Self {
            vpc_cidr: "10.0.0.0/16".to_string(),
            private_subnet_cidrs: ["10.0.1.0/24".to_string(), "10.0.2.0/24".to_string()],
            public_subnet_cidrs: ["10.0.3.0/24".to_string(), "10.0.4.0/24".to_string()],
        }
    }
}

/// Per-service task sizing, networking and health checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeProfile {
    pub container_port: u16,
    pub cpu: String,
    pub memory: String,
    pub cpu_architecture: String,
    pub operating_system_family: String,
    pub desired_count: u32,
    pub health_check_path: String,
    pub health_check_interval_seconds: u32,
    pub health_check_timeout_seconds: u32,
    pub ssl_policy: String,
}

impl Default for ComputeProfile {
    fn default() -> Self {
        Self {
            container_port: 3000,
            cpu: "1024".to_string(),
            memory: "2048".to_string(),
            cpu_architecture: "ARM64".to_string(),
            operating_system_family: "LINUX".to_string(),
            desired_count: 1,
            health_check_path: "/".to_string(),
            health_check_interval_seconds: 30,
            health_check_timeout_seconds: 5,
            ssl_policy: "ELBSecurityPolicy-2016-08".to_string(),
        }
    }
}

/// Service-level overrides of [`ComputeProfile`]; unset fields inherit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeOverrides {
    pub container_port: Option<u16>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub cpu_architecture: Option<String>,
    pub desired_count: Option<u32>,
    pub health_check_path: Option<String>,
}

impl ComputeProfile {
    pub fn with_overrides(&self, overrides: &ComputeOverrides) -> ComputeProfile {
        let mut profile = self.clone();
        if let Some(port) = overrides.container_port {
            profile.container_port = port;
        }
        if let Some(cpu) = &overrides.cpu {
            profile.cpu = cpu.clone();
        }
        if let Some(memory) = &overrides.memory {
            profile.memory = memory.clone();
        }
        if let Some(arch) = &overrides.cpu_architecture {
            profile.cpu_architecture = arch.clone();
        }
        if let Some(count) = overrides.desired_count {
            profile.desired_count = count;
        }
        if let Some(path) = &overrides.health_check_path {
            profile.health_check_path = path.clone();
        }
        profile
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisProfile {
    /// Extension key carrying a service's domain name.
    pub domain_key: String,
    /// Services that get an image repository and their own stack. Empty means
    /// every service with a build section and a domain name.
    pub services: Vec<String>,
    pub network: NetworkProfile,
    pub compute: ComputeProfile,
    pub overrides: BTreeMap<String, ComputeOverrides>,
}

impl Default for SynthesisProfile {
    fn default() -> Self {
        Self {
            domain_key: DEFAULT_DOMAIN_KEY.to_string(),
            services: Vec::new(),
            network: NetworkProfile::default(),
            compute: ComputeProfile::default(),
            overrides: BTreeMap::new(),
        }
    }
}

impl SynthesisProfile {
    pub fn compute_for(&self, service: &str) -> ComputeProfile {
        match self.overrides.get(service) {
            Some(overrides) => self.compute.with_overrides(overrides),
            None => self.compute.clone(),
        }
    }

    /// The deployable services of `project`, in manifest order.
    pub fn deployable<'a>(&self, project: &'a Project) -> Result<Vec<&'a ServiceConfig>> {
        if self.services.is_empty() {
            return Ok(project
                .services
                .iter()
                .filter(|service| self.is_buildable_site(service))
                .collect());
        }
        if let Some(missing) = self.services.iter().find(|name| project.service(name).is_none()) {
            return Err(DeployError::ManifestError {
                message: format!(
                    "service '{}' is configured for deployment but not defined in project '{}'",
                    missing, project.name
                ),
            });
        }
        Ok(project
            .services
            .iter()
            .filter(|s| self.services.contains(&s.name))
            .collect())
    }

    // Backing services such as databases run from public images and have no
    // domain; they are skipped unless listed explicitly.
    fn is_buildable_site(&self, service: &ServiceConfig) -> bool {
        let reason = match (&service.build, service.domain_name(&self.domain_key)) {
            (Some(_), Some(_)) => return true,
            (None, _) => "no build section",
            (Some(_), None) => "no domain name",
        };
        tracing::warn!("Skipping service {}: {}", service.name, reason);
        false
    }
}
