use std::collections::BTreeSet;

use super::exports::ExportName;
use super::graph::ResourceGraph;
use super::profile::SynthesisProfile;
use super::service::build_service_graph;
use super::shared::build_shared_graph;
use crate::domain::model::{Project, ServiceConfig};
use crate::utils::error::{DeployError, Result};

/// The graphs of one synthesis run.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub shared: ResourceGraph,
    /// Service graphs, in manifest order.
    pub services: Vec<ResourceGraph>,
}

impl Synthesis {
    pub fn service(&self, stack_name: &str) -> Option<&ResourceGraph> {
        self.services.iter().find(|g| g.name() == stack_name)
    }
}

pub struct Synthesizer {
    profile: SynthesisProfile,
}

impl Synthesizer {
    pub fn new(profile: SynthesisProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &SynthesisProfile {
        &self.profile
    }

    pub fn shared(&self, project: &Project) -> Result<ResourceGraph> {
        build_shared_graph(project, &self.profile)
    }

    /// Builds one service graph and checks its imports against `shared`.
    pub fn service(
        &self,
        project: &Project,
        service: &ServiceConfig,
        image_tag: &str,
        shared: &ResourceGraph,
    ) -> Result<ResourceGraph> {
        let graph = build_service_graph(project, service, image_tag, &self.profile)?;
        verify_imports(&graph, &shared.exports())?;
        Ok(graph)
    }

    /// Builds the shared graph and the graph of every deployable service,
    /// using the manifest image references as tags.
    pub fn synthesize(&self, project: &Project) -> Result<Synthesis> {
        let shared = self.shared(project)?;
        let services = self
            .profile
            .deployable(project)?
            .into_iter()
            .map(|service| self.service(project, service, &service.image, &shared))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "Synthesized {} with {} service stacks",
            shared.name(),
            services.len()
        );
        Ok(Synthesis { shared, services })
    }
}

/// Fails with the first import of `graph` that no export in `available` satisfies.
pub fn verify_imports(graph: &ResourceGraph, available: &BTreeSet<ExportName>) -> Result<()> {
    match graph.imports().difference(available).next() {
        Some(missing) => Err(DeployError::UnresolvedImport {
            graph: graph.name().to_string(),
            export: missing.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::BuildConfig;
    use std::collections::BTreeMap;

    fn service(name: &str, domain: Option<&str>) -> ServiceConfig {
        let mut extensions = BTreeMap::new();
        if let Some(domain) = domain {
            extensions.insert("x-domain-name".to_string(), serde_json::json!(domain));
        }
        ServiceConfig {
            name: name.to_string(),
            image: format!("shop/{}", name),
            build: Some(BuildConfig {
                context: format!("./{}", name),
                dockerfile: None,
            }),
            extensions,
            ..Default::default()
        }
    }

    #[test]
    fn test_synthesize_links_every_service_to_shared_exports() {
        let project = Project {
            name: "shop".to_string(),
            services: vec![
                service("api", Some("api.example.com")),
                service("client", Some("www.example.com")),
            ],
        };

        let synthesis = Synthesizer::new(SynthesisProfile::default())
            .synthesize(&project)
            .unwrap();

        assert_eq!(synthesis.shared.name(), "shop-bootstrap");
        assert_eq!(synthesis.services.len(), 2);
        assert!(synthesis.service("shop-api").is_some());

        let exports = synthesis.shared.exports();
        for graph in &synthesis.services {
            assert!(graph.imports().is_subset(&exports));
        }
    }

    #[test]
    fn test_named_service_without_domain_fails_synthesis() {
        let project = Project {
            name: "shop".to_string(),
            services: vec![service("api", Some("api.example.com")), service("worker", None)],
        };
        let profile = SynthesisProfile {
            services: vec!["api".to_string(), "worker".to_string()],
            ..Default::default()
        };

        let err = Synthesizer::new(profile)
            .synthesize(&project)
            .unwrap_err();
        assert!(matches!(err, DeployError::MissingDomainName { ref service, .. } if service == "worker"));
    }

    #[test]
    fn test_default_synthesis_skips_unbuilt_and_domainless_services() {
        let mut db = service("db", None);
        db.image = "postgres:16".to_string();
        db.build = None;
        let project = Project {
            name: "shop".to_string(),
            services: vec![service("api", Some("api.example.com")), db, service("worker", None)],
        };

        let synthesis = Synthesizer::new(SynthesisProfile::default())
            .synthesize(&project)
            .unwrap();

        let stacks: Vec<&str> = synthesis.services.iter().map(|g| g.name()).collect();
        assert_eq!(stacks, ["shop-api"]);
    }

    #[test]
    fn test_verify_imports_reports_missing_export() {
        let mut graph = ResourceGraph::new("shop-api");
        graph.import(crate::core::exports::ExportKey::VpcId.export_name("shop"));

        match verify_imports(&graph, &BTreeSet::new()).unwrap_err() {
            DeployError::UnresolvedImport { graph, export } => {
                assert_eq!(graph, "shop-api");
                assert_eq!(export, "shopVpcId");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
