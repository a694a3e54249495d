mod common;

use anyhow::Result;
use autodock::core::graph::{collect_references, Reference};
use autodock::core::profile::SynthesisProfile;
use autodock::core::template::{render, TemplateFormat};
use autodock::core::Project;
use autodock::{DeployError, Synthesizer};
use common::{sample_project, service};
use std::collections::BTreeSet;

fn resource_types(doc: &serde_json::Value) -> Vec<String> {
    doc["Resources"]
        .as_object()
        .map(|resources| {
            resources
                .values()
                .filter_map(|r| r["Type"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn export_names(doc: &serde_json::Value) -> BTreeSet<String> {
    doc["Outputs"]
        .as_object()
        .map(|outputs| {
            outputs
                .values()
                .filter_map(|o| o["Export"]["Name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Every reference in both rendered templates resolves inside its own
/// document or to an export of the shared template.
#[test]
fn test_rendered_references_resolve() -> Result<()> {
    let project = sample_project();
    let synthesis = Synthesizer::new(SynthesisProfile::default()).synthesize(&project)?;

    let shared: serde_json::Value =
        serde_json::from_str(&render(&synthesis.shared, TemplateFormat::Json)?)?;
    let exports = export_names(&shared);

    let mut documents = vec![shared.clone()];
    for graph in &synthesis.services {
        documents.push(serde_json::from_str(&render(graph, TemplateFormat::Json)?)?);
    }

    for doc in &documents {
        let resources = doc["Resources"].as_object().expect("Resources section");
        for reference in collect_references(doc) {
            let resolved = match &reference {
                Reference::Ref(target) => {
                    target.starts_with("AWS::") || resources.contains_key(target)
                }
                Reference::GetAtt(target) | Reference::DependsOn(target) => {
                    resources.contains_key(target)
                }
                Reference::Import(name) => exports.contains(name),
            };
            assert!(resolved, "unresolved {:?}", reference);
        }
    }
    Ok(())
}

#[test]
fn test_yaml_and_json_render_the_same_document() -> Result<()> {
    let project = sample_project();
    let synthesis = Synthesizer::new(SynthesisProfile::default()).synthesize(&project)?;
    let graph = &synthesis.services[0];

    let from_yaml: serde_json::Value =
        serde_yaml::from_str(&render(graph, TemplateFormat::Yaml)?)?;
    let from_json: serde_json::Value = serde_json::from_str(&render(graph, TemplateFormat::Json)?)?;
    assert_eq!(from_yaml["Resources"], from_json["Resources"]);
    Ok(())
}

#[test]
fn test_one_zone_and_certificate_per_root_domain() -> Result<()> {
    let project = sample_project();
    let shared = Synthesizer::new(SynthesisProfile::default()).shared(&project)?;
    let doc = autodock::core::template::to_document(&shared)?;
    let types = resource_types(&doc);

    let zones = types.iter().filter(|t| *t == "AWS::Route53::HostedZone").count();
    let certs = types
        .iter()
        .filter(|t| *t == "AWS::CertificateManager::Certificate")
        .count();
    assert_eq!(zones, 2);
    assert_eq!(certs, 2);

    let exports = export_names(&doc);
    assert!(exports.contains("ExampleDotComHostedZone"));
    assert!(exports.contains("ExampleDotOrgCertificate"));
    assert!(exports.contains("shopPrivateSubnet1"));
    assert!(exports.contains("shopVpcId"));
    Ok(())
}

#[test]
fn test_all_services_without_domains_yield_no_zones() -> Result<()> {
    let project = Project {
        name: "shop".to_string(),
        services: vec![service("api", None), service("worker", None)],
    };
    let synthesizer = Synthesizer::new(SynthesisProfile::default());

    let shared = synthesizer.shared(&project)?;
    let types = resource_types(&autodock::core::template::to_document(&shared)?);
    assert!(!types.iter().any(|t| t == "AWS::Route53::HostedZone"));
    assert!(!types.iter().any(|t| t == "AWS::CertificateManager::Certificate"));
    assert!(types.iter().any(|t| t == "AWS::EC2::VPC"));

    assert!(synthesizer.synthesize(&project)?.services.is_empty());

    let named = Synthesizer::new(SynthesisProfile {
        services: vec!["api".to_string()],
        ..Default::default()
    });
    let err = named.synthesize(&project).unwrap_err();
    assert!(matches!(err, DeployError::MissingDomainName { .. }));
    assert!(err.to_string().contains("api"));
    Ok(())
}

#[test]
fn test_image_only_services_get_no_repository_or_stack() -> Result<()> {
    let mut db = service("db", None);
    db.image = "postgres:16".to_string();
    db.build = None;
    let mut web = service("web", Some("www.example.com"));
    web.image = "shop/web:1.0".to_string();
    let project = Project {
        name: "shop".to_string(),
        services: vec![web, db],
    };

    let synthesis = Synthesizer::new(SynthesisProfile::default()).synthesize(&project)?;

    assert_eq!(synthesis.services.len(), 1);
    let doc = autodock::core::template::to_document(&synthesis.shared)?;
    assert!(doc["Resources"]["ImageRepositoryForDb"].is_null());
    assert_eq!(
        doc["Resources"]["ImageRepositoryForWeb"]["Properties"]["RepositoryName"],
        "shop/web"
    );
    Ok(())
}

#[test]
fn test_deployable_subset_limits_repositories_and_stacks() -> Result<()> {
    let project = sample_project();
    let profile = SynthesisProfile {
        services: vec!["client".to_string()],
        ..Default::default()
    };
    let synthesis = Synthesizer::new(profile).synthesize(&project)?;

    assert_eq!(synthesis.services.len(), 1);
    assert_eq!(synthesis.services[0].name(), "shop-client");

    let repositories: Vec<&String> = synthesis
        .shared
        .resources()
        .keys()
        .filter(|id| id.starts_with("ImageRepositoryFor"))
        .collect();
    assert_eq!(repositories, ["ImageRepositoryForClient"]);

    // Domains of non-deployable services still get zones.
    let types = resource_types(&autodock::core::template::to_document(&synthesis.shared)?);
    assert_eq!(
        types.iter().filter(|t| *t == "AWS::Route53::HostedZone").count(),
        2
    );
    Ok(())
}
