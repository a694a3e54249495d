//! Builder for one service stack: task, cluster, load balancer, listeners,
//! DNS record and the ECS service tying them together.

use std::collections::BTreeMap;

use super::exports::ExportKey;
use super::graph::{Expr, ResourceGraph};
use super::identifier::{identifier, root_domain};
use super::profile::SynthesisProfile;
use super::resources::*;
use crate::domain::model::{Project, ServiceConfig};
use crate::utils::error::{DeployError, Result};

const TASK_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";

const ELB_NAME_LIMIT: usize = 32;

/// Load balancer and target group names allow letters, digits and hyphens,
/// at most 32 characters. The service part is truncated to keep `suffix`.
fn elb_name(service: &str, suffix: &str) -> String {
    let base: String = service
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let base = base.trim_matches('-');
    let room = ELB_NAME_LIMIT.saturating_sub(suffix.len());
    let base = &base[..base.len().min(room)];
    format!("{}{}", base.trim_end_matches('-'), suffix)
}

/// Stack name of a service stack.
pub fn service_stack_name(project: &str, service: &str) -> String {
    format!("{}-{}", project, service)
}

/// Logical ids of a service graph.
struct ServiceIds {
    log_group: String,
    cluster: String,
    execution_role: String,
    task_definition: String,
    load_balancer: String,
    target_group: String,
    https_listener: String,
    http_listener: String,
    record_set: String,
    service: String,
}

impl ServiceIds {
    fn new(service: &str) -> Self {
        let prefix = identifier(service);
        let id = |suffix: &str| format!("{}{}", prefix, suffix);
        Self {
            log_group: id("EcsTaskLogGroup"),
            cluster: id("EcsFargateCluster"),
            execution_role: id("EcsTaskExecutionRole"),
            task_definition: id("EcsTaskDefinition"),
            load_balancer: id("Alb"),
            target_group: id("AlbTargetGroup"),
            https_listener: id("HttpsListener"),
            http_listener: id("HttpListener"),
            record_set: id("RecordSet"),
            service: id("EcsFargateService"),
        }
    }
}

/// Builds the graph of `service`, running `image_tag` verbatim.
///
/// Fails when the service has no domain name: without one it is unreachable.
pub fn build_service_graph(
    project: &Project,
    service: &ServiceConfig,
    image_tag: &str,
    profile: &SynthesisProfile,
) -> Result<ResourceGraph> {
    let domain = service
        .domain_name(&profile.domain_key)
        .ok_or_else(|| DeployError::MissingDomainName {
            service: service.name.clone(),
            key: profile.domain_key.clone(),
        })?;
    let root = root_domain(&domain);
    let compute = profile.compute_for(&service.name);
    let ids = ServiceIds::new(&service.name);
    let container = service.container_name().to_string();

    let mut graph = ResourceGraph::new(service_stack_name(&project.name, &service.name))
        .with_description(format!("Service {} of {}", service.name, project.name));

    let import = |graph: &mut ResourceGraph, key: ExportKey| graph.import(key.export_name(&project.name));

    // Task
    graph.declare(
        ids.log_group.clone(),
        LogGroup {
            log_group_name: format!("ecs/{}-{}", service.name, container),
        },
    )?;
    graph.declare(
        ids.cluster.clone(),
        Cluster {
            cluster_name: format!("{}Cluster", service.name),
        },
    )?;
    graph.declare(
        ids.execution_role.clone(),
        Role::for_service(
            "ecs-tasks.amazonaws.com",
            vec![TASK_EXECUTION_POLICY.to_string()],
        ),
    )?;

    let mut log_options = BTreeMap::new();
    log_options.insert("awslogs-group".to_string(), Expr::reference(&ids.log_group));
    log_options.insert("awslogs-region".to_string(), Expr::region());
    log_options.insert("awslogs-stream-prefix".to_string(), Expr::stack_name());

    graph.declare(
        ids.task_definition.clone(),
        TaskDefinition {
            network_mode: "awsvpc".to_string(),
            requires_compatibilities: vec!["FARGATE".to_string()],
            container_definitions: vec![ContainerDefinition {
                name: container.clone(),
                image: image_tag.to_string(),
                port_mappings: vec![PortMapping {
                    container_port: compute.container_port,
                    protocol: "tcp".to_string(),
                }],
                log_configuration: LogConfiguration {
                    log_driver: "awslogs".to_string(),
                    options: log_options,
                },
            }],
            cpu: compute.cpu.clone(),
            memory: compute.memory.clone(),
            execution_role_arn: Expr::get_att(&ids.execution_role, "Arn"),
            runtime_platform: RuntimePlatform {
                cpu_architecture: compute.cpu_architecture.clone(),
                operating_system_family: compute.operating_system_family.clone(),
            },
        },
    )?;

    // Load balancing
    let public_subnets = vec![
        import(&mut graph, ExportKey::PublicSubnet(1)),
        import(&mut graph, ExportKey::PublicSubnet(2)),
    ];
    let load_balancer_group = import(&mut graph, ExportKey::LoadBalancerSecurityGroup);
    graph.declare(
        ids.load_balancer.clone(),
        LoadBalancer {
            name: elb_name(&service.name, "Alb"),
            scheme: "internet-facing".to_string(),
            subnets: public_subnets,
            security_groups: vec![load_balancer_group],
            lb_type: "application".to_string(),
        },
    )?;

    let vpc_id = import(&mut graph, ExportKey::VpcId);
    graph.declare(
        ids.target_group.clone(),
        TargetGroup {
            name: elb_name(&service.name, "AlbTargetGroup"),
            protocol: "HTTP".to_string(),
            port: 80,
            target_type: "ip".to_string(),
            vpc_id,
            health_check_interval_seconds: compute.health_check_interval_seconds,
            health_check_path: compute.health_check_path.clone(),
            health_check_port: compute.container_port.to_string(),
            health_check_protocol: "HTTP".to_string(),
            health_check_timeout_seconds: compute.health_check_timeout_seconds,
            matcher: Matcher {
                http_code: "200".to_string(),
            },
        },
    )?;

    let certificate = import(&mut graph, ExportKey::Certificate(root.clone()));
    graph
        .declare(
            ids.https_listener.clone(),
            Listener {
                load_balancer_arn: Expr::reference(&ids.load_balancer),
                protocol: "HTTPS".to_string(),
                port: 443,
                default_actions: vec![ListenerAction::forward(Expr::reference(&ids.target_group))],
                certificates: vec![ListenerCertificate {
                    certificate_arn: certificate,
                }],
                ssl_policy: Some(compute.ssl_policy.clone()),
            },
        )?
        .depends_on([&ids.target_group, &ids.load_balancer]);

    graph
        .declare(
            ids.http_listener.clone(),
            Listener {
                load_balancer_arn: Expr::reference(&ids.load_balancer),
                protocol: "HTTP".to_string(),
                port: 80,
                default_actions: vec![ListenerAction::redirect(RedirectConfig {
                    protocol: "HTTPS".to_string(),
                    port: "443".to_string(),
                    status_code: "HTTP_301".to_string(),
                })],
                certificates: Vec::new(),
                ssl_policy: None,
            },
        )?
        .depends_on([&ids.target_group, &ids.load_balancer]);

    // DNS
    let hosted_zone = import(&mut graph, ExportKey::HostedZone(root));
    graph.declare(
        ids.record_set.clone(),
        RecordSet {
            name: format!("{}.", domain),
            hosted_zone_id: hosted_zone,
            record_type: "A".to_string(),
            alias_target: AliasTarget {
                dns_name: Expr::get_att(&ids.load_balancer, "DNSName"),
                hosted_zone_id: Expr::get_att(&ids.load_balancer, "CanonicalHostedZoneID"),
            },
        },
    )?;

    // Service
    let private_subnets = vec![
        import(&mut graph, ExportKey::PrivateSubnet(1)),
        import(&mut graph, ExportKey::PrivateSubnet(2)),
    ];
    let compute_group = import(&mut graph, ExportKey::ComputeSecurityGroup);
    graph
        .declare(
            ids.service.clone(),
            EcsService {
                service_name: format!("{}FargateService", service.name),
                cluster: Expr::reference(&ids.cluster),
                desired_count: compute.desired_count,
                launch_type: "FARGATE".to_string(),
                task_definition: Expr::reference(&ids.task_definition),
                network_configuration: NetworkConfiguration {
                    awsvpc_configuration: AwsVpcConfiguration {
                        subnets: private_subnets,
                        security_groups: vec![compute_group],
                        assign_public_ip: "DISABLED".to_string(),
                    },
                },
                load_balancers: vec![ServiceLoadBalancer {
                    container_name: container,
                    container_port: compute.container_port,
                    target_group_arn: Expr::reference(&ids.target_group),
                }],
            },
        )?
        .depends_on([
            &ids.target_group,
            &ids.load_balancer,
            &ids.https_listener,
            &ids.http_listener,
        ]);

    tracing::debug!(
        "Built service graph {} with {} resources importing {} exports",
        graph.name(),
        graph.resources().len(),
        graph.imports().len()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resources::ResourceKind;

    fn project_with(domain: Option<&str>) -> Project {
        let mut extensions = BTreeMap::new();
        if let Some(domain) = domain {
            extensions.insert("x-domain-name".to_string(), serde_json::json!(domain));
        }
        Project {
            name: "shop".to_string(),
            services: vec![ServiceConfig {
                name: "client".to_string(),
                image: "shop/client".to_string(),
                extensions,
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_elb_names_fit_the_limit() {
        assert_eq!(elb_name("client", "Alb"), "clientAlb");
        assert_eq!(elb_name("my_api", "AlbTargetGroup"), "my-apiAlbTargetGroup");

        let long = "reporting-dashboard-frontend-service";
        for suffix in ["Alb", "AlbTargetGroup"] {
            let name = elb_name(long, suffix);
            assert!(name.len() <= ELB_NAME_LIMIT, "{}", name);
            assert!(name.ends_with(suffix));
            assert!(!name.contains("-Alb"));
        }
    }

    #[test]
    fn test_underscored_service_builds_valid_ids() {
        let mut project = project_with(Some("api.example.com"));
        project.services[0].name = "my_api".to_string();
        let graph = build_service_graph(
            &project,
            &project.services[0],
            "tag",
            &SynthesisProfile::default(),
        )
        .unwrap();

        graph.validate().unwrap();
        assert!(graph.resource("MyUnderscoreApiAlb").is_some());
        match graph.resource("MyUnderscoreApiAlb").unwrap().kind() {
            ResourceKind::LoadBalancer(lb) => assert_eq!(lb.name, "my-apiAlb"),
            other => panic!("unexpected kind {}", other.type_name()),
        }
    }

    #[test]
    fn test_missing_domain_is_an_error() {
        let project = project_with(None);
        let err = build_service_graph(
            &project,
            &project.services[0],
            "registry/shop/client:1",
            &SynthesisProfile::default(),
        )
        .unwrap_err();

        match &err {
            DeployError::MissingDomainName { service, key } => {
                assert_eq!(service, "client");
                assert_eq!(key, "x-domain-name");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("client"));
    }

    #[test]
    fn test_service_graph_is_self_consistent() {
        let project = project_with(Some("app.example.com"));
        let graph = build_service_graph(
            &project,
            &project.services[0],
            "registry/shop/client:202401011200",
            &SynthesisProfile::default(),
        )
        .unwrap();

        graph.validate().unwrap();
        assert_eq!(graph.name(), "shop-client");
        assert_eq!(graph.resources().len(), 10);

        let imports: Vec<&str> = graph.imports().iter().map(|i| i.as_str()).collect();
        assert!(imports.contains(&"ExampleDotComHostedZone"));
        assert!(imports.contains(&"ExampleDotComCertificate"));
        assert!(imports.contains(&"shopPrivateSubnet1"));
        assert!(imports.contains(&"shopAlbSecurityGroup"));
    }

    #[test]
    fn test_listeners_and_service_declare_ordering() {
        let project = project_with(Some("example.com"));
        let graph = build_service_graph(
            &project,
            &project.services[0],
            "tag",
            &SynthesisProfile::default(),
        )
        .unwrap();

        for listener in ["ClientHttpsListener", "ClientHttpListener"] {
            let deps = graph.resource(listener).unwrap().dependencies();
            assert!(deps.contains(&"ClientAlbTargetGroup".to_string()));
            assert!(deps.contains(&"ClientAlb".to_string()));
        }
        assert_eq!(
            graph.resource("ClientEcsFargateService").unwrap().dependencies(),
            [
                "ClientAlbTargetGroup",
                "ClientAlb",
                "ClientHttpsListener",
                "ClientHttpListener"
            ]
        );
    }

    #[test]
    fn test_image_tag_and_profile_flow_into_task() {
        let project = project_with(Some("example.com"));
        let mut profile = SynthesisProfile::default();
        profile.compute.cpu = "512".to_string();
        let graph = build_service_graph(
            &project,
            &project.services[0],
            "123.dkr.ecr.us-east-1.amazonaws.com/shop/client:202401011200",
            &profile,
        )
        .unwrap();

        match graph.resource("ClientEcsTaskDefinition").unwrap().kind() {
            ResourceKind::TaskDefinition(task) => {
                assert_eq!(task.cpu, "512");
                assert_eq!(task.memory, "2048");
                assert_eq!(
                    task.container_definitions[0].image,
                    "123.dkr.ecr.us-east-1.amazonaws.com/shop/client:202401011200"
                );
                assert_eq!(task.container_definitions[0].port_mappings[0].container_port, 3000);
            }
            other => panic!("unexpected kind {}", other.type_name()),
        }

        match graph.resource("ClientRecordSet").unwrap().kind() {
            ResourceKind::RecordSet(record) => assert_eq!(record.name, "example.com."),
            other => panic!("unexpected kind {}", other.type_name()),
        }
    }
}
