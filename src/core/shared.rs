//! Builder for the shared ("bootstrap") stack: network, DNS zones,
//! certificates and image repositories used by every service stack.

use std::collections::BTreeSet;

use super::exports::ExportKey;
use super::graph::{Expr, Output, ResourceGraph};
use super::identifier::{identifier, root_domain};
use super::profile::SynthesisProfile;
use super::resources::*;
use crate::domain::model::Project;
use crate::utils::error::Result;

const ANYWHERE: &str = "0.0.0.0/0";
const LOAD_BALANCER_GROUP: &str = "AlbSecurityGroup";
const COMPUTE_GROUP: &str = "FargateTaskSecurityGroup";
const ENDPOINT_GROUP: &str = "VpcEndpointSecurityGroup";
const INTERNET_GATEWAY: &str = "InternetGateway";
const GATEWAY_ATTACHMENT: &str = "InternetGatewayAttachment";

/// Stack name of the shared stack.
pub fn shared_stack_name(project: &str) -> String {
    format!("{}-bootstrap", project)
}

/// Logical ids of the shared network, derived from the project name.
struct NetworkIds {
    vpc: String,
    private_subnets: [String; 2],
    public_subnets: [String; 2],
    private_route_table: String,
    public_route_table: String,
}

impl NetworkIds {
    fn new(project: &str) -> Self {
        Self {
            vpc: format!("{}VPC", project),
            private_subnets: [
                format!("{}PrivateSubnet1", project),
                format!("{}PrivateSubnet2", project),
            ],
            public_subnets: [
                format!("{}PublicSubnet1", project),
                format!("{}PublicSubnet2", project),
            ],
            private_route_table: format!("{}PrivateRouteTable", project),
            public_route_table: format!("{}PublicRouteTable", project),
        }
    }
}

/// Distinct root domains across services carrying a domain name.
///
/// Services without one are skipped with a warning; they cannot get a service
/// stack but do not block the shared stack.
pub fn collect_root_domains(project: &Project, domain_key: &str) -> BTreeSet<String> {
    let mut roots = BTreeSet::new();
    for service in &project.services {
        match service.domain_name(domain_key) {
            Some(domain) => {
                roots.insert(root_domain(&domain));
            }
            None => tracing::warn!(
                "Missing or empty {} field in service {}",
                domain_key,
                service.name
            ),
        }
    }
    roots
}

pub fn build_shared_graph(project: &Project, profile: &SynthesisProfile) -> Result<ResourceGraph> {
    let mut graph = ResourceGraph::new(shared_stack_name(&project.name)).with_description(format!(
        "Shared network, DNS and image resources for {}",
        project.name
    ));
    let ids = NetworkIds::new(&project.name);
    let deployable = profile.deployable(project)?;

    let root_domains = collect_root_domains(project, &profile.domain_key);
    for root in &root_domains {
        declare_domain(&mut graph, &project.name, root)?;
    }

    declare_network(&mut graph, &ids, profile)?;

    let mut service_ports: Vec<u16> = deployable
        .iter()
        .map(|s| profile.compute_for(&s.name).container_port)
        .collect();
    service_ports.sort_unstable();
    service_ports.dedup();
    declare_security_groups(&mut graph, &ids, &service_ports)?;
    declare_endpoints(&mut graph, &ids)?;

    for service in &deployable {
        graph.declare(
            format!("ImageRepositoryFor{}", identifier(&service.name)),
            Repository {
                repository_name: service.repository().to_string(),
            },
        )?;
    }

    export_network(&mut graph, &project.name, &ids);

    tracing::debug!(
        "Built shared graph {} with {} resources and {} root domains",
        graph.name(),
        graph.resources().len(),
        root_domains.len()
    );
    Ok(graph)
}

fn declare_domain(graph: &mut ResourceGraph, project: &str, root: &str) -> Result<()> {
    let zone = ExportKey::HostedZone(root.to_string());
    let zone_id = zone.output_id();
    graph.declare(
        zone_id.clone(),
        HostedZone {
            name: root.to_string(),
            hosted_zone_config: HostedZoneConfig {
                comment: format!("DNS config for {}", root),
            },
        },
    )?;

    let certificate = ExportKey::Certificate(root.to_string());
    let certificate_id = certificate.output_id();
    graph.declare(
        certificate_id.clone(),
        Certificate {
            domain_name: root.to_string(),
            subject_alternative_names: vec![format!("*.{}", root)],
            validation_method: "DNS".to_string(),
            domain_validation_options: vec![DomainValidationOption {
                domain_name: root.to_string(),
                hosted_zone_id: Expr::reference(zone_id.clone()),
            }],
        },
    )?;

    graph.add_output(
        zone_id.clone(),
        Output::exported(Expr::reference(zone_id), zone.export_name(project)),
    );
    graph.add_output(
        certificate_id.clone(),
        Output::exported(Expr::reference(certificate_id), certificate.export_name(project)),
    );
    Ok(())
}

fn declare_network(graph: &mut ResourceGraph, ids: &NetworkIds, profile: &SynthesisProfile) -> Result<()> {
    let network = &profile.network;
    graph.declare(
        ids.vpc.clone(),
        Vpc {
            cidr_block: Expr::str(&network.vpc_cidr),
            enable_dns_support: true,
            enable_dns_hostnames: true,
        },
    )?;

    // One subnet of each kind per availability zone.
    for (zone, (private, public)) in ids
        .private_subnets
        .iter()
        .zip(ids.public_subnets.iter())
        .enumerate()
    {
        graph.declare(
            private.clone(),
            Subnet {
                vpc_id: Expr::reference(&ids.vpc),
                cidr_block: Expr::str(&network.private_subnet_cidrs[zone]),
                availability_zone: Expr::SelectAz(zone as u32),
            },
        )?;
        graph.declare(
            public.clone(),
            Subnet {
                vpc_id: Expr::reference(&ids.vpc),
                cidr_block: Expr::str(&network.public_subnet_cidrs[zone]),
                availability_zone: Expr::SelectAz(zone as u32),
            },
        )?;
    }

    for (table, subnets, prefix) in [
        (&ids.private_route_table, &ids.private_subnets, "Private"),
        (&ids.public_route_table, &ids.public_subnets, "Public"),
    ] {
        graph.declare(
            table.clone(),
            RouteTable {
                vpc_id: Expr::reference(&ids.vpc),
            },
        )?;
        for (n, subnet) in subnets.iter().enumerate() {
            graph.declare(
                format!("{}Subnet{}RouteTableAssoc", prefix, n + 1),
                SubnetRouteTableAssociation {
                    subnet_id: Expr::reference(subnet),
                    route_table_id: Expr::reference(table),
                },
            )?;
        }
    }

    graph.declare(INTERNET_GATEWAY, InternetGateway::default())?;
    graph.declare(
        GATEWAY_ATTACHMENT,
        GatewayAttachment {
            vpc_id: Expr::reference(&ids.vpc),
            internet_gateway_id: Expr::reference(INTERNET_GATEWAY),
        },
    )?;
    // A route to a gateway fails until the gateway is attached.
    graph
        .declare(
            "PublicRoute",
            Route {
                route_table_id: Expr::reference(&ids.public_route_table),
                destination_cidr_block: Expr::str(ANYWHERE),
                gateway_id: Expr::reference(INTERNET_GATEWAY),
            },
        )?
        .depends_on([GATEWAY_ATTACHMENT]);
    Ok(())
}

fn declare_security_groups(graph: &mut ResourceGraph, ids: &NetworkIds, service_ports: &[u16]) -> Result<()> {
    graph.declare(
        LOAD_BALANCER_GROUP,
        SecurityGroup {
            group_description: "For ALB".to_string(),
            vpc_id: Expr::reference(&ids.vpc),
            security_group_ingress: vec![
                IngressRule::tcp_from_cidr(443, ANYWHERE, "Allow HTTPS from anywhere"),
                IngressRule::tcp_from_cidr(80, ANYWHERE, "Allow HTTP from anywhere"),
            ],
        },
    )?;

    graph.declare(
        COMPUTE_GROUP,
        SecurityGroup {
            group_description: "For Fargate tasks".to_string(),
            vpc_id: Expr::reference(&ids.vpc),
            security_group_ingress: service_ports
                .iter()
                .map(|port| {
                    IngressRule::tcp_from_group(
                        *port,
                        Expr::reference(LOAD_BALANCER_GROUP),
                        "Allow traffic from ALB",
                    )
                })
                .collect(),
        },
    )?;

    graph.declare(
        ENDPOINT_GROUP,
        SecurityGroup {
            group_description: "For VPC Endpoints".to_string(),
            vpc_id: Expr::reference(&ids.vpc),
            security_group_ingress: Vec::new(),
        },
    )?;
    graph.declare(
        "VpcEndpointSecurityGroupIngress",
        SecurityGroupIngress {
            group_id: Expr::reference(ENDPOINT_GROUP),
            rule: IngressRule::tcp_from_group(
                443,
                Expr::reference(COMPUTE_GROUP),
                "Allow HTTPS from Fargate tasks",
            ),
        },
    )?;
    Ok(())
}

// Tasks in private subnets reach the registry and log ingestion through these
// endpoints instead of a NAT gateway.
fn declare_endpoints(graph: &mut ResourceGraph, ids: &NetworkIds) -> Result<()> {
    for (logical_id, service) in [
        ("EcrApiVpcEndpoint", "ecr.api"),
        ("EcrDkrVpcEndpoint", "ecr.dkr"),
        ("CloudWatchVpcEndpoint", "logs"),
    ] {
        graph.declare(
            logical_id,
            VpcEndpoint {
                vpc_id: Expr::reference(&ids.vpc),
                service_name: Expr::Sub(format!("com.amazonaws.${{AWS::Region}}.{}", service)),
                vpc_endpoint_type: "Interface".to_string(),
                subnet_ids: ids.private_subnets.iter().map(Expr::reference).collect(),
                security_group_ids: vec![Expr::reference(ENDPOINT_GROUP)],
                route_table_ids: Vec::new(),
                private_dns_enabled: Some(true),
            },
        )?;
    }

    // ECR stores layers in S3.
    graph.declare(
        "S3GatewayVpcEndpoint",
        VpcEndpoint {
            vpc_id: Expr::reference(&ids.vpc),
            service_name: Expr::Sub("com.amazonaws.${AWS::Region}.s3".to_string()),
            vpc_endpoint_type: "Gateway".to_string(),
            subnet_ids: Vec::new(),
            security_group_ids: Vec::new(),
            route_table_ids: vec![Expr::reference(&ids.private_route_table)],
            private_dns_enabled: None,
        },
    )?;
    Ok(())
}

fn export_network(graph: &mut ResourceGraph, project: &str, ids: &NetworkIds) {
    for key in ExportKey::network_keys() {
        let target = match &key {
            ExportKey::PrivateSubnet(n) => ids.private_subnets[usize::from(*n) - 1].clone(),
            ExportKey::PublicSubnet(n) => ids.public_subnets[usize::from(*n) - 1].clone(),
            ExportKey::VpcId => ids.vpc.clone(),
            ExportKey::ComputeSecurityGroup => COMPUTE_GROUP.to_string(),
            ExportKey::LoadBalancerSecurityGroup => LOAD_BALANCER_GROUP.to_string(),
            ExportKey::HostedZone(_) | ExportKey::Certificate(_) => continue,
        };
        graph.add_output(
            key.output_id(),
            Output::exported(Expr::reference(target), key.export_name(project)),
        );
    }
}
