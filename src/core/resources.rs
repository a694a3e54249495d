//! Typed CloudFormation resource declarations.
//!
//! Each struct serializes to the resource's `Properties` block. Values that can
//! point at other resources or stacks are [`Expr`]; the rest are plain literals.

use serde::Serialize;
use std::collections::BTreeMap;

use super::graph::Expr;

macro_rules! resource_kinds {
    ($($variant:ident($props:ident) => $type_name:literal,)+) => {
        /// Every resource type the graph builders declare.
        #[derive(Debug, Clone, Serialize)]
        #[serde(untagged)]
        pub enum ResourceKind {
            $($variant($props),)+
        }

        impl ResourceKind {
            /// The CloudFormation resource type, e.g. `AWS::EC2::VPC`.
            pub fn type_name(&self) -> &'static str {
                match self {
                    $(ResourceKind::$variant(_) => $type_name,)+
                }
            }
        }

        $(
            impl From<$props> for ResourceKind {
                fn from(props: $props) -> Self {
                    ResourceKind::$variant(props)
                }
            }
        )+
    };
}

resource_kinds! {
    Vpc(Vpc) => "AWS::EC2::VPC",
    Subnet(Subnet) => "AWS::EC2::Subnet",
    RouteTable(RouteTable) => "AWS::EC2::RouteTable",
    SubnetRouteTableAssociation(SubnetRouteTableAssociation) => "AWS::EC2::SubnetRouteTableAssociation",
    InternetGateway(InternetGateway) => "AWS::EC2::InternetGateway",
    GatewayAttachment(GatewayAttachment) => "AWS::EC2::VPCGatewayAttachment",
    Route(Route) => "AWS::EC2::Route",
    SecurityGroup(SecurityGroup) => "AWS::EC2::SecurityGroup",
    SecurityGroupIngress(SecurityGroupIngress) => "AWS::EC2::SecurityGroupIngress",
    VpcEndpoint(VpcEndpoint) => "AWS::EC2::VPCEndpoint",
    HostedZone(HostedZone) => "AWS::Route53::HostedZone",
    Certificate(Certificate) => "AWS::CertificateManager::Certificate",
    Repository(Repository) => "AWS::ECR::Repository",
    Cluster(Cluster) => "AWS::ECS::Cluster",
    TaskDefinition(TaskDefinition) => "AWS::ECS::TaskDefinition",
    EcsService(EcsService) => "AWS::ECS::Service",
    LoadBalancer(LoadBalancer) => "AWS::ElasticLoadBalancingV2::LoadBalancer",
    Listener(Listener) => "AWS::ElasticLoadBalancingV2::Listener",
    TargetGroup(TargetGroup) => "AWS::ElasticLoadBalancingV2::TargetGroup",
    RecordSet(RecordSet) => "AWS::Route53::RecordSet",
    Role(Role) => "AWS::IAM::Role",
    LogGroup(LogGroup) => "AWS::Logs::LogGroup",
}

// ---------------------------------------------------------------------------
// Networking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vpc {
    pub cidr_block: Expr,
    pub enable_dns_support: bool,
    pub enable_dns_hostnames: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Subnet {
    pub vpc_id: Expr,
    pub cidr_block: Expr,
    pub availability_zone: Expr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteTable {
    pub vpc_id: Expr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubnetRouteTableAssociation {
    pub subnet_id: Expr,
    pub route_table_id: Expr,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InternetGateway {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayAttachment {
    pub vpc_id: Expr,
    pub internet_gateway_id: Expr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Route {
    pub route_table_id: Expr,
    pub destination_cidr_block: Expr,
    pub gateway_id: Expr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroup {
    pub group_description: String,
    pub vpc_id: Expr,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_group_ingress: Vec<IngressRule>,
}

/// An inline ingress rule. Exactly one of `cidr_ip` and
/// `source_security_group_id` is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngressRule {
    pub ip_protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr_ip: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_security_group_id: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl IngressRule {
    pub fn tcp_from_cidr(port: u16, cidr: &str, description: &str) -> Self {
        Self {
            ip_protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr_ip: Some(Expr::str(cidr)),
            source_security_group_id: None,
            description: Some(description.to_string()),
        }
    }

    pub fn tcp_from_group(port: u16, group: Expr, description: &str) -> Self {
        Self {
            ip_protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr_ip: None,
            source_security_group_id: Some(group),
            description: Some(description.to_string()),
        }
    }
}

/// A standalone ingress rule attached to an existing group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupIngress {
    pub group_id: Expr,
    #[serde(flatten)]
    pub rule: IngressRule,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcEndpoint {
    pub vpc_id: Expr,
    pub service_name: Expr,
    pub vpc_endpoint_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subnet_ids: Vec<Expr>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<Expr>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub route_table_ids: Vec<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_dns_enabled: Option<bool>,
}

// ---------------------------------------------------------------------------
// DNS and certificates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostedZone {
    pub name: String,
    pub hosted_zone_config: HostedZoneConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostedZoneConfig {
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Certificate {
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    pub validation_method: String,
    pub domain_validation_options: Vec<DomainValidationOption>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainValidationOption {
    pub domain_name: String,
    pub hosted_zone_id: Expr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordSet {
    pub name: String,
    pub hosted_zone_id: Expr,
    #[serde(rename = "Type")]
    pub record_type: String,
    pub alias_target: AliasTarget,
}

#[derive(Debug, Clone, Serialize)]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: Expr,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: Expr,
}

// ---------------------------------------------------------------------------
// Images, compute and logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Repository {
    pub repository_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cluster {
    pub cluster_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogGroup {
    pub log_group_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Role {
    pub assume_role_policy_document: serde_json::Value,
    pub managed_policy_arns: Vec<String>,
}

impl Role {
    /// A role assumable by the given service principal.
    pub fn for_service(principal: &str, managed_policy_arns: Vec<String>) -> Self {
        Self {
            assume_role_policy_document: serde_json::json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": "sts:AssumeRole",
                    "Principal": { "Service": principal }
                }]
            }),
            managed_policy_arns,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskDefinition {
    pub network_mode: String,
    pub requires_compatibilities: Vec<String>,
    pub container_definitions: Vec<ContainerDefinition>,
    pub cpu: String,
    pub memory: String,
    pub execution_role_arn: Expr,
    pub runtime_platform: RuntimePlatform,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub port_mappings: Vec<PortMapping>,
    pub log_configuration: LogConfiguration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogConfiguration {
    pub log_driver: String,
    pub options: BTreeMap<String, Expr>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimePlatform {
    pub cpu_architecture: String,
    pub operating_system_family: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EcsService {
    pub service_name: String,
    pub cluster: Expr,
    pub desired_count: u32,
    pub launch_type: String,
    pub task_definition: Expr,
    pub network_configuration: NetworkConfiguration,
    pub load_balancers: Vec<ServiceLoadBalancer>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkConfiguration {
    pub awsvpc_configuration: AwsVpcConfiguration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwsVpcConfiguration {
    pub subnets: Vec<Expr>,
    pub security_groups: Vec<Expr>,
    pub assign_public_ip: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceLoadBalancer {
    pub container_name: String,
    pub container_port: u16,
    pub target_group_arn: Expr,
}

// ---------------------------------------------------------------------------
// Load balancing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancer {
    pub name: String,
    pub scheme: String,
    pub subnets: Vec<Expr>,
    pub security_groups: Vec<Expr>,
    #[serde(rename = "Type")]
    pub lb_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetGroup {
    pub name: String,
    pub protocol: String,
    pub port: u16,
    pub target_type: String,
    pub vpc_id: Expr,
    pub health_check_interval_seconds: u32,
    pub health_check_path: String,
    pub health_check_port: String,
    pub health_check_protocol: String,
    pub health_check_timeout_seconds: u32,
    pub matcher: Matcher,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Matcher {
    pub http_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Listener {
    pub load_balancer_arn: Expr,
    pub protocol: String,
    pub port: u16,
    pub default_actions: Vec<ListenerAction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<ListenerCertificate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_policy: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerAction {
    #[serde(rename = "Type")]
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_group_arn: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_config: Option<RedirectConfig>,
}

impl ListenerAction {
    pub fn forward(target_group: Expr) -> Self {
        Self {
            action_type: "forward".to_string(),
            target_group_arn: Some(target_group),
            redirect_config: None,
        }
    }

    pub fn redirect(config: RedirectConfig) -> Self {
        Self {
            action_type: "redirect".to_string(),
            target_group_arn: None,
            redirect_config: Some(config),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RedirectConfig {
    pub protocol: String,
    pub port: String,
    pub status_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerCertificate {
    pub certificate_arn: Expr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        let kind = ResourceKind::from(InternetGateway::default());
        assert_eq!(kind.type_name(), "AWS::EC2::InternetGateway");

        let kind = ResourceKind::from(LogGroup {
            log_group_name: "ecs/web".to_string(),
        });
        assert_eq!(kind.type_name(), "AWS::Logs::LogGroup");
    }

    #[test]
    fn test_properties_use_cloudformation_names() {
        let target = AliasTarget {
            dns_name: Expr::get_att("WebAlb", "DNSName"),
            hosted_zone_id: Expr::get_att("WebAlb", "CanonicalHostedZoneID"),
        };
        let value = serde_json::to_value(&target).unwrap();
        assert!(value.get("DNSName").is_some());
        assert!(value.get("HostedZoneId").is_some());

        let ingress = SecurityGroupIngress {
            group_id: Expr::reference("EndpointGroup"),
            rule: IngressRule::tcp_from_group(443, Expr::reference("TaskGroup"), "https"),
        };
        let value = serde_json::to_value(&ingress).unwrap();
        assert_eq!(value["GroupId"], serde_json::json!({ "Ref": "EndpointGroup" }));
        assert_eq!(value["IpProtocol"], "tcp");
        assert_eq!(value["FromPort"], 443);
        assert!(value.get("CidrIp").is_none());
    }

    #[test]
    fn test_untagged_kind_serializes_properties_only() {
        let kind = ResourceKind::from(Repository {
            repository_name: "shop/web".to_string(),
        });
        let value = serde_json::to_value(&kind).unwrap();
        assert_eq!(value, serde_json::json!({ "RepositoryName": "shop/web" }));
    }
}
