//! Cross-stack export keys.
//!
//! The shared stack exports and the service stacks import values by name.
//! Both sides derive those names from [`ExportKey`] so they cannot drift.

use serde::Serialize;
use std::fmt;

use super::identifier::identifier;

/// A globally unique (per account and region) CloudFormation export name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ExportName(String);

impl ExportName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExportName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every value the shared stack publishes for service stacks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExportKey {
    /// Private subnet, 1-based.
    PrivateSubnet(u8),
    /// Public subnet, 1-based.
    PublicSubnet(u8),
    VpcId,
    ComputeSecurityGroup,
    LoadBalancerSecurityGroup,
    /// Hosted zone of a root domain.
    HostedZone(String),
    /// Certificate of a root domain.
    Certificate(String),
}

impl ExportKey {
    /// Logical id of the output carrying this value in the shared template.
    pub fn output_id(&self) -> String {
        match self {
            ExportKey::PrivateSubnet(n) => format!("PrivateSubnet{}", n),
            ExportKey::PublicSubnet(n) => format!("PublicSubnet{}", n),
            ExportKey::VpcId => "VpcId".to_string(),
            ExportKey::ComputeSecurityGroup => "FargateTaskSecurityGroup".to_string(),
            ExportKey::LoadBalancerSecurityGroup => "AlbSecurityGroup".to_string(),
            ExportKey::HostedZone(root) => format!("{}HostedZone", identifier(root)),
            ExportKey::Certificate(root) => format!("{}Certificate", identifier(root)),
        }
    }

    /// Export name for `project`. Per-domain keys are not project prefixed.
    pub fn export_name(&self, project: &str) -> ExportName {
        match self {
            ExportKey::HostedZone(_) | ExportKey::Certificate(_) => ExportName(self.output_id()),
            _ => ExportName(format!("{}{}", project, self.output_id())),
        }
    }

    /// Keys exported by every shared stack, regardless of domains.
    pub fn network_keys() -> Vec<ExportKey> {
        vec![
            ExportKey::PrivateSubnet(1),
            ExportKey::PrivateSubnet(2),
            ExportKey::ComputeSecurityGroup,
            ExportKey::LoadBalancerSecurityGroup,
            ExportKey::PublicSubnet(1),
            ExportKey::PublicSubnet(2),
            ExportKey::VpcId,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_scoped_export_names() {
        assert_eq!(
            ExportKey::PrivateSubnet(1).export_name("shop").as_str(),
            "shopPrivateSubnet1"
        );
        assert_eq!(
            ExportKey::ComputeSecurityGroup.export_name("shop").as_str(),
            "shopFargateTaskSecurityGroup"
        );
        assert_eq!(ExportKey::VpcId.export_name("shop").as_str(), "shopVpcId");
    }

    #[test]
    fn test_domain_export_names_use_identifier() {
        let zone = ExportKey::HostedZone("ielts-all-in.com".to_string());
        assert_eq!(zone.export_name("shop").as_str(), "IeltsDashAllDashInDotComHostedZone");
        assert_eq!(zone.output_id(), "IeltsDashAllDashInDotComHostedZone");

        let cert = ExportKey::Certificate("example.com".to_string());
        assert_eq!(cert.export_name("other").as_str(), "ExampleDotComCertificate");
    }
}
