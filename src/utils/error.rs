use std::time::Duration;
use thiserror::Error;

use crate::core::reconciler::StatusClass;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field '{field}'")]
    MissingConfigError { field: String },

    #[error("Manifest error: {message}")]
    ManifestError { message: String },

    #[error("Service '{service}' has no domain name (expected extension '{key}')")]
    MissingDomainName { service: String, key: String },

    #[error("Resource '{logical_id}' is declared twice in graph '{graph}'")]
    DuplicateResource { graph: String, logical_id: String },

    #[error("'{logical_id}' in graph '{graph}' is not a valid logical id (alphanumerics only)")]
    InvalidLogicalId { graph: String, logical_id: String },

    #[error("Resource '{resource}' in graph '{graph}' references unknown '{target}'")]
    DanglingReference {
        graph: String,
        resource: String,
        target: String,
    },

    #[error("Graph '{graph}' imports '{export}' which no stack exports")]
    UnresolvedImport { graph: String, export: String },

    #[error("[stack: {stack}] failed to query stack: {message}")]
    StackQueryError { stack: String, message: String },

    #[error("[stack: {stack}] failed to {operation} stack: {message}")]
    StackSubmitError {
        stack: String,
        operation: String,
        message: String,
    },

    #[error("[stack: {stack}] stack deployment {} with status {status}", .class.verb())]
    StackFailed {
        stack: String,
        status: String,
        class: StatusClass,
    },

    #[error("[stack: {stack}] gave up waiting for a terminal status after {elapsed:?}")]
    PollTimeout { stack: String, elapsed: Duration },

    #[error("[stack: {stack}] reconciliation cancelled while waiting for a terminal status")]
    Cancelled { stack: String },

    #[error("Registry authentication failed: {message}")]
    RegistryAuthError { message: String },

    #[error("Image error for service '{service}': {message}")]
    ImageError { service: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Manifest,
    Synthesis,
    Reconciliation,
    Image,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DeployError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DeployError::ConfigError { .. }
            | DeployError::ConfigValidationError { .. }
            | DeployError::InvalidConfigValueError { .. }
            | DeployError::MissingConfigError { .. } => ErrorCategory::Configuration,
            DeployError::ManifestError { .. } | DeployError::MissingDomainName { .. } => {
                ErrorCategory::Manifest
            }
            DeployError::DuplicateResource { .. }
            | DeployError::InvalidLogicalId { .. }
            | DeployError::DanglingReference { .. }
            | DeployError::UnresolvedImport { .. }
            | DeployError::SerializationError(_)
            | DeployError::YamlError(_) => ErrorCategory::Synthesis,
            DeployError::StackQueryError { .. }
            | DeployError::StackSubmitError { .. }
            | DeployError::StackFailed { .. }
            | DeployError::PollTimeout { .. }
            | DeployError::Cancelled { .. } => ErrorCategory::Reconciliation,
            DeployError::RegistryAuthError { .. } | DeployError::ImageError { .. } => {
                ErrorCategory::Image
            }
            DeployError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DeployError::Cancelled { .. }
            | DeployError::StackQueryError { .. }
            | DeployError::PollTimeout { .. } => ErrorSeverity::Medium,
            DeployError::DuplicateResource { .. }
            | DeployError::DanglingReference { .. }
            | DeployError::UnresolvedImport { .. }
            | DeployError::SerializationError(_)
            | DeployError::YamlError(_)
            | DeployError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Whether the orchestration driver may rerun the whole operation unchanged.
    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Medium
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            DeployError::ConfigError { .. }
            | DeployError::ConfigValidationError { .. }
            | DeployError::InvalidConfigValueError { .. }
            | DeployError::MissingConfigError { .. } => {
                "Check autodock.toml and the command-line flags".to_string()
            }
            DeployError::ManifestError { .. } => {
                "Check that the compose file exists and is valid YAML".to_string()
            }
            DeployError::InvalidLogicalId { logical_id, .. } => format!(
                "Rename the project or service behind '{}' to use letters and digits only",
                logical_id
            ),
            DeployError::MissingDomainName { service, key } => format!(
                "Add '{}: <domain>' to service '{}' in the compose file",
                key, service
            ),
            DeployError::DuplicateResource { .. }
            | DeployError::DanglingReference { .. }
            | DeployError::UnresolvedImport { .. } => {
                "This is a template generation defect; please report it".to_string()
            }
            DeployError::StackQueryError { .. } => {
                "Check AWS credentials and region, then rerun".to_string()
            }
            DeployError::StackSubmitError { stack, .. } | DeployError::StackFailed { stack, .. } => {
                format!(
                    "Inspect the events of stack '{}' in the CloudFormation console",
                    stack
                )
            }
            DeployError::PollTimeout { .. } => {
                "The stack is still provisioning; rerun once it settles or raise reconcile.timeout_seconds"
                    .to_string()
            }
            DeployError::Cancelled { .. } => {
                "The stack keeps provisioning in AWS; rerun to resume waiting".to_string()
            }
            DeployError::RegistryAuthError { .. } => {
                "Check that your AWS identity may call ecr:GetAuthorizationToken".to_string()
            }
            DeployError::ImageError { .. } => {
                "Check that docker is running and the build context exists".to_string()
            }
            DeployError::IoError(_) => "Check file permissions and paths".to_string(),
            DeployError::SerializationError(_) | DeployError::YamlError(_) => {
                "Check the manifest and configuration for unsupported values".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DeployError::StackFailed { stack, status, .. } => {
                format!("Stack '{}' did not deploy (status {})", stack, status)
            }
            DeployError::MissingDomainName { service, .. } => {
                format!("Service '{}' needs a domain name to be reachable", service)
            }
            DeployError::Cancelled { stack } => {
                format!("Stopped waiting for stack '{}'", stack)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_run_is_not_a_success() {
        let err = DeployError::Cancelled {
            stack: "demo-api".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_stack_failed_message_names_stack_and_status() {
        let err = DeployError::StackFailed {
            stack: "demo-bootstrap".to_string(),
            status: "ROLLBACK_COMPLETE".to_string(),
            class: StatusClass::RolledBack,
        };
        let message = err.to_string();
        assert!(message.contains("demo-bootstrap"));
        assert!(message.contains("rolled back"));
        assert!(message.contains("ROLLBACK_COMPLETE"));
        assert_eq!(err.category(), ErrorCategory::Reconciliation);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_query_errors_are_retryable() {
        let err = DeployError::StackQueryError {
            stack: "demo".to_string(),
            message: "throttled".to_string(),
        };
        assert!(err.is_retryable());

        let err = DeployError::MissingDomainName {
            service: "client".to_string(),
            key: "x-domain-name".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.recovery_suggestion().contains("x-domain-name"));
    }
}
