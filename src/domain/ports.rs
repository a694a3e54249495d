use crate::domain::model::{Project, ServiceConfig};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Where synthesized templates are written.
pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// An error reported by the infrastructure API, reduced to what the
/// reconciler classifies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Service error code such as `ValidationError`, when the API sent one.
    pub code: Option<String>,
    pub message: String,
}

impl ApiError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Capabilities acknowledged on every submission; the templates declare IAM roles.
pub const STACK_CAPABILITIES: [&str; 2] = ["CAPABILITY_IAM", "CAPABILITY_NAMED_IAM"];

/// The declarative-infrastructure API, treated as "submit template, ask for status".
#[async_trait]
pub trait StackApi: Send + Sync {
    /// Current status string of the stack, e.g. `CREATE_IN_PROGRESS`.
    async fn describe_stack(&self, name: &str) -> ApiResult<String>;
    async fn create_stack(&self, name: &str, template_body: &str) -> ApiResult<()>;
    async fn update_stack(&self, name: &str, template_body: &str) -> ApiResult<()>;
}

/// Builds and pushes a service image, returning the fully qualified tag.
#[async_trait]
pub trait ImagePublisher: Send + Sync {
    async fn publish(&self, project: &Project, service: &ServiceConfig) -> Result<String>;
}
