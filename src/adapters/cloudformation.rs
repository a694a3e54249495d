use async_trait::async_trait;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::Capability;
use aws_sdk_cloudformation::Client as CloudFormationClient;

use crate::domain::ports::{ApiError, ApiResult, StackApi, STACK_CAPABILITIES};

#[derive(Debug, Clone)]
pub struct CloudFormationStackApi {
    client: CloudFormationClient,
}

impl CloudFormationStackApi {
    pub fn new(client: CloudFormationClient) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(CloudFormationClient::new(config))
    }
}

fn capabilities() -> Vec<Capability> {
    STACK_CAPABILITIES.iter().map(|c| Capability::from(*c)).collect()
}

fn api_error<E>(err: E) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    ApiError::new(err.code(), message)
}

#[async_trait]
impl StackApi for CloudFormationStackApi {
    async fn describe_stack(&self, name: &str) -> ApiResult<String> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(name)
            .send()
            .await
            .map_err(api_error)?;

        output
            .stacks()
            .first()
            .and_then(|stack| stack.stack_status())
            .map(|status| status.as_str().to_string())
            .ok_or_else(|| {
                ApiError::new(
                    Some("StackNotFoundException"),
                    format!("Stack with id {} does not exist", name),
                )
            })
    }

    async fn create_stack(&self, name: &str, template_body: &str) -> ApiResult<()> {
        self.client
            .create_stack()
            .stack_name(name)
            .template_body(template_body)
            .set_capabilities(Some(capabilities()))
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn update_stack(&self, name: &str, template_body: &str) -> ApiResult<()> {
        self.client
            .update_stack()
            .stack_name(name)
            .template_body(template_body)
            .set_capabilities(Some(capabilities()))
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }
}
