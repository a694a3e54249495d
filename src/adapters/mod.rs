// Adapters layer: concrete implementations of the domain ports for AWS,
// docker and compose files.

pub mod cloudformation;
pub mod compose;
pub mod docker;
pub mod ecr;

pub use cloudformation::CloudFormationStackApi;
pub use compose::ComposeLoader;
pub use docker::DockerCliPublisher;
pub use ecr::EcrRegistry;

/// Loads the shared AWS configuration, overriding the region when given.
pub async fn load_aws_config(region: Option<&str>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    loader.load().await
}
