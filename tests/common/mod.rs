#![allow(dead_code)]

use async_trait::async_trait;
use autodock::core::{Project, ServiceConfig};
use autodock::domain::model::BuildConfig;
use autodock::domain::ports::{ApiError, ApiResult, ImagePublisher, StackApi};
use autodock::DeployError;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

/// In-memory `StackApi` answering from per-stack scripts.
///
/// `describe_stack` pops the next scripted answer; the last answer repeats.
#[derive(Default)]
pub struct ScriptedStackApi {
    describes: Mutex<HashMap<String, VecDeque<ApiResult<String>>>>,
    creates: Mutex<HashMap<String, ApiResult<()>>>,
    updates: Mutex<HashMap<String, ApiResult<()>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedStackApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe(self, stack: &str, answers: Vec<ApiResult<String>>) -> Self {
        self.describes
            .lock()
            .unwrap()
            .insert(stack.to_string(), answers.into());
        self
    }

    pub fn on_create(self, stack: &str, result: ApiResult<()>) -> Self {
        self.creates.lock().unwrap().insert(stack.to_string(), result);
        self
    }

    pub fn on_update(self, stack: &str, result: ApiResult<()>) -> Self {
        self.updates.lock().unwrap().insert(stack.to_string(), result);
        self
    }

    /// Every call as `operation:stack`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(&format!("{}:", operation)))
            .count()
    }

    fn record(&self, operation: &str, stack: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", operation, stack));
    }
}

pub fn not_found(stack: &str) -> ApiResult<String> {
    Err(ApiError::new(
        Some("ValidationError"),
        format!("Stack with id {} does not exist", stack),
    ))
}

pub fn status(value: &str) -> ApiResult<String> {
    Ok(value.to_string())
}

#[async_trait]
impl StackApi for ScriptedStackApi {
    async fn describe_stack(&self, name: &str) -> ApiResult<String> {
        self.record("describe", name);
        let mut describes = self.describes.lock().unwrap();
        match describes.get_mut(name) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap(),
            Some(script) => script.front().cloned().unwrap_or_else(|| not_found(name)),
            None => not_found(name),
        }
    }

    async fn create_stack(&self, name: &str, _template_body: &str) -> ApiResult<()> {
        self.record("create", name);
        self.creates.lock().unwrap().get(name).cloned().unwrap_or(Ok(()))
    }

    async fn update_stack(&self, name: &str, _template_body: &str) -> ApiResult<()> {
        self.record("update", name);
        self.updates.lock().unwrap().get(name).cloned().unwrap_or(Ok(()))
    }
}

/// Publisher returning `registry.example/{image}:test` without running docker.
#[derive(Default)]
pub struct FakePublisher {
    pub failing: Vec<String>,
    published: Mutex<Vec<String>>,
}

impl FakePublisher {
    pub fn failing(services: &[&str]) -> Self {
        Self {
            failing: services.iter().map(|s| s.to_string()).collect(),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImagePublisher for FakePublisher {
    async fn publish(&self, _project: &Project, service: &ServiceConfig) -> autodock::Result<String> {
        if self.failing.contains(&service.name) {
            return Err(DeployError::ImageError {
                service: service.name.clone(),
                message: "build failed".to_string(),
            });
        }
        let tag = format!("registry.example/{}:test", service.image);
        self.published.lock().unwrap().push(tag.clone());
        Ok(tag)
    }
}

pub fn service(name: &str, domain: Option<&str>) -> ServiceConfig {
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

/// Two services on one root domain plus one on another.
pub fn sample_project() -> Project {
    Project {
        name: "shop".to_string(),
        services: vec![
            service("api", Some("api.example.com")),
            service("client", Some("www.example.com")),
            service("docs", Some("docs.example.org")),
        ],
    }
}
