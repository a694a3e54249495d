use tokio::sync::watch;
use tracing::{error, info, warn};

use super::graph::ResourceGraph;
use super::reconciler::{ReconcileOutcome, StackReconciler};
use super::service::service_stack_name;
use super::synthesis::Synthesizer;
use super::template::{render, TemplateFormat};
use crate::domain::model::Project;
use crate::domain::ports::{ImagePublisher, StackApi, Storage};
use crate::utils::error::{DeployError, Result};

pub const BOOTSTRAP_TEMPLATE_STEM: &str = "bootstrap-template";

/// File name of a service template written by `synth`.
pub fn service_template_file(service: &str, format: TemplateFormat) -> String {
    format!("{}-service-template.{}", service, format.extension())
}

/// Outcome of one service within a deploy run.
#[derive(Debug)]
pub struct ServiceReport {
    pub service: String,
    pub stack: String,
    pub result: Result<ReconcileOutcome>,
}

#[derive(Debug)]
pub struct DeployReport {
    pub bootstrap: ReconcileOutcome,
    pub services: Vec<ServiceReport>,
}

impl DeployReport {
    pub fn failures(&self) -> impl Iterator<Item = &ServiceReport> {
        self.services.iter().filter(|s| s.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

pub struct Deployer<A: StackApi, P: ImagePublisher> {
    synthesizer: Synthesizer,
    reconciler: StackReconciler<A>,
    publisher: P,
    format: TemplateFormat,
    continue_on_service_failure: bool,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<A: StackApi, P: ImagePublisher> Deployer<A, P> {
    pub fn new(synthesizer: Synthesizer, reconciler: StackReconciler<A>, publisher: P) -> Self {
        Self {
            synthesizer,
            reconciler,
            publisher,
            format: TemplateFormat::default(),
            continue_on_service_failure: false,
            shutdown: None,
        }
    }

    pub fn with_format(mut self, format: TemplateFormat) -> Self {
        self.format = format;
        self
    }

    pub fn continue_on_service_failure(mut self, enabled: bool) -> Self {
        self.continue_on_service_failure = enabled;
        self
    }

    /// Aborts any stack wait once `true` is sent on the channel.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn reconciler(&self) -> &StackReconciler<A> {
        &self.reconciler
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Reconciles the shared stack of `project`.
    pub async fn bootstrap(&self, project: &Project) -> Result<ReconcileOutcome> {
        let shared = self.synthesizer.shared(project)?;
        info!("🚀 Bootstrapping {}", shared.name());
        let outcome = self.apply(&shared).await?;
        info!("✅ {} {}", shared.name(), outcome);
        Ok(outcome)
    }

    /// Bootstraps, then publishes and reconciles every deployable service in order.
    pub async fn deploy(&self, project: &Project) -> Result<DeployReport> {
        let shared = self.synthesizer.shared(project)?;
        info!("🚀 Bootstrapping {}", shared.name());
        let bootstrap = self.apply(&shared).await?;
        info!("✅ {} {}", shared.name(), bootstrap);

        let mut services = Vec::new();
        for service in self.synthesizer.profile().deployable(project)? {
            let stack = service_stack_name(&project.name, &service.name);
            if self.is_shutting_down() {
                warn!("Shutdown requested, not deploying {}", stack);
                return Err(DeployError::Cancelled { stack });
            }
            info!("🚀 Deploying service {} to {}", service.name, stack);

            let result = match self.publisher.publish(project, service).await {
                Ok(image_tag) => {
                    info!("📦 Published {}", image_tag);
                    match self.synthesizer.service(project, service, &image_tag, &shared) {
                        Ok(graph) => self.apply(&graph).await,
                        Err(err) => Err(err),
                    }
                }
                Err(err) => Err(err),
            };

            match result {
                Ok(outcome) => {
                    info!("✅ {} {}", stack, outcome);
                    services.push(ServiceReport {
                        service: service.name.clone(),
                        stack,
                        result: Ok(outcome),
                    });
                }
                Err(err @ DeployError::Cancelled { .. }) => return Err(err),
                Err(err) if !self.continue_on_service_failure => return Err(err),
                Err(err) => {
                    error!("❌ {}: {}", stack, err);
                    services.push(ServiceReport {
                        service: service.name.clone(),
                        stack,
                        result: Err(err),
                    });
                }
            }
        }

        Ok(DeployReport { bootstrap, services })
    }

    /// Writes every template through `storage`. See [`write_templates`].
    pub async fn synth<S: Storage>(&self, project: &Project, storage: &S) -> Result<Vec<String>> {
        write_templates(&self.synthesizer, project, storage, self.format).await
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn apply(&self, graph: &ResourceGraph) -> Result<ReconcileOutcome> {
        let body = render(graph, self.format)?;
        let shutdown = self.shutdown.clone();
        let cancel = async move {
            match shutdown {
                Some(mut rx) => {
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        std::future::pending::<()>().await
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        self.reconciler
            .reconcile_until(graph.name(), &body, cancel)
            .await
    }
}

/// Writes the shared template and every service template through `storage`,
/// using manifest image references. Returns the written paths.
pub async fn write_templates<S: Storage>(
    synthesizer: &Synthesizer,
    project: &Project,
    storage: &S,
    format: TemplateFormat,
) -> Result<Vec<String>> {
    let synthesis = synthesizer.synthesize(project)?;
    let mut written = Vec::new();

    let path = format!("{}.{}", BOOTSTRAP_TEMPLATE_STEM, format.extension());
    storage
        .write_file(&path, render(&synthesis.shared, format)?.as_bytes())
        .await?;
    written.push(path);

    let deployable = synthesizer.profile().deployable(project)?;
    for (service, graph) in deployable.iter().zip(&synthesis.services) {
        let path = service_template_file(&service.name, format);
        storage
            .write_file(&path, render(graph, format)?.as_bytes())
            .await?;
        written.push(path);
    }

    info!("📁 Wrote {} templates", written.len());
    Ok(written)
}
