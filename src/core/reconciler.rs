//! Drives a named stack to a terminal status.
//!
//! A reconciliation queries the stack, submits a create or an update, then
//! polls until the reported status settles. An update the API rejects as a
//! no-op is a success without polling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::domain::ports::{ApiError, StackApi};
use crate::utils::error::{DeployError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    InProgress,
    Complete,
    Failed,
    Terminated,
    RolledBack,
}

impl StatusClass {
    pub fn verb(&self) -> &'static str {
        match self {
            StatusClass::InProgress => "is still in progress",
            StatusClass::Complete => "completed",
            StatusClass::Failed => "failed",
            StatusClass::Terminated => "terminated",
            StatusClass::RolledBack => "rolled back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatusClass::InProgress)
    }
}

/// A status string as reported by the API, e.g. `UPDATE_ROLLBACK_COMPLETE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackStatus(String);

impl StackStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Suffix classification. `ROLLBACK_COMPLETE` is checked before
    /// `COMPLETE` since it ends with it.
    pub fn class(&self) -> StatusClass {
        let status = self.0.as_str();
        if status.ends_with("FAILED") {
            StatusClass::Failed
        } else if status.ends_with("TERMINATED") {
            StatusClass::Terminated
        } else if status.ends_with("ROLLBACK_COMPLETE") {
            StatusClass::RolledBack
        } else if status.ends_with("COMPLETE") {
            StatusClass::Complete
        } else {
            StatusClass::InProgress
        }
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackExistence {
    Absent,
    Present(StackStatus),
    /// The existence query failed for a reason other than "not found".
    Unknown(String),
}

/// What to do when existence cannot be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExistencePolicy {
    /// Warn and attempt a create.
    #[default]
    FailOpen,
    /// Return the query error.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created(StackStatus),
    Updated(StackStatus),
    /// The template matched the deployed stack.
    Unchanged,
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::Created(status) => write!(f, "created ({})", status),
            ReconcileOutcome::Updated(status) => write!(f, "updated ({})", status),
            ReconcileOutcome::Unchanged => f.write_str("unchanged"),
        }
    }
}

pub fn is_not_found(error: &ApiError, stack: &str) -> bool {
    let message = error.message.to_lowercase();
    match error.code.as_deref() {
        Some("StackNotFoundException") => true,
        Some("ValidationError") if message.contains("does not exist") => true,
        _ => message.contains(&format!("stack with id {} does not exist", stack.to_lowercase())),
    }
}

pub fn is_no_updates(error: &ApiError) -> bool {
    error
        .message
        .to_lowercase()
        .contains("no updates are to be performed")
}

enum Submitted {
    Created,
    Updated,
}

pub struct StackReconciler<A> {
    api: A,
    poll_interval: Duration,
    timeout: Option<Duration>,
    policy: ExistencePolicy,
}

impl<A: StackApi> StackReconciler<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            policy: ExistencePolicy::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: ExistencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn query_existence(&self, stack: &str) -> StackExistence {
        match self.api.describe_stack(stack).await {
            Ok(status) => StackExistence::Present(StackStatus::new(status)),
            Err(err) if is_not_found(&err, stack) => StackExistence::Absent,
            Err(err) => StackExistence::Unknown(err.to_string()),
        }
    }

    /// Reconciles without a cancellation hook.
    pub async fn reconcile(&self, stack: &str, template_body: &str) -> Result<ReconcileOutcome> {
        self.reconcile_until(stack, template_body, std::future::pending())
            .await
    }

    /// Reconciles `stack`, stopping as soon as `cancel` resolves. A cancel
    /// that is already resolved prevents any submission; submissions already
    /// made are not undone.
    pub async fn reconcile_until<C>(
        &self,
        stack: &str,
        template_body: &str,
        cancel: C,
    ) -> Result<ReconcileOutcome>
    where
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let submitted = tokio::select! {
            biased;
            _ = &mut cancel => {
                warn!("[stack: {}] cancelled before submission", stack);
                return Err(DeployError::Cancelled { stack: stack.to_string() });
            }
            submitted = self.submit(stack, template_body) => submitted?,
        };
        let submitted = match submitted {
            Some(submitted) => submitted,
            None => {
                info!("[stack: {}] no updates to perform", stack);
                return Ok(ReconcileOutcome::Unchanged);
            }
        };

        let status = self.wait(stack, cancel.as_mut()).await?;
        Ok(match submitted {
            Submitted::Created => ReconcileOutcome::Created(status),
            Submitted::Updated => ReconcileOutcome::Updated(status),
        })
    }

    /// Returns `None` for a no-op update.
    async fn submit(&self, stack: &str, template_body: &str) -> Result<Option<Submitted>> {
        let exists = match self.query_existence(stack).await {
            StackExistence::Absent => false,
            StackExistence::Present(status) => {
                debug!("[stack: {}] found with status {}", stack, status);
                true
            }
            StackExistence::Unknown(reason) => match self.policy {
                ExistencePolicy::FailOpen => {
                    warn!(
                        "[stack: {}] could not determine existence ({}), attempting create",
                        stack, reason
                    );
                    false
                }
                ExistencePolicy::Strict => {
                    return Err(DeployError::StackQueryError {
                        stack: stack.to_string(),
                        message: reason,
                    })
                }
            },
        };

        if !exists {
            info!("[stack: {}] creating stack", stack);
            self.api
                .create_stack(stack, template_body)
                .await
                .map_err(|err| submit_error(stack, "create", err))?;
            return Ok(Some(Submitted::Created));
        }

        info!("[stack: {}] updating stack", stack);
        match self.api.update_stack(stack, template_body).await {
            Ok(()) => Ok(Some(Submitted::Updated)),
            Err(err) if is_no_updates(&err) => Ok(None),
            Err(err) => Err(submit_error(stack, "update", err)),
        }
    }

    async fn wait<C>(&self, stack: &str, cancel: C) -> Result<StackStatus>
    where
        C: Future<Output = ()>,
    {
        let started = Instant::now();
        let bounded = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, self.poll(stack)).await {
                    Ok(result) => result,
                    Err(_) => Err(DeployError::PollTimeout {
                        stack: stack.to_string(),
                        elapsed: started.elapsed(),
                    }),
                },
                None => self.poll(stack).await,
            }
        };

        tokio::select! {
            result = bounded => result,
            _ = cancel => {
                warn!("[stack: {}] cancelled after {:?}", stack, started.elapsed());
                Err(DeployError::Cancelled { stack: stack.to_string() })
            }
        }
    }

    async fn poll(&self, stack: &str) -> Result<StackStatus> {
        let mut last: Option<StackStatus> = None;
        loop {
            let status = self
                .api
                .describe_stack(stack)
                .await
                .map(StackStatus::new)
                .map_err(|err| DeployError::StackQueryError {
                    stack: stack.to_string(),
                    message: err.to_string(),
                })?;

            if last.as_ref() != Some(&status) {
                debug!("[stack: {}] status {}", stack, status);
            }

            match status.class() {
                StatusClass::InProgress => {
                    last = Some(status);
                    tokio::time::sleep(self.poll_interval).await;
                }
                StatusClass::Complete => {
                    info!("[stack: {}] reached {}", stack, status);
                    return Ok(status);
                }
                class => {
                    return Err(DeployError::StackFailed {
                        stack: stack.to_string(),
                        status: status.into_string(),
                        class,
                    })
                }
            }
        }
    }
}

fn submit_error(stack: &str, operation: &str, err: ApiError) -> DeployError {
    DeployError::StackSubmitError {
        stack: stack.to_string(),
        operation: operation.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let cases = [
            ("CREATE_IN_PROGRESS", StatusClass::InProgress),
            ("UPDATE_COMPLETE_CLEANUP_IN_PROGRESS", StatusClass::InProgress),
            ("CREATE_COMPLETE", StatusClass::Complete),
            ("UPDATE_COMPLETE", StatusClass::Complete),
            ("CREATE_FAILED", StatusClass::Failed),
            ("UPDATE_ROLLBACK_FAILED", StatusClass::Failed),
            ("ROLLBACK_COMPLETE", StatusClass::RolledBack),
            ("UPDATE_ROLLBACK_COMPLETE", StatusClass::RolledBack),
            ("IMPORT_TERMINATED", StatusClass::Terminated),
        ];
        for (status, class) in cases {
            assert_eq!(StackStatus::new(status).class(), class, "{}", status);
        }
        assert!(!StatusClass::InProgress.is_terminal());
        assert!(StatusClass::RolledBack.is_terminal());
    }

    #[test]
    fn test_not_found_matching() {
        let by_message = ApiError::new(None, "Stack with id Shop-Bootstrap does not exist");
        assert!(is_not_found(&by_message, "shop-bootstrap"));

        let by_code = ApiError::new(
            Some("ValidationError"),
            "Stack with id shop-api does not exist",
        );
        assert!(is_not_found(&by_code, "shop-api"));
        assert!(is_not_found(
            &ApiError::new(Some("StackNotFoundException"), "gone"),
            "x"
        ));

        let throttled = ApiError::new(Some("Throttling"), "Rate exceeded");
        assert!(!is_not_found(&throttled, "shop-api"));
        let other_stack = ApiError::new(None, "Stack with id other does not exist");
        assert!(!is_not_found(&other_stack, "shop-api"));
    }

    #[test]
    fn test_no_updates_matching() {
        assert!(is_no_updates(&ApiError::new(
            Some("ValidationError"),
            "No updates are to be performed."
        )));
        assert!(!is_no_updates(&ApiError::new(
            Some("ValidationError"),
            "Template format error"
        )));
    }

    #[test]
    fn test_existence_policy_from_config_value() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: ExistencePolicy,
        }
        let parsed: Wrapper = toml::from_str(r#"policy = "strict""#).unwrap();
        assert_eq!(parsed.policy, ExistencePolicy::Strict);
        assert_eq!(ExistencePolicy::default(), ExistencePolicy::FailOpen);
    }
}
