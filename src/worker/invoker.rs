use std::time::Duration;

use async_trait::async_trait;

use crate::config::ServiceSpec;
use crate::error::{Result, SchedulerError};

/// One network call to a backend service, bounded by a deadline.
///
/// No retry policy: one call, one outcome, per dispatch attempt. The
/// deadline bounds only the wait for the response; the backend is not told
/// to stop if the deadline expires.
#[async_trait]
pub trait BackendInvoker: Send + Sync {
    async fn invoke(
        &self,
        spec: &ServiceSpec,
        payload: &serde_json::Value,
        deadline: Duration,
    ) -> Result<serde_json::Value>;

    /// Whether the service's health endpoint currently answers.
    async fn probe_health(&self, spec: &ServiceSpec) -> bool;
}

/// HTTP invoker: POSTs the job payload as JSON to the service endpoint.
pub struct HttpInvoker {
    client: reqwest::Client,
    health_probe_timeout: Duration,
}

impl HttpInvoker {
    pub fn new(health_probe_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            health_probe_timeout,
        }
    }
}

#[async_trait]
impl BackendInvoker for HttpInvoker {
    async fn invoke(
        &self,
        spec: &ServiceSpec,
        payload: &serde_json::Value,
        deadline: Duration,
    ) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&spec.endpoint)
            .timeout(deadline)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SchedulerError::Timeout
                } else if e.is_connect() {
                    SchedulerError::ServiceUnavailable(e.to_string())
                } else {
                    SchedulerError::Invocation(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(SchedulerError::ServiceUnavailable(format!(
                "{} returned {}",
                spec.endpoint, status
            )));
        }
        if !status.is_success() {
            return Err(SchedulerError::Invocation(format!(
                "{} returned {}",
                spec.endpoint, status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SchedulerError::Invocation(format!("invalid response body: {e}")))
    }

    async fn probe_health(&self, spec: &ServiceSpec) -> bool {
        let url = format!("{}/health", spec.endpoint.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .timeout(self.health_probe_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(url, error = %e, "Health probe failed");
                false
            }
        }
    }
}
