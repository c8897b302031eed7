//! LangSmith implementation of the tracer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::base::{
    config::Config,
    types::{Res, Void},
};

use super::{GenericTracer, TraceRun, Tracer};

// Extra methods on `Tracer` applied by the langsmith implementation.

impl Tracer {
    /// Creates a LangSmith tracer.
    pub fn langsmith(config: &Config) -> Res<Self> {
        let tracer = LangSmithTracer::new(config)?;
        Ok(Self { inner: Arc::new(tracer) })
    }

    /// Creates the configured tracer, if tracing is enabled.
    pub fn from_config(config: &Config) -> Res<Option<Self>> {
        if !config.tracing_enabled {
            return Ok(None);
        }

        Ok(Some(Self::langsmith(config)?))
    }
}

// Specific implementations.

/// LangSmith tracer implementation.
#[derive(Clone)]
pub struct LangSmithTracer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    project: String,
}

impl LangSmithTracer {
    #[instrument(name = "LangSmithTracer::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let api_key = config
            .langsmith_api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow::anyhow!("A LangSmith API key is required for tracing."))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.langsmith_endpoint.trim_end_matches('/').to_string(),
            api_key,
            project: config.langsmith_project.clone(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Void {
        let response = request.header("x-api-key", &self.api_key).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("LangSmith request failed with status {status}: {body}"));
        }

        Ok(())
    }
}

#[async_trait]
impl GenericTracer for LangSmithTracer {
    #[instrument(name = "LangSmithTracer::start_run", skip_all)]
    async fn start_run(&self, run: &TraceRun) -> Void {
        debug!("Recording start of run `{}` ({}).", run.name, run.context.run_id);

        let body = json!({
            "id": run.context.run_id,
            "parent_run_id": run.context.parent_id,
            "name": run.name,
            "run_type": run.run_type,
            "inputs": run.inputs,
            "session_name": self.project,
            "start_time": Utc::now().to_rfc3339(),
            "extra": { "metadata": run.metadata },
        });

        self.send(self.client.post(format!("{}/runs", self.endpoint)).json(&body)).await
    }

    #[instrument(name = "LangSmithTracer::end_run", skip_all)]
    async fn end_run(&self, run_id: Uuid, outputs: &Value) -> Void {
        debug!("Recording end of run {run_id}.");

        let body = json!({
            "outputs": outputs,
            "end_time": Utc::now().to_rfc3339(),
        });

        self.send(self.client.patch(format!("{}/runs/{run_id}", self.endpoint)).json(&body)).await
    }
}

// Tests.
