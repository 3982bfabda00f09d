use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::dispatcher::TaskStarter;
use crate::error::DispatchError;

/// Task starter that talks to an HTTP task runner.
#[derive(Clone)]
pub struct HttpTaskStarter {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTaskStarter {
    /// Creates a new starter bound to the provided base URL.
    pub fn new(base_url: &str) -> Result<Self, DispatchError> {
        let mut url = Url::parse(base_url).map_err(|err| DispatchError::InvalidUrl {
            url: base_url.to_string(),
            source: err,
        })?;

        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_string();
            path.push('/');
            url.set_path(&path);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct StartTaskRequest<'a> {
    client_id: &'a str,
    task_name: &'a str,
    arguments: &'a IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StartTaskResponse {
    task_id: Uuid,
}

#[async_trait]
impl TaskStarter for HttpTaskStarter {
    async fn start_task(
        &self,
        client_id: &str,
        task_name: &str,
        arguments: &IndexMap<String, String>,
    ) -> Result<Uuid, DispatchError> {
        let url = self
            .base_url
            .join("tasks")
            .map_err(|err| DispatchError::InvalidUrl {
                url: format!("{}tasks", self.base_url),
                source: err,
            })?;

        let response = self
            .http
            .post(url)
            .json(&StartTaskRequest {
                client_id,
                task_name,
                arguments,
            })
            .send()
            .await
            .map_err(|err| DispatchError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(DispatchError::UnexpectedStatus {
                status: response.status(),
            });
        }

        let payload: StartTaskResponse = response
            .json()
            .await
            .map_err(|err| DispatchError::Decode(err.to_string()))?;

        Ok(payload.task_id)
    }
}
