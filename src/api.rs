//! Client for the console's REST backend.

use crate::consts::{DEFAULT_TAIL_BYTES, LOG_FILES, MAX_TAIL_BYTES};
use crate::preview::{PreviewInput, PreviewSource};
use crate::types::{
    Activity, DirFileItem, OffloadForm, Organisation, Project, ProjectCreate, Researcher,
};
use async_trait::async_trait;
use eyre::{Result, WrapErr, eyre};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes to ask for in a log tail: the default when unset or zero, capped at the server limit.
pub fn tail_bytes(requested: Option<u64>) -> u64 {
    match requested {
        None | Some(0) => DEFAULT_TAIL_BYTES,
        Some(n) => n.min(MAX_TAIL_BYTES),
    }
}

fn check_log(log: &str) -> Result<()> {
    if !LOG_FILES.contains(&log) {
        eyre::bail!("unknown log `{log}`; expected one of {LOG_FILES:?}");
    }
    Ok(())
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("phenomate-console/", env!("CARGO_PKG_VERSION")))
            .build()
            .wrap_err("building HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send, and turn any non-2xx status into an error carrying the response body.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.wrap_err("request failed")?;
        let status = response.status();
        tracing::debug!(url = %response.url(), %status, "response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(eyre!("request failed: {status} {}", body.trim()))
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        response.json().await.wrap_err("decoding response")
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.get_json(self.client.get(self.url("/api/project/"))).await
    }

    pub async fn get_project(&self, project_id: i64) -> Result<Project> {
        self.get_json(self.client.get(self.url(&format!("/api/project/{project_id}"))))
            .await
    }

    pub async fn create_project(&self, body: &ProjectCreate) -> Result<Project> {
        self.get_json(self.client.post(self.url("/api/project/")).json(body))
            .await
    }

    pub async fn delete_project(&self, project_id: i64) -> Result<()> {
        self.send(self.client.delete(self.url(&format!("/api/project/{project_id}"))))
            .await?;
        Ok(())
    }

    pub async fn delete_projects(&self, project_ids: &[i64]) -> Result<()> {
        self.send(self.client.delete(self.url("/api/project/")).json(project_ids))
            .await?;
        Ok(())
    }

    pub async fn list_researchers(&self) -> Result<Vec<Researcher>> {
        self.get_json(self.client.get(self.url("/api/project/researchers")))
            .await
    }

    pub async fn list_organisations(&self) -> Result<Vec<Organisation>> {
        self.get_json(self.client.get(self.url("/api/project/organisations")))
            .await
    }

    pub async fn list_activities(&self, project_id: i64) -> Result<Vec<Activity>> {
        self.get_json(self.client.get(self.url(&format!("/api/activity/{project_id}"))))
            .await
    }

    /// Re-queue a failed or queued job.
    pub async fn restart_activity(&self, activity_id: i64) -> Result<()> {
        self.send(self.client.post(self.url(&format!("/api/activity/{activity_id}"))))
            .await?;
        Ok(())
    }

    pub async fn cancel_activity(&self, activity_id: i64) -> Result<()> {
        self.send(
            self.client
                .delete(self.url(&format!("/api/activity/activity/{activity_id}"))),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_activities(&self, activity_ids: &[i64]) -> Result<()> {
        self.send(self.client.delete(self.url("/api/activity/")).json(activity_ids))
            .await?;
        Ok(())
    }

    pub async fn delete_project_activities(&self, project_id: i64) -> Result<()> {
        self.send(
            self.client
                .delete(self.url(&format!("/api/activity/project/{project_id}"))),
        )
        .await?;
        Ok(())
    }

    pub async fn offload(&self, project_id: i64, form: &OffloadForm) -> Result<()> {
        if form.src_files.is_empty() {
            eyre::bail!("nothing selected to offload");
        }
        tracing::info!(
            project_id,
            files = form.src_files.len(),
            site = %form.site,
            "submitting offload"
        );
        self.send(
            self.client
                .post(self.url(&format!("/api/project/{project_id}/offload")))
                .form(&form.form_pairs()),
        )
        .await?;
        Ok(())
    }

    /// Children of `src` on the backend host.
    pub async fn list_dir(&self, src: &str, dir_only: bool) -> Result<Vec<DirFileItem>> {
        let dir_only = if dir_only { "true" } else { "false" };
        self.get_json(
            self.client
                .get(self.url("/api/urls/"))
                .query(&[("src", src), ("dirOnly", dir_only)]),
        )
        .await
    }

    /// The whole of a server log, as far as the backend is willing to send.
    pub async fn download_log(&self, log: &str) -> Result<String> {
        check_log(log)?;
        let response = self
            .send(
                self.client
                    .get(self.url("/api/logs/download"))
                    .query(&[("log", log)]),
            )
            .await?;
        response.text().await.wrap_err("reading log")
    }

    /// The last bytes of a server log.
    pub async fn tail_log(&self, log: &str, bytes: Option<u64>) -> Result<String> {
        check_log(log)?;
        let bytes = tail_bytes(bytes).to_string();
        tracing::debug!(log, %bytes, "tailing log");
        let response = self
            .send(
                self.client
                    .get(self.url("/api/logs/tail"))
                    .query(&[("log", log), ("bytes", bytes.as_str())]),
            )
            .await?;
        response.text().await.wrap_err("reading log")
    }

    /// Raw preview text, `"<path> | Exists: <flag>"`.
    pub async fn project_preview(&self, input: &PreviewInput) -> Result<String> {
        let response = self
            .send(self.client.post(self.url("/api/project/preview/")).json(input))
            .await?;
        let text = response.text().await.wrap_err("reading preview")?;
        // the endpoint may answer with a JSON string or plain text
        Ok(serde_json::from_str::<String>(&text).unwrap_or(text))
    }
}

#[async_trait]
impl PreviewSource for ApiClient {
    async fn preview(&self, input: &PreviewInput) -> Result<String> {
        self.project_preview(input).await
    }
}
