//! Thin `reqwest` wrapper over the control plane's `/v1` route table
//! (spec §6). Every call serializes its body with `serde_json` and maps a
//! non-2xx response to [`CliError::Api`] carrying the response body, so the
//! operator sees the same error the control plane logged.

use crate::error::CliError;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub struct Client {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl Client {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url, token }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, CliError> {
        self.send(self.request(reqwest::Method::GET, path)).await
    }

    pub async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, CliError> {
        self.send(self.request(reqwest::Method::POST, path).json(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> Result<(), CliError> {
        self.send_no_body(self.request(reqwest::Method::POST, path)).await
    }

    pub async fn post_empty_returning<R: DeserializeOwned>(&self, path: &str) -> Result<R, CliError> {
        self.send(self.request(reqwest::Method::POST, path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), CliError> {
        self.send_no_body(self.request(reqwest::Method::DELETE, path)).await
    }

    async fn send<R: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<R, CliError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CliError::Api { status, body });
        }
        Ok(response.json().await?)
    }

    async fn send_no_body(&self, builder: reqwest::RequestBuilder) -> Result<(), CliError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CliError::Api { status, body });
        }
        Ok(())
    }
}
