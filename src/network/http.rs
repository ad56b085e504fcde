use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::EngineError;

/// REST client rooted at a node's base URL (Esplora, Cosmos LCD, Horizon).
#[derive(Clone, Debug)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Same client pointed at another endpoint
    pub fn with_base_url(&self, base_url: &str) -> Self {
        Self::new(self.client.clone(), base_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, EngineError> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Like [`get_json`](Self::get_json) but a 404 yields `None`.
    pub async fn get_json_opt<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, EngineError> {
        let response = self.client.get(self.url(path)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        Ok(Some(response.json().await?))
    }

    pub async fn get_text(&self, path: &str) -> Result<String, EngineError> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = check_status(response).await?;
        Ok(response.text().await?)
    }

    pub async fn post_text(&self, path: &str, body: String) -> Result<String, EngineError> {
        let response = self.client.post(self.url(path)).body(body).send().await?;
        let response = check_status(response).await?;
        Ok(response.text().await?)
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, EngineError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, EngineError> {
        let response = self.client.post(self.url(path)).form(form).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Non-success responses carry the node's own explanation in the body;
/// it is passed on untouched.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(EngineError::Remote(format!("HTTP {}", status)));
    }
    Err(EngineError::Remote(text.trim().to_string()))
}
