//! Typed client for the Parcel HTTP API.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid server URL")?;
        // Redirects stay visible: the download command reads Location itself.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("failed to build API URL")
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let response = req.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn whoami(&self) -> Result<WhoamiResponse> {
        let url = self.url("/v1/auth/whoami")?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn create_share(
        &self,
        path: &str,
        req: CreateShareRequest,
    ) -> Result<ShareResponse> {
        let url = self.url(&format!("/v1/shares/{path}"))?;
        self.send_json(self.http.post(url).json(&req)).await
    }

    pub async fn list_shares(&self, path: &str) -> Result<ListSharesResponse> {
        let url = self.url(&format!("/v1/shares/{path}"))?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn upload_url(&self, path: &str) -> Result<UploadUrlResponse> {
        let url = self.url(&format!("/v1/uploads/{path}"))?;
        self.send_json(self.http.post(url)).await
    }

    /// Request a download link without following the redirect.
    pub async fn download_link(&self, path: &str) -> Result<String> {
        let url = self.url(&format!("/download/{path}"))?;
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
                .context("redirect without Location header")?;
            if location.contains("code_challenge") {
                anyhow::bail!("session rejected: server asked for a browser login");
            }
            return Ok(location.to_string());
        }

        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("download refused ({}): {}", status, body)
    }
}

#[derive(Debug, Deserialize)]
pub struct WhoamiResponse {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateShareRequest {
    pub recipient: String,
    pub max_downloads: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShareResponse {
    pub object_path: String,
    pub recipient: String,
    pub max_downloads: i64,
    pub kind: String,
    pub share_url: String,
    pub granted_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ShareInfo {
    pub recipient: String,
    pub max_downloads: Option<i64>,
    pub kind: Option<String>,
    pub granted_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ListSharesResponse {
    pub object_path: String,
    pub shares: Vec<ShareInfo>,
}

#[derive(Debug, Deserialize)]
pub struct UploadUrlResponse {
    pub object_path: String,
    pub url: String,
    pub expires_at: String,
}
