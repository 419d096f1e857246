//! GitHub contents API client.
//!
//! `GET  /repos/{owner}/{repo}/contents/{path}` returns the file base64
//! encoded together with its blob `sha`; `PUT` on the same URL commits new
//! content and is rejected with 409 when the supplied `sha` is stale.

use async_trait::async_trait;
use base64::Engine as _;
use configs::{StoreAccess, StoreConfig, StoreLocation};
use reqwest::{header, Client, Method, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{DocumentStore, StoreError, StoredDocument, VersionToken, WriteRequest};

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

#[derive(Clone)]
pub struct GithubStore {
    client: Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    sha: String,
}

#[derive(Debug, Serialize)]
struct UpdateContents<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

impl GithubStore {
    pub fn new(cfg: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(cfg.connect_timeout())
            .timeout(cfg.request_timeout())
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, &cfg.api_base))
    }

    pub fn with_client(client: Client, api_base: &str) -> Self {
        Self { client, api_base: api_base.trim_end_matches('/').to_string() }
    }

    /// `{api_base}/repos/{owner}/{repo}/contents/{path}`, with each segment
    /// percent-encoded.
    pub fn contents_url(&self, location: &StoreLocation) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StoreError::Format(format!("invalid api base {}: {e}", self.api_base)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Format(format!("invalid api base {}", self.api_base)))?;
            segments
                .pop_if_empty()
                .push("repos")
                .extend(location.repo.split('/').filter(|s| !s.is_empty()))
                .push("contents")
                .extend(location.path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, access: &StoreAccess) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&access.token)
            .header(header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

async fn rejected(resp: reqwest::Response) -> StoreError {
    let status = resp.status().as_u16();
    let body = match resp.text().await {
        Ok(text) => text,
        Err(e) => format!("<unreadable response body: {e}>"),
    };
    StoreError::Rejected { status, body }
}

/// Strip the transport encoding of a contents response.
///
/// Base64 payloads are wrapped at 60 columns by GitHub, so whitespace is
/// ignored. A payload that does not decode yields empty bytes, which the
/// document layer treats as an empty document. Encodings other than base64
/// and utf-8 (GitHub reports `none` for files over 1 MB) are an error.
pub fn decode_content(content: &str, encoding: Option<&str>) -> Result<Vec<u8>, StoreError> {
    match encoding.map(str::to_ascii_lowercase).as_deref() {
        None | Some("base64") => {
            let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            match base64::engine::general_purpose::STANDARD.decode(compact.as_bytes()) {
                Ok(bytes) => Ok(bytes),
                Err(e) => {
                    warn!(error = %e, "stored content is not valid base64");
                    Ok(Vec::new())
                }
            }
        }
        Some("utf-8") | Some("utf8") => Ok(content.as_bytes().to_vec()),
        Some(other) => Err(StoreError::Format(format!("unsupported content encoding: {other}"))),
    }
}

pub fn encode_content(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[async_trait]
impl DocumentStore for GithubStore {
    async fn read_document(&self, access: &StoreAccess) -> Result<StoredDocument, StoreError> {
        let url = self.contents_url(&access.location)?;
        let mut req = self.request(Method::GET, url, access);
        if let Some(branch) = access.location.branch.as_deref() {
            req = req.query(&[("ref", branch)]);
        }
        let resp = req.send().await.map_err(|e| StoreError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        let file: ContentsResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Format(format!("unexpected contents response: {e}")))?;
        let content = decode_content(file.content.as_deref().unwrap_or_default(), file.encoding.as_deref())?;
        debug!(sha = %file.sha, bytes = content.len(), "fetched document");
        Ok(StoredDocument { content, version: VersionToken::new(file.sha) })
    }

    async fn write_document(&self, access: &StoreAccess, request: WriteRequest) -> Result<(), StoreError> {
        let url = self.contents_url(&access.location)?;
        let body = UpdateContents {
            message: &request.message,
            content: encode_content(&request.content),
            sha: request.version.as_str(),
            branch: access.location.branch.as_deref(),
        };
        let resp = self
            .request(Method::PUT, url, access)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        debug!(previous_sha = %request.version, "committed document");
        Ok(())
    }
}
