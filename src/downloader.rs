use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::borrow::Cow;
use std::time::Duration;
use url::Url;

/// One fetched HTTP resource: the raw body plus the content type the server
/// declared, if any.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedAsset {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Network seam for the mirror pipeline. `data:` URLs are filtered out by the
/// caller and never reach an implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedAsset>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .use_rustls_tls()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedAsset> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("request failed for {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {status} for {url}");
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read response body from {url}"))?
            .to_vec();

        Ok(FetchedAsset { body, content_type })
    }
}

/// Derive the local filename for a downloaded URL: the last path segment, or
/// `index.html` when the path has none. A name without an extension gets one
/// inferred from the declared content type; unknown types are left bare.
/// Collisions are not handled, a later download with the same derived name
/// overwrites the earlier file.
pub fn derive_filename(url: &Url, content_type: Option<&str>) -> String {
    let mut name = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or_default()
        .to_string();

    if name.is_empty() {
        return "index.html".to_string();
    }

    if !name.contains('.') {
        if let Some(ext) = content_type.and_then(extension_for_content_type) {
            name.push('.');
            name.push_str(ext);
        }
    }

    name
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime: mime::Mime = content_type.parse().ok()?;

    match (mime.type_().as_str(), mime.subtype().as_str()) {
        ("text", "css") => Some("css"),
        (_, "javascript") => Some("js"),
        ("text", "html") => Some("html"),
        ("image", "png") => Some("png"),
        ("image", "jpeg") => Some("jpg"),
        ("image", "gif") => Some("gif"),
        ("image", subtype) if subtype.starts_with("svg") => Some("svg"),
        ("image", "x-icon") | ("image", "vnd.microsoft.icon") => Some("ico"),
        _ => None,
    }
}
