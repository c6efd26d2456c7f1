//! Page fetchers: plain HTTP and headless-browser rendering.
//!
//! Both produce a [`FetchedContent`] or a classified [`RequestError`]; retry,
//! circuit breaking and caching are applied by the executor around them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use tokio::task::JoinHandle;

use super::crawl_types::{FetchedContent, RequestError};
use crate::utils::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT};

/// Retrieves the raw payload behind a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, RequestError>;
}

/// Plain HTTP GET fetcher backed by a shared reqwest client
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher with the given user agent and per-request timeout
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, RequestError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(RequestError::status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        debug!("Fetched {url} ({} bytes, {:?})", body.len(), content_type);

        Ok(FetchedContent {
            requested_url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            body,
            rendered: false,
        })
    }
}

/// Renders a page in a browser and returns the resulting HTML
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String>;
}

/// Fetcher that goes through a [`PageRenderer`] for script-heavy pages
pub struct RenderingFetcher {
    renderer: Arc<dyn PageRenderer>,
    timeout: Duration,
}

impl RenderingFetcher {
    #[must_use]
    pub fn new(renderer: Arc<dyn PageRenderer>, timeout: Duration) -> Self {
        Self { renderer, timeout }
    }
}

#[async_trait]
impl Fetcher for RenderingFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, RequestError> {
        let html = match tokio::time::timeout(self.timeout, self.renderer.render(url)).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => return Err(RequestError::from_message(format!("{e:#}"))),
            Err(_) => {
                return Err(RequestError::Timeout(format!(
                    "rendering {url} exceeded {:?}",
                    self.timeout
                )));
            }
        };

        Ok(FetchedContent {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: html.into_bytes(),
            rendered: true,
        })
    }
}

/// Headless Chrome renderer
///
/// The browser event handler runs on a tracked task that is aborted on drop.
pub struct ChromiumRenderer {
    browser: tokio::sync::Mutex<Browser>,
    handler: JoinHandle<()>,
}

impl ChromiumRenderer {
    /// Launch a headless browser
    ///
    /// Uses `executable` when given, otherwise chromiumoxide's own lookup.
    pub async fn launch(executable: Option<PathBuf>, timeout: Duration) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(timeout)
            .window_size(1920, 1080)
            .arg(format!("--user-agent={DEFAULT_USER_AGENT}"))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-sandbox")
            .arg("--no-first-run")
            .arg("--mute-audio");
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        info!("Launching headless browser for rendering");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::error!("Browser handler error: {:?}", e);
                }
            }
            debug!("Browser event handler task completed");
        });

        Ok(Self {
            browser: tokio::sync::Mutex::new(browser),
            handler,
        })
    }

    /// Close the browser process and stop its handler
    pub async fn shutdown(self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.context("Failed to close browser")?;
        browser.wait().await.context("Failed waiting for browser exit")?;
        drop(browser);
        self.handler.abort();
        Ok(())
    }
}

impl Drop for ChromiumRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page(url)
                .await
                .with_context(|| format!("Failed to open page {url}"))?
        };

        page.wait_for_navigation()
            .await
            .with_context(|| format!("Navigation to {url} failed"))?;
        let html = page
            .content()
            .await
            .with_context(|| format!("Failed to read rendered content of {url}"))?;

        if let Err(e) = page.close().await {
            debug!("Failed to close page for {url}: {e}");
        }
        Ok(html)
    }
}

/// HTTP fetcher with the default user agent and timeout
pub fn default_http_fetcher() -> Result<HttpFetcher> {
    HttpFetcher::new(
        DEFAULT_USER_AGENT,
        Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
    )
}
