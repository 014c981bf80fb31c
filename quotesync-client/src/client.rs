//! HTTP implementation of the remote gateway
//! 
//! GET on the snapshot path returns a list of posts, each mapped to a quote
//! under the configured remote category. POST on the publish path accepts one
//! quote as a JSON body. Every request is bounded by the request timeout.

use crate::config::Config;
use crate::error::SyncError;
use crate::gateway::RemoteGateway;
use crate::retry::RetryPolicy;
use crate::types::{QuoteRecord, RemotePost};
use crate::Result;
use async_trait::async_trait;
use reqwest::{ClientBuilder, Response};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Client statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub requests_sent: u64,
    pub requests_failed: u64,
    pub snapshots_fetched: u64,
    pub records_published: u64,
}

/// HTTP gateway to the remote quote feed
#[derive(Debug)]
pub struct Client {
    /// HTTP client with connection pooling and TLS
    http_client: reqwest::Client,
    /// Shared configuration
    config: Arc<Config>,
    /// Retry policy used for publishing
    retry_policy: RetryPolicy,
    requests_sent: AtomicU64,
    requests_failed: AtomicU64,
    snapshots_fetched: AtomicU64,
    records_published: AtomicU64,
}

impl Client {
    /// Create a new client with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        Self::with_shared_config(Arc::new(config))
    }

    /// Create a new client sharing an existing configuration
    pub fn with_shared_config(config: Arc<Config>) -> Result<Self> {
        config.validate()?;
        let http_client = Self::build_http_client(&config)?;

        Ok(Self {
            http_client,
            retry_policy: RetryPolicy::new(config.clone()),
            config,
            requests_sent: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            snapshots_fetched: AtomicU64::new(0),
            records_published: AtomicU64::new(0),
        })
    }

    fn build_http_client(config: &Config) -> Result<reqwest::Client> {
        let mut builder = ClientBuilder::new()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .use_rustls_tls();

        if !config.tls_verify() {
            // Development only
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build().map_err(|e| SyncError::Config {
            field: "http_client".to_string(),
            error: e.to_string(),
        })
    }

    /// Shared configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Snapshot of request counters
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            snapshots_fetched: self.snapshots_fetched.load(Ordering::Relaxed),
            records_published: self.records_published.load(Ordering::Relaxed),
        }
    }

    /// Run a request future under the configured request timeout
    async fn bounded<T, Fut>(&self, operation: &str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let limit = self.config.request_timeout();
        self.requests_sent.fetch_add(1, Ordering::Relaxed);

        let result = match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout {
                duration_ms: limit.as_millis() as u64,
                operation: operation.to_string(),
            }),
        };

        if let Err(e) = &result {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
            warn!("{} failed: {}", operation, e);
        }
        result
    }

    /// Turn a non-success status into [`SyncError::Server`]
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(SyncError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_once(&self) -> Result<Vec<QuoteRecord>> {
        let url = self.config.endpoint(&self.config.snapshot_path);
        let timeout_ms = self.config.request_timeout().as_millis() as u64;

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::from_transport(e, "fetch_snapshot", timeout_ms))?;
        let response = Self::check_status(response).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::from_transport(e, "fetch_snapshot", timeout_ms))?;

        let posts: Vec<RemotePost> =
            serde_json::from_slice(&body).map_err(|e| SyncError::InvalidResponse {
                error: e.to_string(),
            })?;

        let category = self.config.remote_category.as_str();
        Ok(posts.into_iter().map(|post| post.into_record(category)).collect())
    }

    async fn publish_once(&self, record: &QuoteRecord) -> Result<()> {
        let url = self.config.endpoint(&self.config.publish_path);
        let timeout_ms = self.config.request_timeout().as_millis() as u64;

        let response = self
            .http_client
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| SyncError::from_transport(e, "publish", timeout_ms))?;
        Self::check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteGateway for Client {
    #[instrument(skip(self))]
    async fn fetch_snapshot(&self) -> Result<Vec<QuoteRecord>> {
        let records = self.bounded("fetch_snapshot", self.fetch_once()).await?;
        self.snapshots_fetched.fetch_add(1, Ordering::Relaxed);
        debug!("Fetched remote snapshot with {} records", records.len());
        Ok(records)
    }

    #[instrument(skip(self, record), fields(text = %record.text))]
    async fn publish(&self, record: &QuoteRecord) -> Result<()> {
        self.retry_policy
            .execute(|| self.bounded("publish", self.publish_once(record)))
            .await?;
        self.records_published.fetch_add(1, Ordering::Relaxed);
        debug!("Published quote to remote");
        Ok(())
    }
}
