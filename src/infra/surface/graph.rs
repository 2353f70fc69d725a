//! HTTP posting surface for a Graph-style page API.
//!
//! Endpoints used:
//!
//! - `POST   {base}/{page}/feed` with `published=false` and `scheduled_publish_time`
//! - `GET    {base}/{page}/scheduled_posts` (follows `paging.next`)
//! - `POST   {base}/{post}` to change message and time
//! - `DELETE {base}/{post}`
//!
//! Status mapping: 429, 5xx, timeouts and connection failures are transient;
//! 404 is `NotFound`; any other non-success status is permanent.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::{PostId, PostUpdate, PostingSurface, SurfaceError, SurfacePost};
use crate::config::ConfigError;

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v18.0";
const MAX_LIST_PAGES: usize = 50;

/// Connection settings for [`GraphSurface`].
#[derive(Debug, Clone)]
pub struct GraphSurfaceConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// Page that owns the posts.
    pub page_id: String,
    /// Page access token.
    pub access_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GraphSurfaceConfig {
    /// Settings for `page_id` against the public API.
    pub fn new(page_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_id: page_id.into(),
            access_token: access_token.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Point at a different API root (tests, proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Load from `GRAPH_PAGE_ID`, `GRAPH_ACCESS_TOKEN` and optionally
    /// `GRAPH_BASE_URL` / `GRAPH_TIMEOUT_SECS`, reading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let var = |name: &str| {
            std::env::var(name).map_err(|_| ConfigError::MissingEnv(name.to_string()))
        };
        let mut cfg = Self::new(var("GRAPH_PAGE_ID")?, var("GRAPH_ACCESS_TOKEN")?);
        if let Ok(base) = std::env::var("GRAPH_BASE_URL") {
            cfg = cfg.with_base_url(base);
        }
        if let Ok(secs) = std::env::var("GRAPH_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("GRAPH_TIMEOUT_SECS: {e}")))?;
            cfg.timeout = Duration::from_secs(secs);
        }
        Ok(cfg)
    }
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PublishTime {
    Unix(i64),
    Text(String),
}

impl PublishTime {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Unix(secs) => DateTime::from_timestamp(*secs, 0),
            Self::Text(raw) => DateTime::parse_from_rfc3339(raw)
                .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScheduledPost {
    id: String,
    #[serde(default)]
    message: String,
    scheduled_publish_time: Option<PublishTime>,
}

#[derive(Debug, Default, Deserialize)]
struct Paging {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScheduledPage {
    #[serde(default)]
    data: Vec<ScheduledPost>,
    #[serde(default)]
    paging: Option<Paging>,
}

/// Posting surface backed by a Graph-style HTTP API.
#[derive(Debug, Clone)]
pub struct GraphSurface {
    client: Client,
    config: GraphSurfaceConfig,
}

impl GraphSurface {
    /// Build a client for `config`.
    pub fn new(config: GraphSurfaceConfig) -> Result<Self, SurfaceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SurfaceError::Permanent(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    async fn check(response: Response) -> Result<Response, SurfaceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

fn classify_status(status: StatusCode, body: &str) -> SurfaceError {
    let detail = format!("{status}: {body}");
    if status == StatusCode::NOT_FOUND {
        SurfaceError::NotFound(detail)
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SurfaceError::Transient(detail)
    } else {
        SurfaceError::Permanent(detail)
    }
}

#[allow(clippy::needless_pass_by_value)]
fn classify_transport(err: reqwest::Error) -> SurfaceError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        SurfaceError::Transient(err.to_string())
    } else {
        SurfaceError::Permanent(err.to_string())
    }
}

#[async_trait]
impl PostingSurface for GraphSurface {
    async fn create(&self, text: &str, time: DateTime<Utc>) -> Result<PostId, SurfaceError> {
        let publish_at = time.timestamp().to_string();
        let response = self
            .client
            .post(self.url(&format!("{}/feed", self.config.page_id)))
            .form(&[
                ("message", text),
                ("published", "false"),
                ("scheduled_publish_time", publish_at.as_str()),
                ("access_token", self.config.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(classify_transport)?;
        let created: CreatedPost = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| SurfaceError::Permanent(format!("malformed create response: {e}")))?;
        tracing::debug!(post_id = %created.id, %time, "graph post scheduled");
        Ok(created.id)
    }

    async fn list(&self) -> Result<Vec<SurfacePost>, SurfaceError> {
        let mut posts = Vec::new();
        let mut request = self
            .client
            .get(self.url(&format!("{}/scheduled_posts", self.config.page_id)))
            .query(&[
                ("fields", "id,message,scheduled_publish_time"),
                ("access_token", self.config.access_token.as_str()),
            ]);

        for _ in 0..MAX_LIST_PAGES {
            let response = request.send().await.map_err(classify_transport)?;
            let page: ScheduledPage = Self::check(response)
                .await?
                .json()
                .await
                .map_err(|e| SurfaceError::Permanent(format!("malformed list response: {e}")))?;

            for post in page.data {
                let Some(time) = post.scheduled_publish_time.as_ref().and_then(PublishTime::to_utc)
                else {
                    tracing::warn!(post_id = %post.id, "scheduled post without a usable time");
                    continue;
                };
                posts.push(SurfacePost {
                    post_id: post.id,
                    text: post.message,
                    time,
                });
            }

            match page.paging.and_then(|p| p.next) {
                Some(next) => request = self.client.get(next),
                None => break,
            }
        }

        posts.sort_by(|a, b| a.time.cmp(&b.time));
        Ok(posts)
    }

    async fn update(&self, post_id: &str, update: &PostUpdate) -> Result<(), SurfaceError> {
        let mut form = vec![
            ("message", update.text.clone()),
            ("access_token", self.config.access_token.clone()),
        ];
        if let Some(time) = update.time {
            form.push(("scheduled_publish_time", time.timestamp().to_string()));
        }
        let response = self
            .client
            .post(self.url(post_id))
            .form(&form)
            .send()
            .await
            .map_err(classify_transport)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, post_id: &str) -> Result<(), SurfaceError> {
        let response = self
            .client
            .delete(self.url(post_id))
            .query(&[("access_token", self.config.access_token.as_str())])
            .send()
            .await
            .map_err(classify_transport)?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, ""),
            SurfaceError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "bad token"),
            SurfaceError::Permanent(msg) if msg.contains("bad token")
        ));
    }

    #[test]
    fn test_publish_time_formats() {
        let unix = PublishTime::Unix(1_780_000_000).to_utc().unwrap();
        assert_eq!(unix.timestamp(), 1_780_000_000);

        let text = PublishTime::Text("2026-06-01T09:00:00+0000".into())
            .to_utc()
            .unwrap();
        assert_eq!(text.to_rfc3339(), "2026-06-01T09:00:00+00:00");
        assert!(PublishTime::Text("soon".into()).to_utc().is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let cfg = GraphSurfaceConfig::new("page", "token").with_base_url("http://localhost:1/");
        assert_eq!(cfg.base_url, "http://localhost:1");
    }
}
