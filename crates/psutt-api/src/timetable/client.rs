//! `TimetableClient` - HTTP transport for timetable pages.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;

use super::api::HtmlFetcher;
use super::error::FetchError;
use super::params::PageQuery;
use super::rate_limiter::RateLimiter;

/// Default base URL of the student portal.
const DEFAULT_BASE_URL: &str = "https://student.psu.ru/pls/stu_cus_et/";

/// Timetable page, relative to the base URL.
const TIMETABLE_PAGE: &str = "stu.timetable";

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Default delay between retries.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Timetable site client.
#[derive(Debug)]
pub struct TimetableClient {
    /// HTTP client (reqwest, gzip enabled).
    http_client: Client,
    /// Absolute URL of the timetable page.
    page_url: Url,
    /// Delay between retries when the server gives no hint.
    retry_delay: Duration,
    /// Rate limiter shared by concurrent fetches.
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Builder for `TimetableClient`.
#[derive(Debug)]
pub struct TimetableClientBuilder {
    base_url: Option<Url>,
    user_agent: Option<String>,
    session_cookie: Option<String>,
    min_interval: Option<Duration>,
    retry_delay: Option<Duration>,
}

impl TimetableClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            base_url: None,
            user_agent: None,
            session_cookie: None,
            min_interval: None,
            retry_delay: None,
        }
    }

    /// Overrides the base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the `Cookie` header of an authenticated session.
    #[must_use]
    pub fn session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    /// Sets the minimum request interval (default: none).
    #[must_use]
    pub const fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }

    /// Sets the delay before retrying a failed request (default: 2s).
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `user_agent` is not set.
    /// - The session cookie is not a valid header value.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<TimetableClient> {
        let user_agent = self.user_agent.context("user_agent is required")?;

        let base_url = if let Some(url) = self.base_url {
            url
        } else {
            Url::parse(DEFAULT_BASE_URL).context("invalid default base URL")?
        };
        let page_url = base_url
            .join(TIMETABLE_PAGE)
            .with_context(|| format!("failed to resolve {TIMETABLE_PAGE} against {base_url}"))?;

        let mut headers = HeaderMap::new();
        if let Some(cookie) = self.session_cookie {
            let value = HeaderValue::from_str(&cookie).context("invalid session cookie")?;
            headers.insert(COOKIE, value);
        }

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .default_headers(headers)
            .gzip(true)
            .build()
            .context("failed to build HTTP client")?;

        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            self.min_interval.unwrap_or(Duration::ZERO),
        )));

        Ok(TimetableClient {
            http_client,
            page_url,
            retry_delay: self.retry_delay.unwrap_or(RETRY_DELAY),
            rate_limiter,
        })
    }
}

/// Outcome of a single failed attempt.
enum Attempt {
    /// Transient failure; try again after `delay`.
    Retry { error: FetchError, delay: Duration },
    /// Permanent failure.
    Fail(FetchError),
}

impl TimetableClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> TimetableClientBuilder {
        TimetableClientBuilder::new()
    }

    /// Sends one GET request for `query`.
    async fn fetch_once(&self, query: PageQuery) -> Result<String, Attempt> {
        self.rate_limiter.lock().await.wait().await;

        let pairs = query.to_query_pairs();
        let mut request = self.http_client.get(self.page_url.clone());
        if !pairs.is_empty() {
            request = request.query(&pairs);
        }

        let response = request.send().await.map_err(|source| Attempt::Retry {
            error: FetchError::Transport { query, source },
            delay: self.retry_delay,
        })?;

        let status = response.status();
        tracing::trace!(%query, %status, headers = ?response.headers(), "Response headers");

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let delay = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map_or(self.retry_delay, Duration::from_secs);
            return Err(Attempt::Retry {
                error: FetchError::Status {
                    query,
                    status: status.as_u16(),
                },
                delay,
            });
        }

        if !status.is_success() {
            return Err(Attempt::Fail(FetchError::Status {
                query,
                status: status.as_u16(),
            }));
        }

        let body = response.text().await.map_err(|source| Attempt::Retry {
            error: FetchError::Transport { query, source },
            delay: self.retry_delay,
        })?;

        tracing::debug!(%query, body_len = body.len(), "Response body received");
        Ok(body)
    }
}

impl HtmlFetcher for TimetableClient {
    /// Fetches a page, retrying network failures and HTTP 429 up to `MAX_RETRIES` times.
    #[instrument(skip(self))]
    async fn fetch(&self, query: PageQuery) -> Result<String, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            match self.fetch_once(query).await {
                Ok(body) => return Ok(body),
                Err(Attempt::Retry { error, delay }) if attempt < MAX_RETRIES => {
                    tracing::warn!(
                        %query,
                        attempt,
                        error = %error,
                        retry_after_secs = delay.as_secs(),
                        "Request failed, will retry"
                    );
                    attempt = attempt.saturating_add(1);
                    tokio::time::sleep(delay).await;
                }
                Err(Attempt::Retry { error, .. } | Attempt::Fail(error)) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn client_for(mock_server: &wiremock::MockServer) -> TimetableClient {
        let base_url = format!("{}/pls/stu_cus_et/", mock_server.uri());
        TimetableClient::builder()
            .base_url(base_url.parse().unwrap())
            .user_agent("test/0.0.0")
            .retry_delay(Duration::from_millis(0))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_user_agent() {
        // Arrange & Act
        let result = TimetableClient::builder().build();

        // Assert
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("user_agent is required")
        );
    }

    #[test]
    fn test_builder_default_page_url() {
        // Arrange & Act
        let client = TimetableClient::builder()
            .user_agent("test/0.0.0")
            .build()
            .unwrap();

        // Assert
        assert_eq!(
            client.page_url.as_str(),
            "https://student.psu.ru/pls/stu_cus_et/stu.timetable"
        );
    }

    #[test]
    fn test_builder_rejects_invalid_cookie() {
        // Arrange & Act
        let result = TimetableClient::builder()
            .user_agent("test/0.0.0")
            .session_cookie("session=a\nb")
            .build();

        // Assert
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_index_page() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let html = include_str!("../../../../fixtures/timetable/index.html");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/pls/stu_cus_et/stu.timetable"))
            .and(wiremock::matchers::query_param_is_missing("p_week"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(html))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let body = client.fetch(PageQuery::Index).await.unwrap();

        // Assert
        assert!(body.contains("weeks-list"));
    }

    #[tokio::test]
    async fn test_fetch_week_page_sends_week_params() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/pls/stu_cus_et/stu.timetable"))
            .and(wiremock::matchers::query_param("p_cons", "n"))
            .and(wiremock::matchers::query_param("p_week", "12"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let body = client.fetch(PageQuery::Week(12)).await.unwrap();

        // Assert
        assert_eq!(body, "<html></html>");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_not_retried() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let err = client.fetch(PageQuery::Week(3)).await.unwrap_err();

        // Assert
        assert!(matches!(
            err,
            FetchError::Status {
                query: PageQuery::Week(3),
                status: 500
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_retries_after_rate_limit() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(429).insert_header("Retry-After", "0"),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let body = client.fetch(PageQuery::Index).await.unwrap();

        // Assert
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_max_retries() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(429))
            .expect(u64::from(MAX_RETRIES) + 1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let err = client.fetch(PageQuery::Index).await.unwrap_err();

        // Assert
        assert!(matches!(err, FetchError::Status { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_user_agent_and_cookie_are_sent() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::header("User-Agent", "psutt/0.1.0"))
            .and(wiremock::matchers::header("Cookie", "session_id=abc"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let base_url = format!("{}/", mock_server.uri());
        let client = TimetableClient::builder()
            .base_url(base_url.parse().unwrap())
            .user_agent("psutt/0.1.0")
            .session_cookie("session_id=abc")
            .build()
            .unwrap();

        // Act & Assert (mock expect(1) verifies both headers)
        client.fetch(PageQuery::Index).await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limiter_enforces_interval() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("ok"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let base_url = format!("{}/", mock_server.uri());
        let client = TimetableClient::builder()
            .base_url(base_url.parse().unwrap())
            .user_agent("test/0.0.0")
            .min_interval(Duration::from_millis(100))
            .build()
            .unwrap();

        // Act
        let start = std::time::Instant::now();
        client.fetch(PageQuery::Week(1)).await.unwrap();
        client.fetch(PageQuery::Week(2)).await.unwrap();
        let elapsed = start.elapsed();

        // Assert: at least 100ms interval between two requests
        assert!(elapsed >= Duration::from_millis(100));
    }
}
