//! Handler of address lookup operations.
//!
//! This module defines two structs, [`Client`] and [`ClientBuilder`].
//! `Client` submits lookups and transparently recovers from upstream rate
//! limiting. `ClientBuilder` exposes a finer level of granularity for
//! building a `Client`.
//!
//! For convenience, a free function [`lookup`] is provided for ad-hoc
//! lookups.

use std::sync::Arc;
use std::time::Duration;

use typed_builder::TypedBuilder;
use url::Url;

use crate::ratelimit::RetryQueue;
use crate::search::Searcher;
use crate::{CallOptions, ErrorKind, LookupParams, LookupResult, Result};

/// Default base of the search endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.tomtom.com/search/2";
/// Default delay in seconds between a rate-limit signal and the retry wave, 5
pub const DEFAULT_RETRY_DELAY_SECS: usize = 5;
/// Default user agent, `kaart-<PKG_VERSION>`
pub const DEFAULT_USER_AGENT: &str = concat!("kaart/", env!("CARGO_PKG_VERSION"));

// Constants currently not configurable by the user.
/// A timeout for only the connect phase of a Client
const CONNECT_TIMEOUT: u64 = 10;
/// TCP keepalive
const TCP_KEEPALIVE: u64 = 60;

/// Builder for [`Client`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// API key for the search endpoint.
    ///
    /// Falls back to the `KAART_API_KEY` environment variable when unset.
    /// Building fails if neither yields a non-empty key.
    api_key: Option<String>,

    /// Maximum number of results per lookup.
    ///
    /// Defaults to the endpoint maximum of 100; out-of-range values are
    /// clamped into `1..=100` without error.
    limit: Option<u32>,

    /// Delay between a rate-limit signal and the single retry wave.
    ///
    /// New lookups arriving during the delay window join the wave; they do
    /// not extend it. Must be greater than zero.
    #[builder(default_code = "Duration::from_secs(DEFAULT_RETRY_DELAY_SECS as u64)")]
    retry_delay: Duration,

    /// Response timeout per request.
    ///
    /// Can be overridden per call with [`CallOptions`].
    timeout: Option<Duration>,

    /// Base URL of the search endpoint.
    ///
    /// Only useful to point the client at a test double.
    #[builder(default_code = "String::from(DEFAULT_BASE_URL)")]
    base_url: String,

    /// User-agent used for lookups
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,
}

impl Default for ClientBuilder {
    #[must_use]
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - No non-empty API key is configured, neither explicitly nor via
    ///   `KAART_API_KEY`.
    /// - The retry delay is zero.
    /// - The base URL is invalid.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client(self) -> Result<Client> {
        if self.retry_delay.is_zero() {
            return Err(ErrorKind::ZeroRetryDelay);
        }

        let params = LookupParams::resolve(self.api_key, self.limit)?;
        let base_url = Url::parse(&self.base_url)?;

        let builder = reqwest::ClientBuilder::new()
            .gzip(true)
            .user_agent(self.user_agent)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE));

        let reqwest_client = (match self.timeout {
            Some(t) => builder.timeout(t),
            None => builder,
        })
        .build()
        .map_err(ErrorKind::NetworkRequest)?;

        let searcher = Searcher::new(reqwest_client, base_url, params);

        Ok(Client {
            queue: Arc::new(RetryQueue::new(searcher, self.retry_delay)),
        })
    }
}

/// Submits lookups and recovers from upstream rate limiting.
///
/// Cheap to clone; clones share one rate budget and one retry queue, which
/// is the intended way to submit lookups from multiple tasks. See
/// [`ClientBuilder`] which contains sane defaults for all configuration
/// options.
#[derive(Debug, Clone)]
pub struct Client {
    /// Shared queue/timer state and request executor
    queue: Arc<RetryQueue>,
}

impl Client {
    /// Looks up address suggestions for a free-text query.
    ///
    /// Results arrive in upstream relevance order. If the endpoint reports
    /// rate limiting, the call transparently joins the next retry wave; the
    /// returned future settles once that wave has run.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the request ultimately fails; see
    /// [`ErrorKind`] for the taxonomy. Only rate limiting is ever retried,
    /// and only once.
    pub async fn lookup(&self, query: &str) -> Result<Vec<LookupResult>> {
        self.lookup_with(query, CallOptions::default()).await
    }

    /// Looks up address suggestions with per-call options.
    ///
    /// # Errors
    ///
    /// Same as [`Client::lookup`].
    pub async fn lookup_with(
        &self,
        query: &str,
        options: CallOptions,
    ) -> Result<Vec<LookupResult>> {
        self.queue.submit(query.to_owned(), options).await
    }

    /// Tears the client down: cancels a pending retry wave and rejects
    /// every queued lookup with [`ErrorKind::Disposed`].
    ///
    /// Idempotent. Lookups whose retry wave already started are not
    /// affected; fresh lookups submitted afterwards run normally.
    pub fn dispose(&self) {
        self.queue.dispose();
    }

    /// Number of lookups currently queued for the next retry wave, 0 when
    /// no wave is pending.
    ///
    /// Intended for test harnesses that need to observe queue depth.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.queue.pending()
    }
}

/// A convenience function to look up a single query.
///
/// This provides the simplest lookup utility without having to create a
/// [`Client`]. For more complex scenarios, see documentation of
/// [`ClientBuilder`] instead.
///
/// # Errors
///
/// Returns an `Err` if:
/// - The client cannot be built (see [`ClientBuilder::client`] for failure
///   cases).
/// - The lookup fails (see [`Client::lookup`] for failure cases).
pub async fn lookup(query: &str) -> Result<Vec<LookupResult>> {
    let client = ClientBuilder::builder().build().client()?;
    client.lookup(query).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{Client, ClientBuilder};
    use crate::ErrorKind;
    use crate::test_utils::{result_record, search_body};

    fn client(server: &MockServer) -> Client {
        client_with_delay(server, Duration::from_millis(200))
    }

    fn client_with_delay(server: &MockServer, retry_delay: Duration) -> Client {
        ClientBuilder::builder()
            .api_key(String::from("test-key"))
            .base_url(server.uri())
            .retry_delay(retry_delay)
            .build()
            .client()
            .unwrap()
    }

    /// Polls until the queue holds `expected` requests, so tests do not
    /// depend on submission timing.
    async fn wait_for_pending(client: &Client, expected: usize) {
        for _ in 0..200 {
            if client.pending_requests() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "queue never reached {expected} pending requests (at {})",
            client.pending_requests()
        );
    }

    #[test]
    fn missing_api_key_fails_at_build() {
        let result = ClientBuilder::builder()
            .build()
            .client();
        assert_eq!(result.unwrap_err(), ErrorKind::MissingApiKey);
    }

    #[test]
    fn zero_retry_delay_is_rejected() {
        let result = ClientBuilder::builder()
            .api_key(String::from("test-key"))
            .retry_delay(Duration::ZERO)
            .build()
            .client();
        assert_eq!(result.unwrap_err(), ErrorKind::ZeroRetryDelay);
    }

    #[tokio::test]
    async fn returns_results_in_upstream_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/dam.json"))
            .and(query_param("key", "test-key"))
            .and(query_param("countrySet", "NL"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_json(search_body(&[
                result_record("NL/PAD/p0/3", Some("3"), Some("Amsterdam")),
                result_record("NL/PAD/p0/1", Some("1"), Some("Amsterdam")),
                result_record("NL/STR/p0/2", None, None),
            ])))
            .mount(&server)
            .await;

        let results = client(&server).lookup("dam").await.unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.place_id.as_str()).collect();
        assert_eq!(ids, ["NL/PAD/p0/3", "NL/PAD/p0/1", "NL/STR/p0/2"]);
        // Absent optional fields stay absent instead of turning into ""
        assert_eq!(results[2].street_number, None);
        assert_eq!(results[2].municipality, None);
    }

    #[tokio::test]
    async fn limit_is_clamped_before_it_reaches_the_wire() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_json(search_body(&[])))
            .mount(&server)
            .await;

        let client = ClientBuilder::builder()
            .api_key(String::from("test-key"))
            .base_url(server.uri())
            .limit(250_u32)
            .build()
            .client()
            .unwrap();

        assert!(client.lookup("dam").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_body_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client(&server).lookup("dam").await;

        assert!(matches!(
            result.unwrap_err(),
            ErrorKind::InvalidResponseBody(_)
        ));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_error_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::INTERNAL_SERVER_ERROR))
            .mount(&server)
            .await;

        let result = client(&server).lookup("dam").await;

        assert_eq!(
            result.unwrap_err(),
            ErrorKind::RejectedStatusCode(StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn single_rate_limit_is_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::TOO_MANY_REQUESTS))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_json(search_body(&[
                result_record("NL/PAD/p0/1", Some("1"), Some("Amsterdam")),
            ])))
            .mount(&server)
            .await;

        let results = client(&server).lookup("dam").await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].place_id, "NL/PAD/p0/1");
        // Exactly the failed attempt plus one retry
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sustained_rate_limit_surfaces_after_one_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::TOO_MANY_REQUESTS))
            .mount(&server)
            .await;

        let result = client(&server).lookup("dam").await;

        assert_eq!(result.unwrap_err(), ErrorKind::RateLimited);
        // Never more than the initial attempt and one retry
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lookups_during_the_delay_join_one_wave() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::TOO_MANY_REQUESTS))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        for query in ["a", "b", "c", "d"] {
            Mock::given(method("GET"))
                .and(path(format!("/search/{query}.json")))
                .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_json(search_body(
                    &[result_record(
                        &format!("NL/PAD/p0/{query}"),
                        None,
                        Some("Amsterdam"),
                    )],
                )))
                .mount(&server)
                .await;
        }

        let client = client_with_delay(&server, Duration::from_millis(300));

        // "a" hits the rate limit and opens the delay window
        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.lookup("a").await })
        };
        wait_for_pending(&client, 1).await;

        // The rest arrive during the window and must join the same batch,
        // in submission order, without touching the endpoint yet
        let mut rest = Vec::new();
        for (n, query) in ["b", "c", "d"].into_iter().enumerate() {
            let task_client = client.clone();
            rest.push(tokio::spawn(async move { task_client.lookup(query).await }));
            wait_for_pending(&client, n + 2).await;
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 1);

        // Each caller gets its own independent result
        let first = first.await.unwrap().unwrap();
        assert_eq!(first[0].place_id, "NL/PAD/p0/a");
        for (task, query) in rest.into_iter().zip(["b", "c", "d"]) {
            let results = task.await.unwrap().unwrap();
            assert_eq!(results[0].place_id, format!("NL/PAD/p0/{query}"));
        }

        // One failed attempt plus one four-request wave; queue unset again
        assert_eq!(server.received_requests().await.unwrap().len(), 5);
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn rate_limit_during_the_wave_only_fails_that_caller() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::TOO_MANY_REQUESTS))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/unlucky.json"))
            .respond_with(ResponseTemplate::new(StatusCode::TOO_MANY_REQUESTS))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_json(search_body(&[
                result_record("NL/PAD/p0/1", None, None),
            ])))
            .mount(&server)
            .await;

        let client = client(&server);

        let lucky = {
            let client = client.clone();
            tokio::spawn(async move { client.lookup("lucky").await })
        };
        wait_for_pending(&client, 1).await;
        let unlucky = {
            let client = client.clone();
            tokio::spawn(async move { client.lookup("unlucky").await })
        };

        // The sibling's second 429 is terminal for it and invisible to us
        assert_eq!(lucky.await.unwrap().unwrap()[0].place_id, "NL/PAD/p0/1");
        assert_eq!(unlucky.await.unwrap().unwrap_err(), ErrorKind::RateLimited);
        assert_eq!(client.pending_requests(), 0);
    }

    #[tokio::test]
    async fn dispose_rejects_queued_lookups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::TOO_MANY_REQUESTS))
            .mount(&server)
            .await;

        // Delay long enough that the wave cannot fire during the test
        let client = client_with_delay(&server, Duration::from_secs(60));

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.lookup("a").await })
        };
        wait_for_pending(&client, 1).await;
        let second = {
            let client = client.clone();
            tokio::spawn(async move { client.lookup("b").await })
        };
        wait_for_pending(&client, 2).await;

        client.dispose();

        assert_eq!(first.await.unwrap().unwrap_err(), ErrorKind::Disposed);
        assert_eq!(second.await.unwrap().unwrap_err(), ErrorKind::Disposed);
        assert_eq!(client.pending_requests(), 0);
        // Only the first attempt ever reached the endpoint
        assert_eq!(server.received_requests().await.unwrap().len(), 1);

        // Second dispose is a no-op
        client.dispose();
    }

    #[tokio::test]
    async fn disposed_client_accepts_fresh_lookups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_json(search_body(&[])))
            .mount(&server)
            .await;

        let client = client(&server);
        client.dispose();

        assert!(client.lookup("dam").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn per_call_timeout_reaches_the_transport() {
        let mock_delay = Duration::from_millis(200);
        let call_timeout = Duration::from_millis(20);
        assert!(mock_delay > call_timeout);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(StatusCode::OK)
                    .set_body_json(search_body(&[]))
                    .set_delay(mock_delay),
            )
            .mount(&server)
            .await;

        let result = client(&server)
            .lookup_with("dam", crate::CallOptions::timeout(call_timeout))
            .await;

        match result.unwrap_err() {
            ErrorKind::NetworkRequest(e) => assert!(e.is_timeout()),
            err => panic!("expected a timeout, got {err:?}"),
        }
    }
}
