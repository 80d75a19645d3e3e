//! Request executor: builds and issues one lookup call against the search
//! endpoint and classifies its outcome.

use http::StatusCode;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use url::Url;

use crate::types::response::SearchResponse;
use crate::{CallOptions, ErrorKind, LookupParams, LookupResult, Result};

/// Characters escaped when the free-text query is embedded as a path
/// segment. `/`, `%` and `?` must not survive unescaped or they would
/// change the path structure.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Issues single lookup requests.
///
/// Holds everything a request needs: the shared HTTP client, the endpoint
/// base and the resolved [`LookupParams`]. Carries no retry logic; rate
/// limiting surfaces as [`ErrorKind::RateLimited`] for the queue to handle.
#[derive(Debug)]
pub(crate) struct Searcher {
    /// HTTP request client
    client: reqwest::Client,

    /// Base of the search endpoint, e.g. `https://api.tomtom.com/search/2`
    base_url: Url,

    /// Resolved request parameters
    params: LookupParams,
}

impl Searcher {
    pub(crate) const fn new(client: reqwest::Client, base_url: Url, params: LookupParams) -> Self {
        Self {
            client,
            base_url,
            params,
        }
    }

    /// Builds the endpoint URL for a free-text query:
    /// `<base>/search/<percent-encoded query>.json`
    fn endpoint(&self, query: &str) -> Result<Url> {
        let segment = utf8_percent_encode(query, PATH_SEGMENT);
        let url = format!(
            "{base}/search/{segment}.json",
            base = self.base_url.as_str().trim_end_matches('/')
        );
        Ok(Url::parse(&url)?)
    }

    /// Issues one GET against the search endpoint.
    ///
    /// Outcomes:
    /// - 2xx: the body is deserialized into the documented response shape;
    ///   a mismatch is [`ErrorKind::InvalidResponseBody`]. Results are
    ///   returned in upstream order, which reflects relevance ranking.
    /// - 429: [`ErrorKind::RateLimited`], a payload-free control signal.
    /// - any other status: [`ErrorKind::RejectedStatusCode`].
    /// - transport failure: [`ErrorKind::NetworkRequest`], original fault
    ///   preserved.
    pub(crate) async fn search(
        &self,
        query: &str,
        options: &CallOptions,
    ) -> Result<Vec<LookupResult>> {
        let url = self.endpoint(query)?;

        let mut request = self.client.get(url).query(&self.params.query_pairs());
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(ErrorKind::NetworkRequest)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ErrorKind::RateLimited);
        }
        if !status.is_success() {
            return Err(ErrorKind::RejectedStatusCode(status));
        }

        let body = response.text().await.map_err(ErrorKind::ReadResponseBody)?;
        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(ErrorKind::InvalidResponseBody)?;

        log::debug!(
            "lookup {query:?} returned {} of {} results",
            parsed.results.len(),
            parsed.summary.num_results
        );

        Ok(parsed.results.into_iter().map(LookupResult::from).collect())
    }
}
