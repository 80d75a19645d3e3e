use secrecy::{ExposeSecret, SecretString};

use crate::types::{ErrorKind, Result};

/// Environment variable consulted when no explicit API key is given
pub const API_KEY_ENV: &str = "KAART_API_KEY";

/// Country filter sent with every lookup.
///
/// Not configurable: the service is restricted to Dutch addresses.
pub const COUNTRY_SET: &str = "NL";

/// Maximum number of results the endpoint supports per lookup, 100
pub const MAX_LIMIT: u32 = 100;

/// Resolved parameters sent with every lookup request.
///
/// Immutable once constructed; owned by the client for its lifetime.
/// The `limit` is always clamped into `1..=MAX_LIMIT`, never raw caller
/// input.
#[derive(Debug, Clone)]
pub struct LookupParams {
    /// API key for the search endpoint
    api_key: SecretString,

    /// Maximum number of results per lookup
    limit: u32,
}

impl LookupParams {
    /// Resolves parameters from an explicit key and limit, with the
    /// environment as fallback for the key.
    ///
    /// The environment is an injectable lookup function so that resolution
    /// stays pure. Use [`LookupParams::resolve`] to read the real process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MissingApiKey`] if neither the explicit option
    /// nor the environment yields a non-empty key.
    pub fn resolve_with_env<E>(
        api_key: Option<String>,
        limit: Option<u32>,
        env: E,
    ) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let api_key = api_key
            .filter(|key| !key.is_empty())
            .or_else(|| env(API_KEY_ENV).filter(|key| !key.is_empty()))
            .ok_or(ErrorKind::MissingApiKey)?;

        // Out-of-range limits are clamped silently, not rejected.
        let limit = limit.map_or(MAX_LIMIT, |limit| limit.clamp(1, MAX_LIMIT));

        Ok(Self {
            api_key: SecretString::from(api_key),
            limit,
        })
    }

    /// Resolves parameters against the process environment
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MissingApiKey`] if neither the explicit option
    /// nor `KAART_API_KEY` yields a non-empty key.
    pub fn resolve(api_key: Option<String>, limit: Option<u32>) -> Result<Self> {
        Self::resolve_with_env(api_key, limit, |var| std::env::var(var).ok())
    }

    /// The maximum number of results per lookup
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Query string pairs for a lookup request.
    ///
    /// This is the only place where the API key leaves its [`SecretString`]
    /// wrapper.
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("key", self.api_key.expose_secret().to_owned()),
            ("countrySet", COUNTRY_SET.to_owned()),
            ("limit", self.limit.to_string()),
        ]
    }
}
