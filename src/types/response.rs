//! Wire shape of a search response.
//!
//! Deserializing into these types is the validation step: a body that does
//! not match fails with [`ErrorKind::InvalidResponseBody`] and is never
//! retried. Only the fields this crate consumes are modeled; unknown fields
//! are ignored.
//!
//! [`ErrorKind::InvalidResponseBody`]: crate::ErrorKind::InvalidResponseBody

use serde::Deserialize;

/// A full search response: a summary block plus the result records
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResponse {
    pub(crate) summary: Summary,
    pub(crate) results: Vec<SearchResult>,
}

/// Result-set metadata reported by the endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Summary {
    pub(crate) num_results: u32,
}

/// One raw result record. Records are heterogeneous, discriminated by
/// `type`; all of them carry the `address` group this crate consumes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResult {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) id: String,
    pub(crate) address: Address,
}

/// The address group of a result record
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Address {
    pub(crate) street_number: Option<String>,
    pub(crate) country_code: String,
    pub(crate) country: String,
    pub(crate) freeform_address: String,
    pub(crate) municipality: Option<String>,
}
