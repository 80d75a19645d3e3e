use serde::Serialize;

use crate::types::response::SearchResult;

/// One address suggestion returned by a lookup.
///
/// A fixed subset of the raw result record, produced fresh per response.
/// Optional fields are `None` when the endpoint omitted them, so consumers
/// can tell "not present" from an empty value. The only identity a result
/// carries is its `place_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    /// Stable identifier of the place
    pub place_id: String,

    /// House number, when the record resolves down to one
    pub street_number: Option<String>,

    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,

    /// Country name
    pub country: String,

    /// The full address as one display string
    pub freeform_address: String,

    /// Municipality (city/town), when known
    pub municipality: Option<String>,
}

impl From<SearchResult> for LookupResult {
    fn from(raw: SearchResult) -> Self {
        Self {
            place_id: raw.id,
            street_number: raw.address.street_number,
            country_code: raw.address.country_code,
            country: raw.address.country,
            freeform_address: raw.address.freeform_address,
            municipality: raw.address.municipality,
        }
    }
}
