use serde_json::{Value, json};

/// Builds a documented-shape search response body with the given records
pub(crate) fn search_body(results: &[Value]) -> Value {
    json!({
        "summary": { "numResults": results.len() },
        "results": results,
    })
}

/// Builds one raw result record the way the endpoint reports it.
///
/// `street_number` and `municipality` are omitted entirely when `None`,
/// matching upstream behavior of leaving absent fields out instead of
/// sending empty strings.
pub(crate) fn result_record(
    id: &str,
    street_number: Option<&str>,
    municipality: Option<&str>,
) -> Value {
    let mut address = json!({
        "countryCode": "NL",
        "country": "Netherlands",
        "freeformAddress": "Prins Hendrikkade 33, 1012 TM Amsterdam",
    });
    if let Some(number) = street_number {
        address["streetNumber"] = json!(number);
    }
    if let Some(municipality) = municipality {
        address["municipality"] = json!(municipality);
    }

    json!({
        "type": "Point Address",
        "id": id,
        "score": 9.5,
        "address": address,
    })
}
