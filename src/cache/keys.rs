use crate::state::IncidentQuery;

/// Namespace shared by every cached listing
pub const LISTING_PREFIX: &str = "incidents:";

/// Placeholder for an absent filter
const ANY: &str = "any";

/// Cache key for a listing: `incidents:<page>:<limit>:<type|any>:<source|any>`
pub fn listing_key(query: &IncidentQuery) -> String {
    let incident_type = query
        .incident_type
        .map(|t| t.to_string())
        .unwrap_or_else(|| ANY.to_string());
    let source = query
        .source
        .map(|s| s.to_string())
        .unwrap_or_else(|| ANY.to_string());

    format!(
        "{}{}:{}:{}:{}",
        LISTING_PREFIX, query.page, query.limit, incident_type, source
    )
}
