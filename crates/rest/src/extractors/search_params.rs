//! Search parameters extractor.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

/// Axum extractor for the search parameter bag.
///
/// Keeps every `name=value` pair in request order, repeated names
/// included, plus the raw query string used to build Bundle links.
///
/// # Example
///
/// ```rust,ignore
/// use tessera_rest::extractors::SearchParams;
///
/// async fn search_handler(params: SearchParams) {
///     for (name, value) in params.iter() {
///         println!("{} = {}", name, value);
///     }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pairs: Vec<(String, String)>,
    raw: String,
}

impl SearchParams {
    /// Parses a raw (percent-encoded) query string.
    pub fn from_query(query: &str) -> Self {
        let raw = query.strip_prefix('?').unwrap_or(query).to_string();
        let pairs = url::form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect();
        Self { pairs, raw }
    }

    /// Iterates over decoded pairs in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the last value given for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the query string exactly as received, without `?`.
    pub fn raw_query(&self) -> &str {
        &self.raw
    }

    /// Returns the number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true when the query carries no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<S> FromRequestParts<S> for SearchParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SearchParams::from_query(parts.uri.query().unwrap_or("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_and_encoded() {
        let params = SearchParams::from_query("?date=ge2024-01-01&date=lt2024-02-01&name=O%27Brien+Jr");
        let pairs: Vec<(&str, &str)> = params.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("date", "ge2024-01-01"),
                ("date", "lt2024-02-01"),
                ("name", "O'Brien Jr"),
            ]
        );
        assert_eq!(params.get("date"), Some("lt2024-02-01"));
        assert_eq!(
            params.raw_query(),
            "date=ge2024-01-01&date=lt2024-02-01&name=O%27Brien+Jr"
        );
    }

    #[test]
    fn test_empty() {
        let params = SearchParams::from_query("");
        assert!(params.is_empty());
        assert_eq!(params.len(), 0);
        assert_eq!(params.get("x"), None);
    }
}
