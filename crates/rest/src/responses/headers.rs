//! Version header generation.
//!
//! Builds the `ETag`, `Last-Modified` and `Location` values returned with a
//! single resource version.

use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderValue, header};
use tessera_persistence::VersionEntry;

/// Formats a timestamp as an RFC 7231 HTTP-date.
pub fn http_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Response headers describing one resource version.
///
/// - ETag `W/"<vid>"` (weak validator)
/// - Last-Modified as an HTTP-date
/// - Location `<base>/<type>/<id>/_history/<vid>`, when requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionHeaders {
    version_id: u64,
    etag: String,
    last_modified: String,
    location: Option<String>,
}

impl VersionHeaders {
    /// Creates headers for a version recorded at `last_modified`.
    pub fn new(version_id: u64, last_modified: DateTime<Utc>) -> Self {
        Self {
            version_id,
            etag: format!("W/\"{}\"", version_id),
            last_modified: http_date(&last_modified),
            location: None,
        }
    }

    /// Creates headers from a version log entry.
    pub fn from_entry(entry: &VersionEntry) -> Self {
        Self::new(entry.version_id, entry.timestamp)
    }

    /// Sets the Location to the versioned URL of this resource.
    pub fn with_location(mut self, base_url: &str, resource_type: &str, id: &str) -> Self {
        self.location = Some(format!(
            "{}/{}/{}/_history/{}",
            base_url.trim_end_matches('/'),
            resource_type,
            id,
            self.version_id
        ));
        self
    }

    /// Returns the ETag value.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Returns the Last-Modified value.
    pub fn last_modified(&self) -> &str {
        &self.last_modified
    }

    /// Returns the Location value.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Converts to an HTTP header map.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.etag) {
            headers.insert(header::ETAG, value);
        }

        if let Ok(value) = HeaderValue::from_str(&self.last_modified) {
            headers.insert(header::LAST_MODIFIED, value);
        }

        if let Some(location) = &self.location {
            if let Ok(value) = HeaderValue::from_str(location) {
                headers.insert(header::LOCATION, value);
            }
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
    }

    #[test]
    fn test_etag_and_last_modified() {
        let headers = VersionHeaders::new(3, timestamp());
        assert_eq!(headers.etag(), "W/\"3\"");
        assert_eq!(headers.last_modified(), "Tue, 05 Mar 2024 14:07:09 GMT");
        assert!(headers.location().is_none());
    }

    #[test]
    fn test_location() {
        let headers =
            VersionHeaders::new(2, timestamp()).with_location("http://example.org/", "Account", "a1");
        assert_eq!(
            headers.location(),
            Some("http://example.org/Account/a1/_history/2")
        );
    }

    #[test]
    fn test_to_header_map() {
        let map = VersionHeaders::new(1, timestamp())
            .with_location("http://example.org", "Account", "a1")
            .to_header_map();

        assert_eq!(map.get(header::ETAG).unwrap(), "W/\"1\"");
        assert!(map.contains_key(header::LAST_MODIFIED));
        assert!(map.contains_key(header::LOCATION));
        assert!(!map.contains_key(header::CONTENT_TYPE));
    }
}
