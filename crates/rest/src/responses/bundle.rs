//! Bundle response building.
//!
//! Search results become `searchset` Bundles with `self`/`next`/`previous`
//! links; version logs become `history` Bundles, newest version first.

use chrono::SecondsFormat;
use serde_json::Value;
use tessera_persistence::{VersionAction, VersionEntry};

/// Bundle types produced by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleType {
    /// Search results bundle.
    Searchset,
    /// History results bundle.
    History,
}

impl BundleType {
    /// Returns the wire code.
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleType::Searchset => "searchset",
            BundleType::History => "history",
        }
    }
}

/// A link in a Bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLink {
    /// The relation type (self, next, previous).
    pub relation: String,
    /// The URL.
    pub url: String,
}

impl BundleLink {
    /// Creates a new link.
    pub fn new(relation: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            url: url.into(),
        }
    }

    /// Creates a self link.
    pub fn self_link(url: impl Into<String>) -> Self {
        Self::new("self", url)
    }

    /// Creates a next link.
    pub fn next(url: impl Into<String>) -> Self {
        Self::new("next", url)
    }

    /// Creates a previous link.
    pub fn previous(url: impl Into<String>) -> Self {
        Self::new("previous", url)
    }

    /// Converts to JSON.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "relation": self.relation,
            "url": self.url
        })
    }
}

/// Request information in a history entry.
#[derive(Debug, Clone)]
pub struct BundleEntryRequest {
    /// HTTP method.
    pub method: String,
    /// Relative URL.
    pub url: String,
}

/// Response information in a history entry.
#[derive(Debug, Clone)]
pub struct BundleEntryResponse {
    /// HTTP status.
    pub status: String,
    /// ETag of the version.
    pub etag: Option<String>,
    /// When the version was recorded.
    pub last_modified: Option<String>,
}

/// An entry in a Bundle.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    /// Full URL of the resource.
    pub full_url: Option<String>,
    /// The resource itself.
    pub resource: Option<Value>,
    /// Whether this entry is a search match.
    pub search_match: bool,
    /// Request information (history).
    pub request: Option<BundleEntryRequest>,
    /// Response information (history).
    pub response: Option<BundleEntryResponse>,
}

impl BundleEntry {
    /// Creates a search result entry.
    pub fn search_result(resource: Value, full_url: Option<String>) -> Self {
        Self {
            full_url,
            resource: Some(resource),
            search_match: true,
            request: None,
            response: None,
        }
    }

    /// Creates a history entry for one version.
    ///
    /// Tombstones carry no resource.
    pub fn from_version(entry: &VersionEntry, base_url: &str) -> Self {
        let (url, status) = match entry.action {
            VersionAction::Create => (entry.resource_type.clone(), "201"),
            VersionAction::Update => (entry.url(), "200"),
            VersionAction::Delete => (entry.url(), "204"),
        };

        Self {
            full_url: Some(format!("{}/{}", base_url.trim_end_matches('/'), entry.url())),
            resource: (!entry.is_deleted()).then(|| entry.snapshot.clone()),
            search_match: false,
            request: Some(BundleEntryRequest {
                method: entry.action.http_method().to_string(),
                url,
            }),
            response: Some(BundleEntryResponse {
                status: status.to_string(),
                etag: Some(entry.etag()),
                last_modified: Some(
                    entry
                        .timestamp
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
            }),
        }
    }

    /// Converts to JSON.
    pub fn to_json(&self) -> Value {
        let mut entry = serde_json::json!({});

        if let Some(url) = &self.full_url {
            entry["fullUrl"] = serde_json::json!(url);
        }

        if let Some(resource) = &self.resource {
            entry["resource"] = resource.clone();
        }

        if self.search_match {
            entry["search"] = serde_json::json!({ "mode": "match" });
        }

        if let Some(request) = &self.request {
            entry["request"] = serde_json::json!({
                "method": request.method,
                "url": request.url
            });
        }

        if let Some(response) = &self.response {
            let mut resp = serde_json::json!({
                "status": response.status
            });
            if let Some(etag) = &response.etag {
                resp["etag"] = serde_json::json!(etag);
            }
            if let Some(last_modified) = &response.last_modified {
                resp["lastModified"] = serde_json::json!(last_modified);
            }
            entry["response"] = resp;
        }

        entry
    }
}

/// Builder for Bundle documents.
#[derive(Debug)]
pub struct BundleBuilder {
    bundle_type: BundleType,
    total: Option<u64>,
    links: Vec<BundleLink>,
    entries: Vec<BundleEntry>,
}

impl BundleBuilder {
    /// Creates a new builder for a specific bundle type.
    pub fn new(bundle_type: BundleType) -> Self {
        Self {
            bundle_type,
            total: None,
            links: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Creates a searchset bundle builder.
    pub fn searchset() -> Self {
        Self::new(BundleType::Searchset)
    }

    /// Creates a history bundle builder.
    pub fn history() -> Self {
        Self::new(BundleType::History)
    }

    /// Sets the total count.
    pub fn total(mut self, count: u64) -> Self {
        self.total = Some(count);
        self
    }

    /// Adds a link.
    pub fn add_link(mut self, link: BundleLink) -> Self {
        self.links.push(link);
        self
    }

    /// Adds a self link.
    pub fn self_link(self, url: impl Into<String>) -> Self {
        self.add_link(BundleLink::self_link(url))
    }

    /// Adds an entry.
    pub fn add_entry(mut self, entry: BundleEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Builds the Bundle document.
    ///
    /// `link` and `entry` are always present, possibly empty.
    pub fn build(self) -> Value {
        let mut bundle = serde_json::json!({
            "resourceType": "Bundle",
            "type": self.bundle_type.as_str()
        });

        if let Some(total) = self.total {
            bundle["total"] = serde_json::json!(total);
        }

        bundle["link"] =
            serde_json::json!(self.links.iter().map(|l| l.to_json()).collect::<Vec<_>>());
        bundle["entry"] =
            serde_json::json!(self.entries.iter().map(|e| e.to_json()).collect::<Vec<_>>());

        bundle
    }
}

/// Paging context of one searchset page.
#[derive(Debug, Clone)]
pub struct SearchLinks<'a> {
    /// URL of the search endpoint, without a query string.
    pub base_url: &'a str,
    /// The request's raw query string, without the leading `?`.
    pub query_string: &'a str,
    /// Page size.
    pub count: usize,
    /// Offset of this page.
    pub offset: usize,
    /// Total number of matches.
    pub total: u64,
}

impl SearchLinks<'_> {
    fn url(&self, query: &str) -> String {
        if query.is_empty() {
            self.base_url.to_string()
        } else {
            format!("{}?{}", self.base_url, query)
        }
    }

    /// Returns the `self`, `next` and `previous` links for this page.
    ///
    /// `next` appears iff `offset + count < total`; `previous` iff
    /// `offset > 0`.
    pub fn links(&self) -> Vec<BundleLink> {
        let query = self.query_string.strip_prefix('?').unwrap_or(self.query_string);
        let mut links = vec![BundleLink::self_link(self.url(query))];

        let next = self.offset.saturating_add(self.count);
        if (next as u64) < self.total {
            links.push(BundleLink::next(self.url(&with_offset(query, next))));
        }

        if self.offset > 0 {
            let previous = self.offset.saturating_sub(self.count);
            links.push(BundleLink::previous(
                self.url(&with_offset(query, previous)),
            ));
        }

        links
    }
}

/// Rewrites the first `_offset` pair of `query` and drops any others,
/// appending one if absent. Every other byte is kept as is.
pub fn with_offset(query: &str, offset: usize) -> String {
    let replacement = format!("_offset={}", offset);
    let mut pairs: Vec<&str> = Vec::new();
    let mut replaced = false;

    if !query.is_empty() {
        for pair in query.split('&') {
            let key = pair.split_once('=').map_or(pair, |(k, _)| k);
            if key == "_offset" {
                if !replaced {
                    pairs.push(&replacement);
                    replaced = true;
                }
            } else {
                pairs.push(pair);
            }
        }
    }

    if !replaced {
        pairs.push(&replacement);
    }
    pairs.join("&")
}

/// Builds a searchset Bundle for one page of results.
///
/// Entries whose resource has an `id` get a `fullUrl` under
/// `links.base_url`.
pub fn search_bundle(resources: Vec<Value>, links: &SearchLinks<'_>) -> Value {
    let mut builder = BundleBuilder::searchset().total(links.total);
    for link in links.links() {
        builder = builder.add_link(link);
    }

    for resource in resources {
        let full_url = resource
            .get("id")
            .and_then(Value::as_str)
            .map(|id| format!("{}/{}", links.base_url.trim_end_matches('/'), id));
        builder = builder.add_entry(BundleEntry::search_result(resource, full_url));
    }

    builder.build()
}

/// Builds a history Bundle, newest version first.
///
/// The self link points at the instance history of the first entry's
/// resource.
pub fn history_bundle(entries: &[VersionEntry], total: u64, base_url: &str) -> Value {
    let base_url = base_url.trim_end_matches('/');
    let mut ordered: Vec<&VersionEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| b.version_id.cmp(&a.version_id));

    let mut builder = BundleBuilder::history().total(total);
    if let Some(first) = ordered.first() {
        builder = builder.self_link(format!("{}/{}/_history", base_url, first.url()));
    }

    for entry in ordered {
        builder = builder.add_entry(BundleEntry::from_version(entry, base_url));
    }

    builder.build()
}
