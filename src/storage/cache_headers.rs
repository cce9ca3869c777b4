use std::collections::BTreeMap;

/// Skip writing a network response to the store
pub const DO_NOT_STORE: &str = "do-not-store";
/// Store network responses that carry GraphQL errors next to their data
pub const STORE_PARTIAL_RESPONSE: &str = "store-partial-responses";
/// Remove every record a cache read touched once the read is served
pub const EVICT_AFTER_READ: &str = "evict-after-read";

/// Request-scoped flags passed to store reads and writes.
///
/// The store only carries them; the fetch orchestrator decides what they
/// mean for a given call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheHeaders {
    headers: BTreeMap<String, String>,
}

impl CacheHeaders {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn builder() -> CacheHeadersBuilder {
        CacheHeadersBuilder::default()
    }

    pub fn has_header(
        &self,
        name: &str,
    ) -> bool {
        self.headers.contains_key(name)
    }

    pub fn header(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Returns a copy holding the headers of both, `other` winning on conflicts
    pub fn merged_with(
        &self,
        other: &CacheHeaders,
    ) -> CacheHeaders {
        let mut headers = self.headers.clone();
        headers.extend(other.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        CacheHeaders { headers }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct CacheHeadersBuilder {
    headers: BTreeMap<String, String>,
}

impl CacheHeadersBuilder {
    pub fn add_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds a flag header with the value `"true"`
    pub fn flag(
        self,
        name: impl Into<String>,
    ) -> Self {
        self.add_header(name, "true")
    }

    pub fn build(self) -> CacheHeaders {
        CacheHeaders { headers: self.headers }
    }
}
