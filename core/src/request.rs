//! Parsed HTTP request
//!
//! A [`Request`] is produced once per parse call by [`crate::HttpParser`] and
//! is never mutated afterwards. It owns its body bytes; handlers that ask for
//! the raw request borrow it for the duration of the dispatch.

use ahash::AHashMap;
use bytes::Bytes;
use std::str;

use crate::method::{Method, Version};

/// A single `name=value` pair from the `Cookie` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Structured HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    version: Version,
    headers: AHashMap<String, String>,
    cookies: Vec<Cookie>,
    body: Bytes,
}

impl Request {
    /// Create a request with no headers, cookies or body
    pub fn new<P: Into<String>>(
        method: Method,
        path: P,
        query: Option<String>,
        version: Version,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            query,
            version,
            headers: AHashMap::with_capacity(16),
            cookies: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Builder-style header insertion. Used by the parser and by tests that
    /// construct requests directly.
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn insert_header(&mut self, name: String, value: String) {
        self.headers.insert(name, value);
    }

    pub(crate) fn push_cookie(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    pub(crate) fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Request path, without the query string
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string (everything after `?`), if the target had one
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// All headers as received
    #[inline]
    pub fn headers(&self) -> &AHashMap<String, String> {
        &self.headers
    }

    /// Get header value by name.
    ///
    /// Names are stored exactly as they arrived. An exact match is tried first,
    /// then an ASCII case-insensitive scan.
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value.as_str());
        }
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Cookies in arrival order
    #[inline]
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// First cookie with the given name
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Split the raw query into `(key, value)` pairs on `&` and the first `=`.
    ///
    /// Values are not URL-decoded. An entry without `=` yields an error naming
    /// that entry.
    pub fn query_pairs(&self) -> Result<Vec<(&str, &str)>, &str> {
        let Some(query) = self.query.as_deref() else {
            return Ok(Vec::new());
        };
        query
            .split('&')
            .map(|entry| entry.split_once('=').ok_or(entry))
            .collect()
    }

    /// Remaining buffer bytes after the header block
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, if valid UTF-8
    pub fn body_str(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.body)
    }
}
