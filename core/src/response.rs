//! Typed handler response
//!
//! Handlers return a [`Response<T>`]. The dispatcher passes it back untouched;
//! turning it into bytes is the job of whoever owns the connection.

use std::collections::HashMap;
use std::fmt;

macro_rules! status_codes {
    ($( $(#[$doc:meta])* ($name:ident, $code:literal, $reason:literal); )+) => {
        impl StatusCode {
            $(
                $(#[$doc])*
                pub const $name: StatusCode = StatusCode($code);
            )+

            /// Reason phrase, or `"Unknown"` for codes outside the table
            pub fn canonical_reason(self) -> &'static str {
                match self.0 {
                    $( $code => $reason, )+
                    _ => "Unknown",
                }
            }
        }
    };
}

/// Numeric HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

status_codes! {
    (OK, 200, "OK");
    (CREATED, 201, "Created");
    (NO_CONTENT, 204, "No Content");
    (NOT_MODIFIED, 304, "Not Modified");
    (BAD_REQUEST, 400, "Bad Request");
    (NOT_FOUND, 404, "Not Found");
    (METHOD_NOT_ALLOWED, 405, "Method Not Allowed");
    /// Header block did not fit in the read buffer
    (PAYLOAD_TOO_LARGE, 413, "Payload Too Large");
    (INTERNAL_SERVER_ERROR, 500, "Internal Server Error");
    /// Connection limit reached
    (SERVICE_UNAVAILABLE, 503, "Service Unavailable");
}

impl StatusCode {
    pub const fn new(code: u16) -> Self {
        StatusCode(code)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    #[inline]
    const fn class(self) -> u16 {
        self.0 / 100
    }

    /// 5xx
    pub const fn is_server_error(self) -> bool {
        self.class() == 5
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        Self::new(code)
    }
}

/// Handler response: status, headers and an optional typed body
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub body: Option<T>,
}

impl<T> Response<T> {
    /// Status only, no body
    pub fn with_status(status: StatusCode) -> Self {
        Self::from_parts(status, None)
    }

    /// Status and body
    pub fn with(status: StatusCode, body: T) -> Self {
        Self::from_parts(status, Some(body))
    }

    fn from_parts(status: StatusCode, body: Option<T>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    /// Create 200 OK response with a body
    pub fn ok(body: T) -> Self {
        Self::with(StatusCode::OK, body)
    }

    /// Create 404 Not Found response with no body
    pub fn not_found() -> Self {
        Self::with_status(StatusCode::NOT_FOUND)
    }

    /// Add or replace a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Body, if any
    pub fn body(&self) -> Option<&T> {
        self.body.as_ref()
    }
}
