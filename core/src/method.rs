//! HTTP method and protocol version enumerations

use std::fmt;

/// Request methods accepted on the wire.
///
/// Anything else in the method position of a request line is rejected by the
/// parser, so routes can only ever be registered for these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Method {
    GET = 0,
    POST = 1,
    HEAD = 2,
    PUT = 3,
    DELETE = 4,
    TRACE = 5,
    CONNECT = 6,
}

impl Method {
    /// Every supported method, in declaration order.
    pub const ALL: [Method; 7] = [
        Method::GET,
        Method::POST,
        Method::HEAD,
        Method::PUT,
        Method::DELETE,
        Method::TRACE,
        Method::CONNECT,
    ];

    /// Parse a method token, ignoring ASCII case
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().as_bytes().eq_ignore_ascii_case(bytes))
    }

    /// Get method as static string slice (zero allocation)
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::HEAD => "HEAD",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::TRACE => "TRACE",
            Method::CONNECT => "CONNECT",
        }
    }
}

impl fmt::Display for Method {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::from_bytes(s.as_bytes()).ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

impl TryFrom<&http::Method> for Method {
    type Error = UnsupportedMethod;

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        match *method {
            http::Method::GET => Ok(Method::GET),
            http::Method::POST => Ok(Method::POST),
            http::Method::HEAD => Ok(Method::HEAD),
            http::Method::PUT => Ok(Method::PUT),
            http::Method::DELETE => Ok(Method::DELETE),
            http::Method::TRACE => Ok(Method::TRACE),
            http::Method::CONNECT => Ok(Method::CONNECT),
            _ => Err(UnsupportedMethod(method.to_string())),
        }
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::HEAD => http::Method::HEAD,
            Method::PUT => http::Method::PUT,
            Method::DELETE => http::Method::DELETE,
            Method::TRACE => http::Method::TRACE,
            Method::CONNECT => http::Method::CONNECT,
        }
    }
}

/// A method name outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnsupportedMethod(pub String);

/// Protocol versions accepted on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    /// Parse a version token, ignoring ASCII case
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.eq_ignore_ascii_case(b"HTTP/1.0") {
            Some(Version::Http10)
        } else if bytes.eq_ignore_ascii_case(b"HTTP/1.1") {
            Some(Version::Http11)
        } else {
            None
        }
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!(Method::from_bytes(b"GET"), Some(Method::GET));
        assert_eq!(Method::from_bytes(b"post"), Some(Method::POST));
        assert_eq!(Method::from_bytes(b"Connect"), Some(Method::CONNECT));
        assert_eq!(Method::from_bytes(b"PATCH"), None);
        assert_eq!(Method::from_bytes(b"INVALID"), None);
        assert_eq!(Method::from_bytes(b""), None);
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("delete".parse::<Method>(), Ok(Method::DELETE));
        assert_eq!(
            "OPTIONS".parse::<Method>(),
            Err(UnsupportedMethod("OPTIONS".to_string()))
        );
    }

    #[test]
    fn test_method_string() {
        assert_eq!(Method::GET.as_str(), "GET");
        assert_eq!(Method::TRACE.to_string(), "TRACE");
    }

    #[test]
    fn test_http_interop() {
        assert_eq!(Method::try_from(&http::Method::PUT), Ok(Method::PUT));
        assert!(Method::try_from(&http::Method::PATCH).is_err());
        assert_eq!(http::Method::from(Method::DELETE), http::Method::DELETE);
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!(Version::from_bytes(b"HTTP/1.1"), Some(Version::Http11));
        assert_eq!(Version::from_bytes(b"http/1.0"), Some(Version::Http10));
        assert_eq!(Version::from_bytes(b"HTTP/2"), None);
        assert_eq!(Version::Http11.to_string(), "HTTP/1.1");
    }
}
