//! Bounded HTTP/1.x request parser
//!
//! Decodes one fixed-capacity read into a [`Request`]:
//! - request line split on single spaces into method, target and version
//! - `Name: value` header lines up to the blank terminator line
//! - `Cookie` header split into ordered name/value pairs
//! - whatever remains in the buffer becomes the body, uninterpreted
//!
//! There is no streaming and no retry-to-fill. A request whose header block
//! does not fit in the buffer is rejected with [`ParseError::Overflow`].

use std::io::{self, Read};

use bytes::Bytes;
use memchr::{memchr, memchr_iter, memmem};
use tracing::{debug, trace};

use crate::method::{Method, Version};
use crate::request::{Cookie, Request};

/// Default read buffer size (10 KiB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 10 * 1024;
/// Largest read buffer a parser may be configured with (100 KiB)
pub const MAX_BUFFER_CAPACITY: usize = 100 * 1024;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// HTTP request parser with a fixed read capacity
#[derive(Debug, Clone, Copy)]
pub struct HttpParser {
    capacity: usize,
}

impl HttpParser {
    /// Create a parser with the default 10 KiB buffer
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Create a parser with a custom buffer capacity in `1..=MAX_BUFFER_CAPACITY`
    pub fn with_capacity(capacity: usize) -> Result<Self, ParseError> {
        if capacity == 0 || capacity > MAX_BUFFER_CAPACITY {
            return Err(ParseError::InvalidCapacity(capacity));
        }
        Ok(Self { capacity })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Perform a single bounded read from `source` and parse the result
    pub fn parse<R: Read>(&self, source: &mut R) -> Result<Request, ParseError> {
        let mut buf = vec![0u8; self.capacity];
        trace!(capacity = self.capacity, "reading request into buffer");
        let read = source.read(&mut buf)?;
        if read == 0 {
            return Err(ParseError::Empty);
        }
        debug!(read, capacity = self.capacity, "read request bytes");
        buf.truncate(read);
        self.parse_buffer(Bytes::from(buf))
    }

    /// Parse bytes that the caller already read.
    ///
    /// Input longer than the capacity is treated as if only the first
    /// `capacity` bytes had been read.
    pub fn parse_bytes(&self, input: &[u8]) -> Result<Request, ParseError> {
        if input.is_empty() {
            return Err(ParseError::Empty);
        }
        let len = input.len().min(self.capacity);
        self.parse_buffer(Bytes::copy_from_slice(&input[..len]))
    }

    fn parse_buffer(&self, buf: Bytes) -> Result<Request, ParseError> {
        if buf.len() >= self.capacity && memmem::find(&buf, HEADER_TERMINATOR).is_none() {
            debug!(capacity = self.capacity, "buffer filled before header terminator");
            return Err(ParseError::Overflow {
                capacity: self.capacity,
            });
        }
        RequestParser::new(&buf).parse().map(|(mut request, body_offset)| {
            debug!(
                body_offset,
                body_len = buf.len() - body_offset,
                "request parsed"
            );
            request.set_body(buf.slice(body_offset..));
            request
        })
    }
}

impl Default for HttpParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor over one buffered request
struct RequestParser<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> RequestParser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    /// Returns the request (without body) and the offset where the body starts
    fn parse(mut self) -> Result<(Request, usize), ParseError> {
        let mut request = self.parse_request_line()?;
        self.parse_headers(&mut request)?;
        parse_cookies(&mut request)?;
        Ok((request, self.position))
    }

    /// Parse request line: "GET /path?query HTTP/1.1"
    fn parse_request_line(&mut self) -> Result<Request, ParseError> {
        let line = self.read_line();
        let line = simdutf8::basic::from_utf8(line).map_err(|_| ParseError::MalformedRequestLine)?;
        trace!(line, "parsing request line");

        let tokens: Vec<&str> = line.split(' ').collect();
        let [method, target, version] = tokens[..] else {
            return Err(ParseError::MalformedRequestLine);
        };

        let method = Method::from_bytes(method.as_bytes())
            .ok_or_else(|| ParseError::UnknownMethod(method.to_string()))?;

        let (path, query) = match memchr_iter(b'?', target.as_bytes()).count() {
            0 => (target, None),
            1 => target
                .split_once('?')
                .map(|(path, query)| (path, Some(query.to_string())))
                .ok_or(ParseError::MalformedTarget)?,
            _ => return Err(ParseError::MalformedTarget),
        };

        let version = Version::from_bytes(version.as_bytes())
            .ok_or_else(|| ParseError::UnknownVersion(version.to_string()))?;

        debug!(%method, path, ?query, %version, "request line parsed");
        Ok(Request::new(method, path, query, version))
    }

    /// Parse header lines until the terminator
    fn parse_headers(&mut self, request: &mut Request) -> Result<(), ParseError> {
        loop {
            let line = self.read_line();
            // a bare CRLF (or a stub of at most two bytes) ends the header block
            if line.len() <= 2 {
                trace!(position = self.position, "header block ended");
                return Ok(());
            }
            let line = simdutf8::basic::from_utf8(line).map_err(|_| ParseError::MalformedHeader)?;
            let tokens: Vec<&str> = line.split(": ").collect();
            let [name, value] = tokens[..] else {
                return Err(ParseError::MalformedHeader);
            };
            trace!(name, value, "header");
            request.insert_header(name.to_string(), value.to_string());
        }
    }

    /// Read up to the next CRLF, consuming it. Without a CRLF the rest of the
    /// input is the line.
    fn read_line(&mut self) -> &'a [u8] {
        let start = self.position;
        match self.find_line_end() {
            Some(end) => {
                self.position = end + 2;
                &self.input[start..end]
            }
            None => {
                self.position = self.input.len();
                &self.input[start..]
            }
        }
    }

    /// Find the next `\r\n` at or after the cursor
    fn find_line_end(&self) -> Option<usize> {
        let mut search_pos = self.position;
        while search_pos < self.input.len() {
            let cr_pos = search_pos + memchr(b'\r', &self.input[search_pos..])?;
            if self.input.get(cr_pos + 1) == Some(&b'\n') {
                return Some(cr_pos);
            }
            search_pos = cr_pos + 1;
        }
        None
    }
}

/// Split the `Cookie` header into ordered pairs
fn parse_cookies(request: &mut Request) -> Result<(), ParseError> {
    let Some(header) = request.header("Cookie").map(str::to_owned) else {
        trace!("no cookie header");
        return Ok(());
    };
    for entry in header.split("; ") {
        let tokens: Vec<&str> = entry.split('=').collect();
        let [name, value] = tokens[..] else {
            return Err(ParseError::MalformedCookie(entry.to_string()));
        };
        trace!(name, value, "cookie");
        request.push_cookie(Cookie::new(name, value));
    }
    Ok(())
}

/// HTTP parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The read filled the buffer before the header block ended
    #[error("request too large: header block exceeds {capacity} byte buffer")]
    Overflow { capacity: usize },
    /// Nothing was read
    #[error("empty request")]
    Empty,
    /// Request line is not exactly `METHOD SP TARGET SP VERSION`
    #[error("malformed request line")]
    MalformedRequestLine,
    /// Target contains more than one `?`
    #[error("malformed request target")]
    MalformedTarget,
    #[error("unknown HTTP method: {0}")]
    UnknownMethod(String),
    #[error("unknown HTTP version: {0}")]
    UnknownVersion(String),
    /// Header line is not exactly `Name: value`
    #[error("malformed header line")]
    MalformedHeader,
    /// Cookie entry is not exactly `name=value`
    #[error("malformed cookie: {0}")]
    MalformedCookie(String),
    /// Buffer capacity outside `1..=MAX_BUFFER_CAPACITY`
    #[error("invalid buffer capacity: {0}")]
    InvalidCapacity(usize),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ParseError {
    /// Whether this is the hard size cap rather than a shape violation
    #[inline]
    pub fn is_overflow(&self) -> bool {
        matches!(self, ParseError::Overflow { .. })
    }
}
