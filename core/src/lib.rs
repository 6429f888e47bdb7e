//! # TernCore
//!
//! HTTP request ingestion, route resolution and dispatch.
//!
//! ## Pipeline
//! - [`HttpParser`] turns one bounded buffer into a [`Request`]
//! - [`RouteTable::resolve`] finds the route: exact path first, then patterns
//!   in registration order, filtered by method
//! - [`binding::bind`] pulls handler arguments from path captures, the query
//!   string or the JSON body
//! - [`dispatch::invoke`] calls the handler and returns its [`Response`]
//!
//! ## Example
//! ```rust
//! use serde_json::{json, Value};
//! use tern_core::{Args, Binding, Handler, HandlerSpec, HttpParser, Method, Response, RouteTable};
//!
//! let get_user = Handler::new("get_user", |args: &mut Args<'_>| {
//!     let id: u64 = args.take(0)?;
//!     Ok(Response::ok(json!({ "id": id })))
//! });
//!
//! let mut builder = RouteTable::<Value>::builder();
//! builder
//!     .register(
//!         "Users",
//!         &["/".to_string()],
//!         None,
//!         HandlerSpec::new(get_user)
//!             .path(r"/users/(?P<id>\d+)")
//!             .method(Method::GET)
//!             .bind(Binding::path::<u64>("id", "id")),
//!     )
//!     .unwrap();
//! let table = builder.build();
//!
//! let request = HttpParser::new()
//!     .parse_bytes(b"GET /users/42 HTTP/1.1\r\nHost: localhost\r\n\r\n")
//!     .unwrap();
//! let response = table.handle(&request).unwrap().unwrap();
//! assert_eq!(response.body, Some(json!({ "id": 42 })));
//! ```

pub mod binding;
pub mod codec;
pub mod dispatch;
pub mod http;
pub mod method;
pub mod request;
pub mod response;
pub mod router;

pub use binding::{Args, Binding, BindingError, Capture, Source};
pub use codec::CodecError;
pub use dispatch::{DispatchError, Handler, HandlerError};
pub use http::{HttpParser, ParseError, DEFAULT_BUFFER_CAPACITY, MAX_BUFFER_CAPACITY};
pub use method::{Method, UnsupportedMethod, Version};
pub use request::{Cookie, Request};
pub use response::{Response, StatusCode};
pub use router::{
    ControllerSpec, HandlerSpec, Route, RouteRegistrationError, RouteTable, RouteTableBuilder,
};

/// Request-time failures
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("binding error: {0}")]
    Binding(#[from] BindingError),
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

impl Error {
    /// Status code a server should answer with
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Parse(ParseError::Overflow { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Parse(ParseError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Parse(_) => StatusCode::BAD_REQUEST,
            Error::Binding(_) => StatusCode::BAD_REQUEST,
            Error::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn table() -> RouteTable<Value> {
        let echo = Handler::new("echo", |args: &mut Args<'_>| {
            let name: String = args.take(0)?;
            Ok(Response::ok(json!({ "name": name })))
        });
        let boom = Handler::new("boom", |_: &mut Args<'_>| {
            Err::<Response<Value>, _>(HandlerError::msg("storage offline"))
        });
        let panics = Handler::new(
            "panics",
            |_: &mut Args<'_>| -> Result<Response<Value>, HandlerError> { panic!("handler bug") },
        );

        let mut builder = RouteTable::<Value>::builder();
        let controller = ControllerSpec::new("Test")
            .handler(
                HandlerSpec::new(echo)
                    .path("/echo")
                    .method(Method::GET)
                    .bind(Binding::query::<String>("name")),
            )
            .handler(HandlerSpec::new(boom).path("/boom").method(Method::GET))
            .handler(HandlerSpec::new(panics).path("/panic").method(Method::GET));
        builder.register_controller(controller).unwrap();
        builder.build()
    }

    fn handle(table: &RouteTable<Value>, raw: &[u8]) -> Result<Option<Response<Value>>, Error> {
        let request = HttpParser::new().parse_bytes(raw)?;
        table.handle(&request)
    }

    #[test]
    fn test_pipeline_success() {
        let table = table();
        let response = handle(&table, b"GET /echo?name=tern HTTP/1.1\r\n\r\n").unwrap().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Some(json!({ "name": "tern" })));
    }

    #[test]
    fn test_resolution_miss_is_not_an_error() {
        let table = table();
        assert!(handle(&table, b"GET /missing HTTP/1.1\r\n\r\n").unwrap().is_none());
        assert!(handle(&table, b"POST /echo HTTP/1.1\r\n\r\n").unwrap().is_none());
    }

    #[test]
    fn test_error_status_mapping() {
        let table = table();

        let err = handle(&table, b"GET /echo HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::Binding(BindingError::MissingQueryParam { .. })));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = handle(&table, b"GET /boom HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::Dispatch(DispatchError::Handler { .. })));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = handle(&table, b"FETCH /echo HTTP/1.1\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let parser = HttpParser::with_capacity(16).unwrap();
        let err = Error::from(parser.parse_bytes(b"GET /a-very-long-path HTTP/1.1").unwrap_err());
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_handler_panic_is_reported() {
        let table = table();
        let err = handle(&table, b"GET /panic HTTP/1.1\r\n\r\n").unwrap_err();
        match err {
            Error::Dispatch(DispatchError::Handler { handler, source }) => {
                assert_eq!(handler, "panics");
                assert!(matches!(source, HandlerError::Panicked(ref m) if m == "handler bug"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
