//! Handler references and invocation
//!
//! A [`Handler`] is a named, type-erased function built once at registration.
//! It remembers the concrete type it returns so the route table can reject
//! handlers that do not produce a [`Response`] before any request reaches them.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use crate::binding::{Args, BoundValue};
use crate::response::Response;
use crate::router::Route;

type HandlerFn = dyn for<'r> Fn(&mut Args<'r>) -> Result<BoundValue, HandlerError> + Send + Sync;

/// Declared return type of a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnType {
    pub id: TypeId,
    pub name: &'static str,
}

impl ReturnType {
    pub fn of<R: Any>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            name: type_name::<R>(),
        }
    }
}

/// Named handler function
#[derive(Clone)]
pub struct Handler {
    name: String,
    returns: ReturnType,
    func: Arc<HandlerFn>,
}

impl Handler {
    /// Wrap a function taking bound arguments and returning `R`
    pub fn new<R, F>(name: impl Into<String>, func: F) -> Self
    where
        R: Any + Send,
        F: for<'r> Fn(&mut Args<'r>) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            returns: ReturnType::of::<R>(),
            func: Arc::new(move |args: &mut Args<'_>| {
                func(args).map(|value| Box::new(value) as BoundValue)
            }),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn returns(&self) -> ReturnType {
        self.returns
    }

    fn call(&self, args: &mut Args<'_>) -> Result<BoundValue, HandlerError> {
        (self.func)(args)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("returns", &self.returns.name)
            .finish()
    }
}

/// Failure raised inside a handler
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("argument {0} is missing")]
    MissingArgument(usize),
    #[error("argument {index} is not a {expected}")]
    ArgumentType { index: usize, expected: &'static str },
    #[error("{0}")]
    Failed(String),
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn msg<M: fmt::Display>(message: M) -> Self {
        HandlerError::Failed(message.to_string())
    }
}

/// Dispatch failures
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("handler '{handler}' failed: {source}")]
    Handler {
        handler: String,
        #[source]
        source: HandlerError,
    },
    /// The boxed return value is not a `Response<T>`. Registration rejects
    /// such handlers, so this is only reachable by invoking a route against a
    /// table of another response type.
    #[error("handler '{handler}' returned {found}, expected {expected}")]
    UnexpectedReturn {
        handler: String,
        found: &'static str,
        expected: &'static str,
    },
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Call the route's handler with bound arguments.
///
/// Errors and panics from the handler are logged and reported, never
/// swallowed. A successful response is returned untouched.
pub fn invoke<T: 'static>(route: &Route, mut args: Args<'_>) -> Result<Response<T>, DispatchError> {
    let handler = route.handler();
    debug!(handler = handler.name(), path = route.path(), "invoking handler");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.call(&mut args)))
        .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload.as_ref()))));

    match outcome {
        Ok(value) => value
            .downcast::<Response<T>>()
            .map(|response| *response)
            .map_err(|_| DispatchError::UnexpectedReturn {
                handler: handler.name().to_string(),
                found: handler.returns().name,
                expected: type_name::<Response<T>>(),
            }),
        Err(source) => {
            error!(
                controller = route.controller(),
                handler = handler.name(),
                error = %source,
                "handler invocation failed"
            );
            Err(DispatchError::Handler {
                handler: handler.name().to_string(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::router::{HandlerSpec, RouteTable};
    use serde_json::{json, Value};

    fn single_route(handler: Handler) -> RouteTable<Value> {
        let mut builder = RouteTable::<Value>::builder();
        builder
            .register(
                "Test",
                &["/".to_string()],
                None,
                HandlerSpec::new(handler).path("/t").method(Method::GET),
            )
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_invoke_passes_response_through() {
        let table = single_route(Handler::new("ok", |_: &mut Args<'_>| {
            Ok(Response::ok(json!(1)).header("X-Test", "yes"))
        }));
        let route = table.resolve("/t", Method::GET).unwrap();

        let response = invoke::<Value>(route, Args::new(Vec::new())).unwrap();
        assert_eq!(response.body, Some(json!(1)));
        assert_eq!(response.headers.get("X-Test").map(String::as_str), Some("yes"));
    }

    #[test]
    fn test_invoke_wrong_response_type() {
        let table = single_route(Handler::new("ok", |_: &mut Args<'_>| Ok(Response::ok(json!(1)))));
        let route = table.resolve("/t", Method::GET).unwrap();

        let err = invoke::<String>(route, Args::new(Vec::new())).unwrap_err();
        assert!(matches!(err, DispatchError::UnexpectedReturn { .. }));
    }

    #[test]
    fn test_invoke_reports_panic_with_formatted_message() {
        let table = single_route(Handler::new(
            "bad",
            |args: &mut Args<'_>| -> Result<Response<Value>, HandlerError> {
                panic!("broken after {} args", args.len())
            },
        ));
        let route = table.resolve("/t", Method::GET).unwrap();

        let err = invoke::<Value>(route, Args::new(Vec::new())).unwrap_err();
        match err {
            DispatchError::Handler { handler, source: HandlerError::Panicked(message) } => {
                assert_eq!(handler, "bad");
                assert_eq!(message, "broken after 0 args");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_argument_is_a_handler_error() {
        let table = single_route(Handler::new("needs_arg", |args: &mut Args<'_>| {
            let id: u64 = args.take(0)?;
            Ok(Response::ok(json!(id)))
        }));
        let route = table.resolve("/t", Method::GET).unwrap();

        let err = invoke::<Value>(route, Args::new(Vec::new())).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Handler { source: HandlerError::MissingArgument(0), .. }
        ));
    }
}
