//! Handler parameter binding
//!
//! Every route carries an ordered list of [`Binding`] descriptors, one per
//! handler parameter. At request time [`bind`] walks that list, pulls each
//! value out of the path captures, the query string or the body, decodes it
//! into the parameter's target type and collects the results into [`Args`].
//! The first failure aborts the whole binding, so a handler is never called
//! with a partial argument list.

use std::any::{type_name, Any};
use std::fmt;

use regex_lite::{Captures, Regex};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::codec::{self, CodecError};
use crate::dispatch::HandlerError;
use crate::request::Request;

/// A decoded argument value, type-erased until the handler takes it
pub type BoundValue = Box<dyn Any + Send>;

type DecodeFn = fn(&[u8]) -> Result<BoundValue, CodecError>;

/// Capture group reference inside a route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Name(String),
    Index(usize),
}

impl fmt::Display for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capture::Name(name) => f.write_str(name),
            Capture::Index(index) => write!(f, "#{}", index),
        }
    }
}

/// Where a parameter's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A capture group of the route pattern applied to the request path
    PathCapture(Capture),
    /// A query pair; `None` means "use the parameter's own name"
    QueryParam(Option<String>),
    /// The whole request body
    Body,
    /// The request itself
    RawRequest,
    /// No source declared; binding always fails
    Unannotated,
}

/// Binding descriptor for one handler parameter
#[derive(Clone)]
pub struct Binding {
    param: String,
    source: Source,
    target: &'static str,
    decode: Option<DecodeFn>,
}

fn decode_scalar_erased<T>(raw: &[u8]) -> Result<BoundValue, CodecError>
where
    T: DeserializeOwned + Send + 'static,
{
    let raw = std::str::from_utf8(raw)?;
    codec::decode_scalar::<T>(raw).map(|v| Box::new(v) as BoundValue)
}

fn decode_body_erased<T>(body: &[u8]) -> Result<BoundValue, CodecError>
where
    T: DeserializeOwned + Send + 'static,
{
    codec::decode_body::<T>(body).map(|v| Box::new(v) as BoundValue)
}

impl Binding {
    fn scalar<T>(param: &str, source: Source) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        Self {
            param: param.to_string(),
            source,
            target: type_name::<T>(),
            decode: Some(decode_scalar_erased::<T>),
        }
    }

    /// Bind a named capture group of the route pattern
    pub fn path<T>(param: &str, group: &str) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        Self::scalar::<T>(param, Source::PathCapture(Capture::Name(group.to_string())))
    }

    /// Bind a numbered capture group of the route pattern
    pub fn path_index<T>(param: &str, index: usize) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        Self::scalar::<T>(param, Source::PathCapture(Capture::Index(index)))
    }

    /// Bind the query value whose key is the parameter name
    pub fn query<T>(param: &str) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        Self::scalar::<T>(param, Source::QueryParam(None))
    }

    /// Bind the query value under an explicit key
    pub fn query_named<T>(param: &str, key: &str) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        Self::scalar::<T>(param, Source::QueryParam(Some(key.to_string())))
    }

    /// Bind the JSON-decoded request body
    pub fn body<T>(param: &str) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        Self {
            param: param.to_string(),
            source: Source::Body,
            target: type_name::<T>(),
            decode: Some(decode_body_erased::<T>),
        }
    }

    /// Bind the request itself
    pub fn request(param: &str) -> Self {
        Self {
            param: param.to_string(),
            source: Source::RawRequest,
            target: type_name::<Request>(),
            decode: None,
        }
    }

    /// A parameter with no declared source
    pub fn unannotated<T: 'static>(param: &str) -> Self {
        Self {
            param: param.to_string(),
            source: Source::Unannotated,
            target: type_name::<T>(),
            decode: None,
        }
    }

    #[inline]
    pub fn param(&self) -> &str {
        &self.param
    }

    #[inline]
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Name of the target type
    #[inline]
    pub fn target(&self) -> &'static str {
        self.target
    }

    fn decode(&self, raw: &[u8]) -> Result<BoundValue, BindingError> {
        let decode = self.decode.ok_or_else(|| BindingError::UnannotatedParameter {
            param: self.param.clone(),
        })?;
        decode(raw).map_err(|source| BindingError::Decode {
            param: self.param.clone(),
            target: self.target,
            source,
        })
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("param", &self.param)
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

/// One bound argument
pub enum Arg<'r> {
    Value(BoundValue),
    Request(&'r Request),
}

/// Bound arguments in declared parameter order
pub struct Args<'r> {
    values: Vec<Option<Arg<'r>>>,
}

impl<'r> Args<'r> {
    pub fn new(values: Vec<Arg<'r>>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Move the decoded value at `index` out as a `T`
    pub fn take<T: 'static>(&mut self, index: usize) -> Result<T, HandlerError> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or(HandlerError::MissingArgument(index))?;
        match slot.take() {
            Some(Arg::Value(value)) => match value.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(value) => {
                    *slot = Some(Arg::Value(value));
                    Err(HandlerError::ArgumentType {
                        index,
                        expected: type_name::<T>(),
                    })
                }
            },
            Some(Arg::Request(request)) => {
                *slot = Some(Arg::Request(request));
                Err(HandlerError::ArgumentType {
                    index,
                    expected: type_name::<T>(),
                })
            }
            None => Err(HandlerError::MissingArgument(index)),
        }
    }

    /// The request bound at `index`
    pub fn request(&self, index: usize) -> Result<&'r Request, HandlerError> {
        match self.values.get(index) {
            Some(Some(Arg::Request(request))) => Ok(*request),
            Some(Some(Arg::Value(_))) => Err(HandlerError::ArgumentType {
                index,
                expected: type_name::<Request>(),
            }),
            _ => Err(HandlerError::MissingArgument(index)),
        }
    }
}

impl fmt::Debug for Args<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args").field("len", &self.values.len()).finish()
    }
}

/// Resolve every binding of a route against `request`
pub fn bind<'r>(
    pattern: &Regex,
    bindings: &[Binding],
    request: &'r Request,
) -> Result<Args<'r>, BindingError> {
    let mut captures: Option<Captures<'r>> = None;
    let mut query: Option<Vec<(&'r str, &'r str)>> = None;
    let mut values = Vec::with_capacity(bindings.len());

    for binding in bindings {
        trace!(param = binding.param(), source = ?binding.source(), "binding parameter");
        let arg = match binding.source() {
            Source::RawRequest => Arg::Request(request),
            Source::Unannotated => {
                return Err(BindingError::UnannotatedParameter {
                    param: binding.param.clone(),
                })
            }
            Source::PathCapture(group) => {
                if captures.is_none() {
                    captures = Some(pattern.captures(request.path()).ok_or_else(|| {
                        BindingError::PathMismatch {
                            param: binding.param.clone(),
                            path: request.path().to_string(),
                        }
                    })?);
                }
                let caps = captures.as_ref().ok_or_else(|| BindingError::PathMismatch {
                    param: binding.param.clone(),
                    path: request.path().to_string(),
                })?;
                let found = match group {
                    Capture::Name(name) => caps.name(name),
                    Capture::Index(index) => caps.get(*index),
                };
                let raw = found.ok_or_else(|| BindingError::MissingCapture {
                    param: binding.param.clone(),
                    group: group.clone(),
                })?;
                Arg::Value(binding.decode(raw.as_str().as_bytes())?)
            }
            Source::QueryParam(key) => {
                let key = key.as_deref().unwrap_or(binding.param());
                if query.is_none() {
                    query = Some(request.query_pairs().map_err(|entry| {
                        BindingError::MalformedQuery {
                            param: binding.param.clone(),
                            entry: entry.to_string(),
                        }
                    })?);
                }
                let value = query
                    .iter()
                    .flatten()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| BindingError::MissingQueryParam {
                        param: binding.param.clone(),
                        key: key.to_string(),
                    })?;
                Arg::Value(binding.decode(value.as_bytes())?)
            }
            Source::Body => Arg::Value(binding.decode(request.body())?),
        };
        values.push(arg);
    }

    debug!(count = values.len(), "parameters bound");
    Ok(Args::new(values))
}

/// Parameter binding failures
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("parameter '{param}' has no binding source")]
    UnannotatedParameter { param: String },
    #[error("parameter '{param}': path '{path}' does not match the route pattern")]
    PathMismatch { param: String, path: String },
    #[error("parameter '{param}': capture group {group} did not participate in the match")]
    MissingCapture { param: String, group: Capture },
    #[error("parameter '{param}': malformed query entry '{entry}'")]
    MalformedQuery { param: String, entry: String },
    #[error("parameter '{param}': query key '{key}' not present")]
    MissingQueryParam { param: String, key: String },
    #[error("parameter '{param}': cannot decode as {target}: {source}")]
    Decode {
        param: String,
        target: &'static str,
        #[source]
        source: CodecError,
    },
}
