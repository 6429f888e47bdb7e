//! Route table: registration and resolution
//!
//! Routes are registered once through [`RouteTableBuilder`] and frozen into a
//! [`RouteTable`]. Each composed path is a regular expression anchored to the
//! whole request path; the literal path string is also used as an exact key.
//!
//! Resolution runs in two phases:
//! 1. exact phase: the request path is looked up as a literal key
//! 2. pattern phase: every path entry is tried in registration order
//!
//! Within a path entry the first route whose method set contains the request
//! method wins.

use std::any::{type_name, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use ahash::AHashMap;
use regex_lite::Regex;
use tracing::{debug, error, info, trace};

use crate::binding::{self, Binding};
use crate::dispatch::{self, Handler};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::Error;

/// A registered (path pattern, methods, handler, bindings) tuple
#[derive(Debug, Clone)]
pub struct Route {
    path: String,
    pattern: Arc<Regex>,
    methods: Vec<Method>,
    controller: String,
    handler: Handler,
    bindings: Vec<Binding>,
}

impl Route {
    /// Composed path pattern as registered
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Compiled pattern, anchored to the whole path
    #[inline]
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    #[inline]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    #[inline]
    pub fn allows(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    #[inline]
    pub fn controller(&self) -> &str {
        &self.controller
    }

    #[inline]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    #[inline]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}

/// All routes sharing one composed path
#[derive(Debug, Clone)]
struct PathEntry {
    path: String,
    pattern: Arc<Regex>,
    routes: Vec<Route>,
}

impl PathEntry {
    fn find(&self, method: Method) -> Option<&Route> {
        self.routes.iter().find(|route| route.allows(method))
    }
}

/// Handler-level registration data
#[derive(Debug, Clone)]
pub struct HandlerSpec {
    pub suffixes: Vec<String>,
    pub methods: Vec<Method>,
    pub bindings: Vec<Binding>,
    pub handler: Handler,
}

impl HandlerSpec {
    pub fn new(handler: Handler) -> Self {
        Self {
            suffixes: Vec::new(),
            methods: Vec::new(),
            bindings: Vec::new(),
            handler,
        }
    }

    /// Add a path suffix
    pub fn path(mut self, suffix: impl Into<String>) -> Self {
        self.suffixes.push(suffix.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    pub fn methods(mut self, methods: &[Method]) -> Self {
        self.methods.extend_from_slice(methods);
        self
    }

    /// Append the binding for the next handler parameter
    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }
}

/// Controller-level registration data
#[derive(Debug, Clone)]
pub struct ControllerSpec {
    pub name: String,
    pub prefixes: Vec<String>,
    pub method_filter: Option<Vec<Method>>,
    pub handlers: Vec<HandlerSpec>,
}

impl ControllerSpec {
    /// A controller mounted at `/`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefixes: vec!["/".to_string()],
            method_filter: None,
            handlers: Vec::new(),
        }
    }

    /// Replace the path prefixes
    pub fn prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict every handler to these methods
    pub fn method_filter(mut self, methods: &[Method]) -> Self {
        self.method_filter = Some(methods.to_vec());
        self
    }

    pub fn handler(mut self, handler: HandlerSpec) -> Self {
        self.handlers.push(handler);
        self
    }
}

/// Collects routes, then freezes them into a [`RouteTable`]
pub struct RouteTableBuilder<T> {
    entries: Vec<PathEntry>,
    index: AHashMap<String, usize>,
    _response: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> RouteTableBuilder<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: AHashMap::new(),
            _response: PhantomData,
        }
    }

    /// Register every handler of a controller. Either every route of the
    /// controller is added or none is.
    pub fn register_controller(
        &mut self,
        controller: ControllerSpec,
    ) -> Result<usize, RouteRegistrationError> {
        let ControllerSpec {
            name,
            prefixes,
            method_filter,
            handlers,
        } = controller;

        let mut staged = Vec::new();
        for handler in &handlers {
            let routes = self.stage(&name, &prefixes, method_filter.as_deref(), handler, &staged)?;
            staged.extend(routes);
        }

        let added = staged.len();
        self.commit(staged);
        info!(controller = %name, routes = added, "controller registered");
        Ok(added)
    }

    /// Register one handler under every non-blank prefix and suffix
    /// combination. Returns the number of routes added; on error nothing is
    /// added.
    pub fn register(
        &mut self,
        controller: &str,
        prefixes: &[String],
        method_filter: Option<&[Method]>,
        decl: HandlerSpec,
    ) -> Result<usize, RouteRegistrationError> {
        let staged = self.stage(controller, prefixes, method_filter, &decl, &[])?;
        let added = staged.len();
        self.commit(staged);
        Ok(added)
    }

    /// Compose and validate the routes of one handler without touching the
    /// table. `pending` holds routes staged earlier in the same batch.
    fn stage(
        &self,
        controller: &str,
        prefixes: &[String],
        method_filter: Option<&[Method]>,
        decl: &HandlerSpec,
        pending: &[Route],
    ) -> Result<Vec<Route>, RouteRegistrationError> {
        let handler = decl.handler.name();
        let returns = decl.handler.returns();
        if returns.id != TypeId::of::<Response<T>>() {
            error!(
                controller,
                handler,
                found = returns.name,
                "handler does not return a response"
            );
            return Err(RouteRegistrationError::InvalidReturnType {
                handler: handler.to_string(),
                found: returns.name,
                expected: type_name::<Response<T>>(),
            });
        }

        let mut staged: Vec<Route> = Vec::new();
        for prefix in prefixes.iter().filter(|p| !p.trim().is_empty()) {
            // a bare "/" prefix contributes nothing
            let base = if prefix == "/" { "" } else { prefix.as_str() };

            for suffix in decl.suffixes.iter().filter(|s| !s.trim().is_empty()) {
                let methods = effective_methods(&decl.methods, method_filter);
                if methods.is_empty() {
                    error!(controller, handler, "no methods to route");
                    return Err(RouteRegistrationError::EmptyMethodSet {
                        handler: handler.to_string(),
                    });
                }

                let path = format!("{}{}", base, suffix);
                let registered: &[Route] = match self.index.get(&path) {
                    Some(&slot) => self.entries[slot].routes.as_slice(),
                    None => &[],
                };
                let same_path: Vec<&Route> = registered
                    .iter()
                    .chain(pending)
                    .chain(&staged)
                    .filter(|route| route.path == path)
                    .collect();

                if let Some((existing, method)) = same_path.iter().find_map(|route| {
                    methods
                        .iter()
                        .find(|m| route.allows(**m))
                        .map(|m| (route.handler.name(), *m))
                }) {
                    error!(path = %path, %method, existing, new = handler, "duplicate route");
                    return Err(RouteRegistrationError::DuplicateRoute {
                        path,
                        method,
                        existing: existing.to_string(),
                        new: handler.to_string(),
                    });
                }

                let pattern = match same_path.first() {
                    Some(route) => Arc::clone(&route.pattern),
                    None => Arc::new(compile(&path)?),
                };
                staged.push(Route {
                    path,
                    pattern,
                    methods,
                    controller: controller.to_string(),
                    handler: decl.handler.clone(),
                    bindings: decl.bindings.clone(),
                });
            }
        }
        Ok(staged)
    }

    fn commit(&mut self, routes: Vec<Route>) {
        for route in routes {
            trace!(
                path = %route.path,
                methods = ?route.methods,
                handler = route.handler.name(),
                "route added"
            );
            let slot = match self.index.get(&route.path) {
                Some(&slot) => slot,
                None => {
                    self.entries.push(PathEntry {
                        path: route.path.clone(),
                        pattern: Arc::clone(&route.pattern),
                        routes: Vec::new(),
                    });
                    self.index.insert(route.path.clone(), self.entries.len() - 1);
                    self.entries.len() - 1
                }
            };
            self.entries[slot].routes.push(route);
        }
    }

    /// Freeze the registered routes
    pub fn build(self) -> RouteTable<T> {
        let routes: usize = self.entries.iter().map(|e| e.routes.len()).sum();
        info!(paths = self.entries.len(), routes, "route table built");
        RouteTable {
            entries: self.entries,
            index: self.index,
            _response: PhantomData,
        }
    }
}

impl<T: Send + 'static> Default for RouteTableBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(path: &str) -> Result<Regex, RouteRegistrationError> {
    Regex::new(&format!("^(?:{})$", path)).map_err(|err| {
        error!(path, error = %err, "invalid route pattern");
        RouteRegistrationError::InvalidPattern {
            path: path.to_string(),
            reason: err.to_string(),
        }
    })
}

fn effective_methods(methods: &[Method], filter: Option<&[Method]>) -> Vec<Method> {
    let mut effective = Vec::with_capacity(methods.len());
    for &method in methods {
        let allowed = filter.map_or(true, |filter| filter.contains(&method));
        if allowed && !effective.contains(&method) {
            effective.push(method);
        }
    }
    effective
}

/// Immutable route table, shared across connections
pub struct RouteTable<T> {
    entries: Vec<PathEntry>,
    index: AHashMap<String, usize>,
    _response: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> RouteTable<T> {
    pub fn builder() -> RouteTableBuilder<T> {
        RouteTableBuilder::new()
    }

    /// Resolve `(path, method)`: exact key first, then patterns in
    /// registration order
    pub fn resolve(&self, path: &str, method: Method) -> Option<&Route> {
        if let Some(route) = self
            .index
            .get(path)
            .and_then(|&slot| self.entries[slot].find(method))
        {
            debug!(path, %method, route = route.path(), "exact match");
            return Some(route);
        }

        let route = self
            .entries
            .iter()
            .filter(|entry| entry.pattern.is_match(path))
            .find_map(|entry| entry.find(method));
        match route {
            Some(route) => debug!(path, %method, route = route.path(), "pattern match"),
            None => debug!(path, %method, "no route"),
        }
        route
    }

    /// Resolve, bind and invoke. `Ok(None)` means no route matched.
    pub fn handle(&self, request: &Request) -> Result<Option<Response<T>>, Error> {
        let Some(route) = self.resolve(request.path(), request.method()) else {
            return Ok(None);
        };
        let args = binding::bind(route.pattern(), route.bindings(), request)?;
        let response = dispatch::invoke::<T>(route, args)?;
        Ok(Some(response))
    }

    /// Every route in registration order
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.entries.iter().flat_map(|entry| entry.routes.iter())
    }

    /// Distinct composed paths in registration order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.routes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registration failures, fatal at startup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteRegistrationError {
    #[error("handler '{handler}' has no methods to route")]
    EmptyMethodSet { handler: String },
    #[error("duplicate route {method} {path}: '{existing}' and '{new}'")]
    DuplicateRoute {
        path: String,
        method: Method,
        existing: String,
        new: String,
    },
    #[error("handler '{handler}' returns {found}, expected {expected}")]
    InvalidReturnType {
        handler: String,
        found: &'static str,
        expected: &'static str,
    },
    #[error("invalid route pattern '{path}': {reason}")]
    InvalidPattern { path: String, reason: String },
}
