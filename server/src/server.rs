//! Core Tern server implementation
//!
//! One task per accepted connection. Each connection gets exactly one bounded
//! read, one response and is then closed.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use tern_core::{Error, HttpParser, Method, ParseError, Response, RouteTable, StatusCode};

use crate::config::TernConfig;
use crate::error::{TernError, TernResult};
use crate::response::{error_response, to_head_format, to_wire_format, write_response};

/// Main Tern server
pub struct Tern {
    config: TernConfig,
    parser: HttpParser,
    routes: Arc<RouteTable<Value>>,
    permits: Arc<Semaphore>,
}

impl Tern {
    /// Create a server over a built route table
    pub fn new(config: TernConfig, routes: RouteTable<Value>) -> TernResult<Self> {
        config.validate()?;
        let parser = HttpParser::with_capacity(config.buffer_capacity)
            .map_err(|e| TernError::Config(e.to_string()))?;
        let permits = Arc::new(Semaphore::new(config.max_connections));
        Ok(Self {
            config,
            parser,
            routes: Arc::new(routes),
            permits,
        })
    }

    /// Get config reference
    pub fn config(&self) -> &TernConfig {
        &self.config
    }

    /// Get route table reference
    pub fn routes(&self) -> &RouteTable<Value> {
        &self.routes
    }

    /// Bind the configured address and serve until the task is dropped
    pub async fn listen(self) -> TernResult<()> {
        let addr = self.config.socket_addr();
        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| TernError::Http(format!("Invalid address '{}': {}", addr, e)))?;

        let listener = TcpListener::bind(socket_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self, listener: TcpListener) -> TernResult<()> {
        info!("🚀 Tern server listening on http://{}", listener.local_addr()?);
        info!("📊 Route table contains {} routes", self.routes.len());

        let server = Arc::new(self);

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let server = Arc::clone(&server);

            match Arc::clone(&server.permits).try_acquire_owned() {
                Ok(permit) => {
                    tokio::spawn(async move {
                        if let Err(err) = server.handle_connection(stream).await {
                            error!("Error serving connection from {}: {}", remote_addr, err);
                        }
                        drop(permit);
                    });
                }
                Err(_) => {
                    warn!("Connection limit reached, rejecting {}", remote_addr);
                    tokio::spawn(async move {
                        let response = error_response(
                            StatusCode::SERVICE_UNAVAILABLE,
                            "too many connections",
                        );
                        let mut stream = stream;
                        if let Err(err) = write_response(&mut stream, &response).await {
                            debug!("Failed to reject {}: {}", remote_addr, err);
                        }
                    });
                }
            }
        }
    }

    /// Single bounded read, one response, close
    async fn handle_connection(&self, mut stream: TcpStream) -> TernResult<()> {
        let mut buf = vec![0u8; self.parser.capacity()];
        let read = stream.read(&mut buf).await?;
        if read == 0 {
            debug!("Connection closed before sending a request");
            return Ok(());
        }

        let bytes = self.respond(&buf[..read])?;
        stream.write_all(&bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Answer raw request bytes with the full wire response. A HEAD request
    /// gets the head only.
    pub fn respond(&self, raw: &[u8]) -> TernResult<Vec<u8>> {
        let (method, response) = self.dispatch(raw);
        if method == Some(Method::HEAD) {
            to_head_format(&response)
        } else {
            to_wire_format(&response)
        }
    }

    /// Run raw request bytes through parse, resolve, bind and invoke and
    /// turn every outcome into a response
    pub fn process(&self, raw: &[u8]) -> Response<Value> {
        self.dispatch(raw).1
    }

    /// Like [`Tern::process`], also reporting the parsed method
    fn dispatch(&self, raw: &[u8]) -> (Option<Method>, Response<Value>) {
        let mut method = None;
        let outcome = self
            .parser
            .parse_bytes(raw)
            .map_err(Error::from)
            .and_then(|request| {
                debug!(method = %request.method(), path = request.path(), "request parsed");
                method = Some(request.method());
                self.routes.handle(&request)
            });

        let response = match outcome {
            Ok(Some(response)) => response,
            Ok(None) => {
                debug!("No route matched");
                error_response(StatusCode::NOT_FOUND, "no route matched the request")
            }
            Err(err) => {
                let status = err.status();
                if let Error::Parse(ParseError::Overflow { capacity }) = &err {
                    warn!(capacity, "Request exceeds read buffer");
                } else if status.is_server_error() {
                    error!(%status, "Request failed: {}", err);
                } else {
                    warn!(%status, "Rejected request: {}", err);
                }
                error_response(status, err.to_string())
            }
        };
        (method, response)
    }
}
