//! # TernServer
//!
//! Serving shell around [`tern_core`]: TCP accept loop, connection limit,
//! response writer, configuration and the demo controllers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tern_server::{demo_routes, Tern, TernConfig, UserStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let routes = demo_routes(UserStore::seeded(100))?;
//!     let server = Tern::new(TernConfig::default(), routes)?;
//!     Ok(server.listen().await?)
//! }
//! ```

pub mod config;
pub mod controllers;
pub mod error;
pub mod response;
pub mod server;

// Re-export main types for convenient use
pub use config::TernConfig;
pub use controllers::{demo_routes, home_controller, user_controller, NewUser, User, UserStore};
pub use error::{TernError, TernResult};
pub use response::{error_response, to_head_format, to_wire_format, write_response};
pub use server::Tern;

// Re-export important types from core crate for convenience
pub use tern_core::{Method, Response, StatusCode};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_server_from_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "port": 9100, "hostname": "0.0.0.0", "buffer_capacity": 4096, "max_connections": 8 }}"#
        )
        .unwrap();

        let config = TernConfig::from_file(file.path()).unwrap();
        let server = Tern::new(config, demo_routes(UserStore::new()).unwrap()).unwrap();

        assert_eq!(server.config().port, 9100);
        assert_eq!(server.config().socket_addr(), "0.0.0.0:9100");
        assert!(server.routes().len() > 0);
    }

    #[test]
    fn test_full_api_showcase() {
        let routes = demo_routes(UserStore::seeded(2)).unwrap();
        let server = Tern::new(TernConfig::default(), routes).unwrap();

        let created = server.process(
            b"POST /api/users HTTP/1.1\r\nHost: localhost\r\n\r\n{\"name\":\"linus\",\"age\":54}",
        );
        assert_eq!(created.status, StatusCode::CREATED);
        let wire = String::from_utf8(to_wire_format(&created).unwrap()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(wire.contains("Location: /api/users/2\r\n"));

        let listed = server.process(b"GET /api/users HTTP/1.1\r\n\r\n");
        assert_eq!(listed.body.unwrap().as_array().unwrap().len(), 3);

        let fetched = server.process(b"GET /api/users/2 HTTP/1.1\r\n\r\n");
        assert_eq!(fetched.body, Some(json!({ "uid": 2, "name": "linus", "age": 54 })));

        let health = server.process(b"GET /health HTTP/1.0\r\n\r\n");
        assert_eq!(health.body, Some(json!({ "status": "ok", "version": "HTTP/1.0" })));

        let wrong_method = server.process(b"PUT /health HTTP/1.1\r\n\r\n");
        assert_eq!(wrong_method.status, StatusCode::NOT_FOUND);
    }
}
