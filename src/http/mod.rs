//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → proxy::Gateway (dispatch)
//!         → preflight.rs (OPTIONS)
//!         → response.rs (not-found / JSON errors)
//!     → Send to client
//! ```

pub mod preflight;
pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
