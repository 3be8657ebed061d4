//! Pet Backend Integration
//!
//! The remote service that gives the pet its voice. Access goes through the
//! [`PetBackend`] trait so the Conductor never depends on a transport.
//!
//! # Available Backends
//!
//! - **HTTP**: JSON over HTTP POST (default)
//!
//! # Usage
//!
//! ```ignore
//! use digipal_core::backend::{send_with_retry, ChatRequest, HttpBackend, RetryPolicy};
//!
//! let backend = HttpBackend::new("http://localhost:3000/chat", Duration::from_secs(10))?;
//! let reply = send_with_retry(&backend, &ChatRequest::new("Hello"), &RetryPolicy::default()).await?;
//! ```

mod http;
mod retry;
mod traits;

pub use http::{HttpBackend, DEFAULT_REQUEST_TIMEOUT};
pub use retry::{send_with_retry, RetryPolicy};
pub use traits::{BackendError, ChatRequest, PetBackend, PetReply};
