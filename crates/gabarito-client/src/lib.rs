//! gabarito-client — Backends for the exam-correction API.
//!
//! Implements the `ExamBackend` trait over HTTP for the real service, and in
//! memory for tests and offline use.

pub mod config;
pub mod http;
pub mod mock;

pub use config::{load_config, load_config_from, ClientConfig};
pub use http::HttpBackend;
pub use mock::InMemoryBackend;
