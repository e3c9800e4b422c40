//! HTTP client module for test bodies
//!
//! Provides the keep-alive HTTP agent used by API units and page sessions.

mod client;

pub use client::{endpoint_of, HttpClient, HttpError, HttpRequest, DEFAULT_MAX_IDLE_PER_HOST};
