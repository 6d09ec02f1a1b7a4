//! HTTP dispatch for the Sembra backend.
//!
//! One request per call: the dispatcher attaches the stored bearer token,
//! bounds the call with the configured timeout, and normalizes transport
//! and application failures into [`ApiError`].

pub mod client;
pub mod error;

pub use client::{ApiClient, Method, RequestOptions};
pub use error::ApiError;
