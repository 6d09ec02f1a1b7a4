//! Core library for the Sembra client.
//!
//! Everything the frontends (mobile shell, desktop) share lives here:
//! a bearer-token store with a platform-selected backend, a timeout-bounded
//! HTTP dispatcher that normalizes failures, and the login/registration
//! flows that tie the two together. Screens compose these pieces; this crate
//! never renders anything.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError, Method, RequestOptions};
pub use auth::{
    login, logout, register, select_store, session_active, AuthOutcome, LoginInput, RegisterInput,
    StoreError, TokenStore,
};
pub use config::Config;
