//! Client library for the haibara blog backend.
//!
//! - `auth`: the persisted bearer token and its storage tiers
//! - `api`: the authenticated request gateway and typed endpoints
//! - `export`: permission-checked admin data export
//! - `config`/`context`: configuration and the startup-built context

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod export;

pub use api::{ApiClient, ApiError};
pub use auth::{Persistence, TokenStore};
pub use config::Config;
pub use context::AppContext;
