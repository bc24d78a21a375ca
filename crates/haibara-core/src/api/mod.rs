//! REST API client module for the blog backend.
//!
//! This module provides the `ApiClient` gateway, which attaches the stored
//! bearer token to every request and clears it when the backend rejects it,
//! plus the typed `{code, msg, data}` response envelope.

pub mod client;
pub mod error;
pub mod response;
pub mod user;

pub use client::{ApiClient, ApiRequest, RequestBody};
pub use error::ApiError;
pub use response::ResponseResult;
pub use user::{AuthorizeVO, UserInfo};
