//! Authenticated request gateway for the blog backend REST API.
//!
//! Every outbound call goes through [`ApiClient::request`], which attaches the
//! stored bearer token (if any) and clears the token store as soon as the
//! backend says the credential is no longer accepted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::TokenStore;

use super::response::ResponseResult;
use super::ApiError;

/// Default `Accept-Language` sent with every request
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN";

/// HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

/// Description of one outbound call, relative to the client's base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(RequestBody::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = Some(RequestBody::Form(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// API client for the blog backend.
/// Clone is cheap - reqwest::Client and the token store are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    accept_language: String,
    store: Arc<TokenStore>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration, store: Arc<TokenStore>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: Self::normalize_base(base_url)?,
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            store,
        })
    }

    pub fn with_accept_language(mut self, language: impl Into<String>) -> Self {
        self.accept_language = language.into();
        self
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URLs are joined against, so they must end in `/`.
    fn normalize_base(base_url: &str) -> Result<Url> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        Url::parse(&normalized).with_context(|| format!("Invalid base URL: {}", base_url))
    }

    /// Resolve an API path against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("{}: {}", path, e)))
    }

    /// Send a request with the current credential attached.
    ///
    /// A 401 clears the token store before the error is returned. Other
    /// failures pass through as-is; nothing is retried.
    pub async fn request(&self, req: ApiRequest) -> Result<Response, ApiError> {
        let url = self.url(&req.path)?;

        let mut builder = self
            .client
            .request(req.method.clone(), url)
            .header(header::ACCEPT_LANGUAGE, &self.accept_language)
            .headers(req.headers);

        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }

        match self.store.read() {
            Some(token) => builder = builder.bearer_auth(token),
            None => debug!(path = %req.path, "No credential, sending unauthenticated"),
        }

        builder = match req.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Form(fields)) => builder.form(&fields),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!(method = %req.method, path = %req.path, "Credential rejected, clearing token store");
            self.store.clear();
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }

    /// Send a request and unwrap the response envelope.
    pub async fn send<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<T, ApiError> {
        let path = req.path.clone();
        let envelope: ResponseResult<T> = self.read_envelope(&path, req).await?;
        self.check_envelope(&path, envelope.into_result())
    }

    /// Like [`send`](Self::send) for calls that return no payload.
    pub async fn send_unit(&self, req: ApiRequest) -> Result<(), ApiError> {
        let path = req.path.clone();
        let envelope: ResponseResult<serde_json::Value> = self.read_envelope(&path, req).await?;
        self.check_envelope(&path, envelope.into_unit())
    }

    async fn read_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        req: ApiRequest,
    ) -> Result<ResponseResult<T>, ApiError> {
        let response = self.request(req).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e)))
    }

    /// The backend reports "not logged in" inside a 200 envelope too.
    fn check_envelope<T>(&self, path: &str, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(ApiError::Unauthorized) = &result {
            warn!(path = path, "Backend reported not logged in, clearing token store");
            self.store.clear();
        }
        result
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(ApiRequest::post(path).json(body)?).await
    }

    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        fields: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.send(ApiRequest::post(path).form(fields)).await
    }

    pub async fn delete_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(ApiRequest::delete(path).json(body)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::tests::store_with_tiers;
    use crate::auth::{Persistence, StorageTier, TOKEN_KEY};
    use chrono::{Duration as ChronoDuration, Utc};
    use mockito::Matcher;

    fn client_for(base: &str) -> ApiClient {
        let (store, _, _) = store_with_tiers();
        ApiClient::new(base, Duration::from_secs(5), Arc::new(store)).unwrap()
    }

    fn login(client: &ApiClient, token: &str) {
        client
            .store()
            .write(token, Utc::now() + ChronoDuration::hours(1), Persistence::Durable)
            .unwrap();
    }

    #[test]
    fn test_url_joining_normalizes_slashes() {
        let client = client_for("http://localhost:8088/api");
        assert_eq!(
            client.url("/export/business-types").unwrap().as_str(),
            "http://localhost:8088/api/export/business-types"
        );
        let client = client_for("http://localhost:8088/api/");
        assert_eq!(
            client.url("export/user/excel").unwrap().as_str(),
            "http://localhost:8088/api/export/user/excel"
        );
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/user/auth/info")
            .match_header("authorization", "Bearer abc123")
            .match_header("accept-language", "zh-CN")
            .with_body(r#"{"code":200,"msg":"success","data":{"id":1}}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        login(&client, "abc123");

        let data: serde_json::Value = client.get("/user/auth/info").await.unwrap();
        assert_eq!(data["id"], 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sends_unauthenticated_without_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/article/list")
            .match_header("authorization", Matcher::Missing)
            .with_body(r#"{"code":200,"data":[]}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let data: Vec<serde_json::Value> = client.get("article/list").await.unwrap();
        assert!(data.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_401_status_clears_store() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user/auth/info")
            .with_status(401)
            .create_async()
            .await;

        let client = client_for(&server.url());
        login(&client, "abc123");

        let err = client
            .get::<serde_json::Value>("user/auth/info")
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(client.store().read(), None);
    }

    #[tokio::test]
    async fn test_envelope_401_clears_store() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user/auth/info")
            .with_body(r#"{"code":401,"msg":"请先登录","data":null}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        login(&client, "abc123");

        let err = client
            .get::<serde_json::Value>("user/auth/info")
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!client.store().is_authenticated());
    }

    #[tokio::test]
    async fn test_other_errors_pass_through_and_keep_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/user/update/status")
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server.url());
        login(&client, "abc123");

        let err = client
            .post_json::<serde_json::Value, _>("user/update/status", &serde_json::json!({"id": "1", "status": 0}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ServerError(ref m) if m == "boom"));
        assert_eq!(client.store().read().as_deref(), Some("abc123"));
        // No retry
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_403_envelope_keeps_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/user/delete")
            .match_body(Matcher::Json(serde_json::json!({"ids": ["7"]})))
            .with_body(r#"{"code":403,"msg":"无权限"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        login(&client, "abc123");

        let err = client
            .delete_json::<serde_json::Value, _>("user/delete", &serde_json::json!({"ids": ["7"]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AccessDenied(_)));
        assert!(client.store().is_authenticated());
    }

    #[tokio::test]
    async fn test_network_error_keeps_token() {
        // Nothing listens on port 1
        let client = client_for("http://127.0.0.1:1/api/");
        login(&client, "abc123");

        let err = client
            .get::<serde_json::Value>("user/auth/info")
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert!(client.store().is_authenticated());
    }

    #[tokio::test]
    async fn test_concurrent_401s_clear_once_safely() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/a")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;

        let (store, durable, session) = store_with_tiers();
        let client = ApiClient::new(&server.url(), Duration::from_secs(5), Arc::new(store)).unwrap();
        login(&client, "abc123");

        let (a, b) = tokio::join!(
            client.request(ApiRequest::get("a")),
            client.request(ApiRequest::get("a"))
        );
        assert!(a.unwrap_err().is_unauthorized());
        assert!(b.unwrap_err().is_unauthorized());
        assert_eq!(durable.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(session.get(TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_form_body_and_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .match_body(Matcher::UrlEncoded("name".into(), "haibara".into()))
            .with_body(r#"{"code":200}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        client
            .send_unit(ApiRequest::post("search").query("page", "2").form(&[("name", "haibara")]))
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
