//! Login, logout and current-user endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::Persistence;

use super::client::{ApiClient, ApiRequest};
use super::ApiError;

const LOGIN_PATH: &str = "user/login";
const LOGOUT_PATH: &str = "user/logout";
const USER_INFO_PATH: &str = "user/auth/info";

/// Login response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeVO {
    pub token: String,
    #[serde(deserialize_with = "crate::auth::credential::deserialize_expire")]
    pub expire: DateTime<Utc>,
}

/// The logged-in account as returned by `user/auth/info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub intro: Option<String>,
    #[serde(default)]
    pub gender: Option<i32>,
    #[serde(default)]
    pub register_type: Option<i32>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl UserInfo {
    /// Nickname if set, otherwise the username
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

impl ApiClient {
    /// Log in with username and password and persist the issued token.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        persistence: Persistence,
    ) -> Result<AuthorizeVO, ApiError> {
        let auth: AuthorizeVO = self
            .send(ApiRequest::post(LOGIN_PATH).form(&[("username", username), ("password", password)]))
            .await?;

        self.store().write(&auth.token, auth.expire, persistence)?;
        info!(username = username, tier = persistence.label(), expire = %auth.expire, "Logged in");
        Ok(auth)
    }

    /// Log out. The local credential is cleared whatever the backend says.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self.send_unit(ApiRequest::post(LOGOUT_PATH)).await;
        self.store().clear();
        match result {
            Ok(()) => {
                info!("Logged out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Backend logout failed, local credential cleared anyway");
                Err(e)
            }
        }
    }

    /// Fetch the currently logged-in account.
    pub async fn user_info(&self) -> Result<UserInfo, ApiError> {
        self.get(USER_INFO_PATH).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::auth::store::tests::store_with_tiers;
    use crate::auth::{StorageTier, TOKEN_KEY};
    use chrono::Duration as ChronoDuration;
    use mockito::Matcher;

    fn client_for(base: &str) -> ApiClient {
        let (store, _, _) = store_with_tiers();
        ApiClient::new(base, Duration::from_secs(5), Arc::new(store)).unwrap()
    }

    #[tokio::test]
    async fn test_login_stores_token_in_chosen_tier() {
        let mut server = mockito::Server::new_async().await;
        let expire = (Utc::now() + ChronoDuration::hours(2)).to_rfc3339();
        let mock = server
            .mock("POST", "/user/login")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "conan".into()),
                Matcher::UrlEncoded("password".into(), "s3cret".into()),
            ]))
            .with_body(format!(
                r#"{{"code":200,"msg":"登录成功","data":{{"token":"jwt-1","expire":"{}"}}}}"#,
                expire
            ))
            .create_async()
            .await;

        let (store, durable, session) = store_with_tiers();
        let client = ApiClient::new(&server.url(), Duration::from_secs(5), Arc::new(store)).unwrap();

        let auth = client.login("conan", "s3cret", Persistence::Session).await.unwrap();
        assert_eq!(auth.token, "jwt-1");
        assert_eq!(client.store().read().as_deref(), Some("jwt-1"));
        assert!(session.get(TOKEN_KEY).unwrap().is_some());
        assert!(durable.get(TOKEN_KEY).unwrap().is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_failure_stores_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/user/login")
            .with_body(r#"{"code":1004,"msg":"用户名或密码错误"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.login("conan", "wrong", Persistence::Durable).await.unwrap_err();
        assert!(matches!(err, ApiError::Business { code: 1004, .. }));
        assert!(!client.store().is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_backend_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/user/logout")
            .match_header("authorization", "Bearer jwt-1")
            .with_status(502)
            .create_async()
            .await;

        let client = client_for(&server.url());
        client
            .store()
            .write("jwt-1", Utc::now() + ChronoDuration::hours(1), Persistence::Durable)
            .unwrap();

        assert!(client.logout().await.is_err());
        assert_eq!(client.store().read(), None);
    }

    #[tokio::test]
    async fn test_user_info_parses_account() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user/auth/info")
            .with_body(
                r#"{"code":200,"data":{"id":3,"username":"conan","nickname":"江户川","registerType":0,
                    "roles":["admin"],"permissions":["system:export"],"loginTime":"2025-07-28 18:15:00"}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let info = client.user_info().await.unwrap();
        assert_eq!(info.display_name(), "江户川");
        assert_eq!(info.register_type, Some(0));
        assert!(info.has_permission("system:export"));
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let info = UserInfo {
            username: "ai".to_string(),
            nickname: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(info.display_name(), "ai");
    }
}
