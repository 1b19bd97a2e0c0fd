//! WeChat OAuth client
//!
//! Exchanges web authorization codes for access tokens and fetches the
//! authorized user's profile.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::config::WxConfig;
use crate::error::{AppError, AppResult};

/// OAuth access token bound to one user
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthAccessToken {
    pub access_token: String,
    pub openid: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Remote user profile
#[derive(Debug, Clone, Deserialize)]
pub struct WxUserInfo {
    pub openid: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub headimgurl: Option<String>,
    #[serde(default)]
    pub sex: Option<i32>,
    #[serde(default)]
    pub unionid: Option<String>,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Exchange an authorization code for an access token
    async fn exchange_code(&self, code: &str) -> AppResult<OAuthAccessToken>;

    /// Fetch the profile of the user the token was issued for
    async fn user_info(&self, access_token: &str, open_id: &str) -> AppResult<WxUserInfo>;
}

/// `reqwest`-backed WeChat client
pub struct WxClient {
    http: reqwest::Client,
    config: WxConfig,
}

#[derive(Debug, Deserialize)]
struct WxError {
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

impl WxClient {
    pub fn new(config: WxConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("build http client: {}", e)))?;
        Ok(Self { http, config })
    }

    /// WeChat answers errors with HTTP 200 and an `errcode` body
    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> AppResult<T> {
        let body: serde_json::Value = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Remote(e.to_string()))?
            .json()
            .await
            .map_err(|e| AppError::Remote(e.to_string()))?;

        if let Ok(err) = serde_json::from_value::<WxError>(body.clone()) {
            if err.errcode != 0 {
                return Err(AppError::Remote(format!("wx error {}: {}", err.errcode, err.errmsg)));
            }
        }
        Ok(serde_json::from_value(body)?)
    }
}

#[async_trait]
impl OAuthProvider for WxClient {
    async fn exchange_code(&self, code: &str) -> AppResult<OAuthAccessToken> {
        let url = format!("{}/sns/oauth2/access_token", self.config.api_base);
        self.get_json(
            &url,
            &[
                ("appid", self.config.app_id.as_str()),
                ("secret", self.config.app_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ],
        )
        .await
    }

    async fn user_info(&self, access_token: &str, open_id: &str) -> AppResult<WxUserInfo> {
        let url = format!("{}/sns/userinfo", self.config.api_base);
        self.get_json(
            &url,
            &[
                ("access_token", access_token),
                ("openid", open_id),
                ("lang", "zh_CN"),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_access_token() {
        let token: OAuthAccessToken = serde_json::from_str(
            r#"{"access_token":"AT","expires_in":7200,"refresh_token":"RT","openid":"OPENID","scope":"snsapi_userinfo"}"#,
        )
        .unwrap();
        assert_eq!(token.openid, "OPENID");
        assert_eq!(token.expires_in, 7200);
    }

    #[test]
    fn test_error_body_is_detected() {
        let body = serde_json::json!({"errcode": 40029, "errmsg": "invalid code"});
        let err: WxError = serde_json::from_value(body).unwrap();
        assert_eq!(err.errcode, 40029);

        let ok = serde_json::json!({"openid": "o1", "nickname": "n"});
        assert!(serde_json::from_value::<WxError>(ok).is_err());
    }
}
