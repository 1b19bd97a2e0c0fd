//! Authentication handlers
//!
//! Implements login, logout, token exchange and current user endpoints

use axum::{extract::State, Extension, Json};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};

use crate::entity::file;
use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::service::user::{LoginInfo, TokenSummary};
use crate::state::AppState;

/// Login request body. Exactly one of `key`, `code` or the
/// `identity`/`password` pair is used, in that order.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    /// RSA-encrypted user id or user name
    pub identity: Option<String>,
    /// RSA-encrypted password
    pub password: Option<String>,
    /// Key from an earlier login
    pub key: Option<String>,
    /// WeChat authorization code
    pub code: Option<String>,
}

/// Body of logout and getToken
#[derive(Debug, Deserialize)]
pub struct KeyRequest {
    pub key: String,
}

/// Current user response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserResponse {
    pub id: i64,
    pub nickname: Option<String>,
    pub head_img: Option<String>,
    pub create_time: i64,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginInfo>>> {
    if let Some(key) = present(&req.key) {
        return Ok(Json(ApiResponse::success(state.users.key_login(key).await?)));
    }
    if let Some(code) = present(&req.code) {
        return Ok(Json(ApiResponse::success(state.users.wx_login(code).await?)));
    }

    let (Some(identity), Some(password)) = (present(&req.identity), present(&req.password)) else {
        return Err(AppError::InvalidParam("incomplete login parameters".to_string()));
    };
    let identity = state.cipher.decrypt(identity)?;
    let password = state.cipher.decrypt(password)?;

    let info = state.users.login(&identity, &password).await?;
    Ok(Json(ApiResponse::success(info)))
}

/// POST /api/logout
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<KeyRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.users.logout(&req.key)?;
    Ok(Json(ApiResponse::success_msg("logout success")))
}

/// POST /api/getToken
pub async fn get_token(
    State(state): State<AppState>,
    Json(req): Json<KeyRequest>,
) -> AppResult<Json<ApiResponse<TokenSummary>>> {
    Ok(Json(ApiResponse::success(state.users.get_token(&req.key)?)))
}

/// GET /api/user/current
pub async fn current_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<CurrentUserResponse>>> {
    let found = state
        .users
        .get_user(current_user.id)
        .await?
        .ok_or_not_found("user")?;

    let head_img = match found.head_img_id {
        Some(id) => file::Entity::find_by_id(id)
            .one(&state.db)
            .await?
            .map(|f| f.file_path),
        None => None,
    };

    Ok(Json(ApiResponse::success(CurrentUserResponse {
        id: found.id,
        nickname: found.nickname,
        head_img,
        create_time: found.create_time,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_accepts_partial_bodies() {
        let req: LoginRequest = serde_json::from_str(r#"{"key":"k1"}"#).unwrap();
        assert_eq!(present(&req.key), Some("k1"));
        assert!(present(&req.identity).is_none());

        let req: LoginRequest = serde_json::from_str(r#"{"identity":"","password":"p"}"#).unwrap();
        assert!(present(&req.identity).is_none());
        assert_eq!(present(&req.password), Some("p"));
    }
}
