//! Authentication middleware
//!
//! Resolves the request token to a user and checks the route code against
//! the user's API functions.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use std::collections::HashMap;

use crate::error::AppError;
use crate::state::AppState;

/// Request header carrying the token
pub const TOKEN_HEADER: &str = "token";

/// Extension to store current user in request
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: i64,
    pub token: String,
}

/// Paths that don't require authentication
fn is_public_path(path: &str) -> bool {
    if !path.starts_with("/api") {
        return true;
    }
    matches!(
        path,
        "/api/login" | "/api/logout" | "/api/getToken" | "/api/health"
    )
}

/// Paths open to every logged-in user
fn is_login_only_path(path: &str) -> bool {
    matches!(path, "/api/user/current" | "/api/menuTree" | "/api/getRegions")
}

/// Route code checked against API functions: `/api/order/list` -> `order:list`
pub fn route_code(path: &str) -> Option<String> {
    let rest = path.strip_prefix("/api")?.trim_matches('/');
    if rest.is_empty() {
        return None;
    }
    Some(rest.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>().join(":"))
}

/// Token from the `token` header, a bearer `Authorization` header, or the
/// `token` query parameter
pub fn extract_token(request: &Request<Body>) -> Option<String> {
    let headers = request.headers();
    if let Some(token) = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return Some(token.to_string());
    }

    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(token.to_string());
    }

    let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(request.uri()).ok()?;
    params.remove(TOKEN_HEADER).filter(|v| !v.is_empty())
}

/// Authentication middleware
pub async fn auth_layer(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if is_public_path(&path) {
        return next.run(request).await;
    }

    let Some(token) = extract_token(&request) else {
        return AppError::Unauthorized.into_response();
    };

    let user_id = match state.users.validate_token(&token) {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!("Rejected token on {}: {}", path, e);
            return e.into_response();
        }
    };

    let code = if is_login_only_path(&path) {
        None
    } else {
        route_code(&path)
    };

    match state.users.check_authorities(user_id, code.as_deref()).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("User {} denied on {}", user_id, path);
            return AppError::Forbidden.into_response();
        }
        Err(e) => return e.into_response(),
    }

    request
        .extensions_mut()
        .insert(CurrentUser { id: user_id, token });

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/api/login"));
        assert!(is_public_path("/api/health"));
        assert!(is_public_path("/index.html"));
        assert!(!is_public_path("/api/order/list"));
        assert!(!is_public_path("/api/menuTree"));
    }

    #[test]
    fn test_route_code() {
        assert_eq!(route_code("/api/order/list").as_deref(), Some("order:list"));
        assert_eq!(route_code("/api/user/grant/").as_deref(), Some("user:grant"));
        assert_eq!(route_code("/api"), None);
        assert_eq!(route_code("/static/app.js"), None);
    }

    #[test]
    fn test_extract_token() {
        let req = Request::builder()
            .uri("/api/order/list")
            .header("token", "abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&req).as_deref(), Some("abc"));

        let req = Request::builder()
            .uri("/api/order/list")
            .header("Authorization", "Bearer xyz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&req).as_deref(), Some("xyz"));

        let req = Request::builder()
            .uri("/api/order/list?page=1&token=q1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&req).as_deref(), Some("q1"));

        let req = Request::builder()
            .uri("/api/order/list?token=a%2Bb%3D%3D&page=2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&req).as_deref(), Some("a+b=="));

        let req = Request::builder()
            .uri("/api/order/list?token=")
            .body(Body::empty())
            .unwrap();
        assert!(extract_token(&req).is_none());

        let req = Request::builder()
            .uri("/api/order/list")
            .body(Body::empty())
            .unwrap();
        assert!(extract_token(&req).is_none());
    }
}
