use axum::{
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers;
use crate::middleware::auth_layer;
use crate::state::AppState;

pub mod health;

/// Success code carried in the response envelope
pub const CODE_OK: i32 = 200;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: CODE_OK,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            code: CODE_OK,
            message: message.into(),
            data: None,
        }
    }
}

/// Mount `list`, `get`, `save` and `delete` for one entity
macro_rules! crud_routes {
    ($router:expr, $name:literal, $module:ident) => {
        $router
            .route(concat!("/", $name, "/list"), get(handlers::$module::list))
            .route(concat!("/", $name, "/get"), get(handlers::$module::get))
            .route(concat!("/", $name, "/save"), post(handlers::$module::save))
            .route(concat!("/", $name, "/delete"), post(handlers::$module::delete))
    };
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/getToken", post(handlers::auth::get_token))
        .route("/user/current", get(handlers::auth::current_user))
        // System routes
        .route("/menuTree", get(handlers::system::menu_tree))
        .route("/getRegions", get(handlers::system::get_regions))
        // Grants
        .route("/user/grant", post(handlers::user::grant))
        .route("/role/grant", post(handlers::role::grant));

    let api_routes = crud_routes!(api_routes, "order", order);
    let api_routes = crud_routes!(api_routes, "port", port);
    let api_routes = crud_routes!(api_routes, "organization", organization);
    let api_routes = crud_routes!(api_routes, "role", role);
    let api_routes = crud_routes!(api_routes, "permission", permission);
    let api_routes = crud_routes!(api_routes, "function", function);
    let api_routes = crud_routes!(api_routes, "region", region);
    let api_routes = crud_routes!(api_routes, "dict", dict);
    let api_routes = crud_routes!(api_routes, "user", user);

    Router::new()
        .nest("/api", api_routes)
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error(404, "Not Found")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let ok = serde_json::to_value(ApiResponse::success(vec![1, 2])).unwrap();
        assert_eq!(ok["code"], 200);
        assert_eq!(ok["data"], serde_json::json!([1, 2]));

        let err = serde_json::to_value(ApiResponse::<()>::error(40100, "Invalid credential")).unwrap();
        assert_eq!(err["code"], 40100);
        assert!(err.get("data").is_none());
    }

    #[tokio::test]
    async fn test_fallback_not_found() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let app: Router = Router::new().fallback(fallback);
        let resp = app
            .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
