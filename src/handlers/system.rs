//! Menu and region handlers

use axum::{extract::State, Extension, Json};

use crate::entity::function::MenuTree;
use crate::entity::region::RegionTree;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::AppState;

/// GET /api/menuTree
pub async fn menu_tree(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<MenuTree>>>> {
    Ok(Json(ApiResponse::success(state.system.menus(user.id).await?)))
}

/// GET /api/getRegions
pub async fn get_regions(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<RegionTree>>>> {
    Ok(Json(ApiResponse::success(state.system.regions().await?)))
}
