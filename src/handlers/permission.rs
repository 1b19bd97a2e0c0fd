//! Permission handlers

use axum::{
    extract::{Query, State},
    response::Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;

use crate::entity::{function, permission, role_permission, user_permission};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::common::{existing_id, fetch_page, now, IdQuery, PageQuery, PageResult};
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Create or update request
#[derive(Debug, Deserialize)]
pub struct PermissionForm {
    pub id: Option<i64>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

/// GET /api/permission/list
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<PageResult<permission::Model>>>> {
    let mut select = permission::Entity::find().order_by_asc(permission::Column::Code);
    if let Some(like) = query.like() {
        select = select.filter(
            Condition::any()
                .add(permission::Column::Code.like(like.as_str()))
                .add(permission::Column::Name.like(like.as_str())),
        );
    }
    Ok(Json(ApiResponse::success(fetch_page(&state.db, select, &query).await?)))
}

/// GET /api/permission/get
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<permission::Model>>> {
    let found = permission::Entity::find_by_id(query.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("permission")?;
    Ok(Json(ApiResponse::success(found)))
}

/// POST /api/permission/save
pub async fn save(
    State(state): State<AppState>,
    Json(form): Json<PermissionForm>,
) -> AppResult<Json<ApiResponse<permission::Model>>> {
    if form.code.trim().is_empty() || form.name.trim().is_empty() {
        return Err(AppError::InvalidParam("permission code and name are required".to_string()));
    }
    let id = existing_id(form.id);

    let duplicate = permission::Entity::find()
        .filter(permission::Column::Code.eq(form.code.trim()))
        .one(&state.db)
        .await?;
    if duplicate.is_some_and(|p| Some(p.id) != id) {
        return Err(AppError::Conflict("permission code already exists".to_string()));
    }

    let mut model: permission::ActiveModel = match id {
        Some(id) => permission::Entity::find_by_id(id)
            .one(&state.db)
            .await?
            .ok_or_not_found("permission")?
            .into(),
        None => permission::ActiveModel {
            create_time: Set(now()),
            ..Default::default()
        },
    };
    model.code = Set(form.code.trim().to_string());
    model.name = Set(form.name.trim().to_string());
    model.description = Set(form.description);
    model.update_time = Set(now());

    let saved = if id.is_some() {
        model.update(&state.db).await?
    } else {
        model.insert(&state.db).await?
    };
    state.cache().invalidate_all();
    Ok(Json(ApiResponse::success(saved)))
}

/// POST /api/permission/delete
///
/// Refused while functions are bound to the permission: unbinding them
/// would open those functions to every user.
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    let bound = function::Entity::find()
        .filter(function::Column::PermissionId.eq(query.id))
        .count(&state.db)
        .await?;
    if bound > 0 {
        return Err(AppError::Conflict(format!(
            "permission is bound to {} function(s)",
            bound
        )));
    }

    let txn = state.db.begin().await?;
    role_permission::Entity::delete_many()
        .filter(role_permission::Column::PermissionId.eq(query.id))
        .exec(&txn)
        .await?;
    user_permission::Entity::delete_many()
        .filter(user_permission::Column::PermissionId.eq(query.id))
        .exec(&txn)
        .await?;
    let result = permission::Entity::delete_by_id(query.id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("permission".to_string()));
    }
    txn.commit().await?;

    state.cache().invalidate_all();
    Ok(Json(ApiResponse::success_msg("success")))
}
