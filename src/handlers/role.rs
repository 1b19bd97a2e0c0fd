//! Role handlers
//!
//! Role edits and grants clear every cached permission set, since any
//! number of users may hold a role.

use axum::{
    extract::{Query, State},
    response::Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entity::role::ADMIN_ROLE;
use crate::entity::{permission, role, role_permission, user_role};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::common::{existing_id, fetch_page, now, IdQuery, PageQuery, PageResult};
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Create or update request
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub id: Option<i64>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

/// Role with the ids of its permissions
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: role::Model,
    pub permission_ids: Vec<i64>,
}

/// Replace the permissions of a role
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleGrantRequest {
    pub role_id: i64,
    #[serde(default)]
    pub permission_ids: Vec<i64>,
}

/// GET /api/role/list
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<PageResult<role::Model>>>> {
    let mut select = role::Entity::find().order_by_asc(role::Column::Id);
    if let Some(like) = query.like() {
        select = select.filter(
            Condition::any()
                .add(role::Column::Code.like(like.as_str()))
                .add(role::Column::Name.like(like.as_str())),
        );
    }
    Ok(Json(ApiResponse::success(fetch_page(&state.db, select, &query).await?)))
}

/// GET /api/role/get
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<RoleDetail>>> {
    let found = role::Entity::find_by_id(query.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("role")?;
    let permission_ids = role_permission::Entity::find()
        .filter(role_permission::Column::RoleId.eq(found.id))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|rp| rp.permission_id)
        .collect();

    Ok(Json(ApiResponse::success(RoleDetail {
        role: found,
        permission_ids,
    })))
}

/// POST /api/role/save
pub async fn save(
    State(state): State<AppState>,
    Json(form): Json<RoleForm>,
) -> AppResult<Json<ApiResponse<role::Model>>> {
    if form.code.trim().is_empty() || form.name.trim().is_empty() {
        return Err(AppError::InvalidParam("role code and name are required".to_string()));
    }
    let id = existing_id(form.id);

    let duplicate = role::Entity::find()
        .filter(role::Column::Code.eq(form.code.trim()))
        .one(&state.db)
        .await?;
    if duplicate.is_some_and(|r| Some(r.id) != id) {
        return Err(AppError::Conflict("role code already exists".to_string()));
    }

    let mut model: role::ActiveModel = match id {
        Some(id) => {
            let found = role::Entity::find_by_id(id)
                .one(&state.db)
                .await?
                .ok_or_not_found("role")?;
            if found.code == ADMIN_ROLE && form.code.trim() != ADMIN_ROLE {
                return Err(AppError::InvalidParam("the admin role cannot be renamed".to_string()));
            }
            found.into()
        }
        None => role::ActiveModel {
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

/// POST /api/role/delete
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    let found = role::Entity::find_by_id(query.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("role")?;
    if found.code == ADMIN_ROLE {
        return Err(AppError::InvalidParam("the admin role cannot be deleted".to_string()));
    }

    let txn = state.db.begin().await?;
    role_permission::Entity::delete_many()
        .filter(role_permission::Column::RoleId.eq(found.id))
        .exec(&txn)
        .await?;
    user_role::Entity::delete_many()
        .filter(user_role::Column::RoleId.eq(found.id))
        .exec(&txn)
        .await?;
    role::Entity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    state.cache().invalidate_all();
    tracing::info!("Role {} deleted", found.code);
    Ok(Json(ApiResponse::success_msg("success")))
}

/// POST /api/role/grant
pub async fn grant(
    State(state): State<AppState>,
    Json(req): Json<RoleGrantRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let txn = state.db.begin().await?;

    role::Entity::find_by_id(req.role_id)
        .one(&txn)
        .await?
        .ok_or_not_found("role")?;

    let mut permission_ids = req.permission_ids;
    permission_ids.sort_unstable();
    permission_ids.dedup();
    if !permission_ids.is_empty() {
        let known = permission::Entity::find()
            .filter(permission::Column::Id.is_in(permission_ids.clone()))
            .all(&txn)
            .await?;
        if known.len() != permission_ids.len() {
            return Err(AppError::InvalidParam("unknown permission id".to_string()));
        }
    }

    role_permission::Entity::delete_many()
        .filter(role_permission::Column::RoleId.eq(req.role_id))
        .exec(&txn)
        .await?;
    if !permission_ids.is_empty() {
        role_permission::Entity::insert_many(permission_ids.iter().map(|pid| {
            role_permission::ActiveModel {
                role_id: Set(req.role_id),
                permission_id: Set(*pid),
                ..Default::default()
            }
        }))
        .exec(&txn)
        .await?;
    }
    txn.commit().await?;

    state.cache().invalidate_all();
    tracing::info!("Role {} granted {} permission(s)", req.role_id, permission_ids.len());
    Ok(Json(ApiResponse::success_msg("success")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_request_defaults() {
        let req: RoleGrantRequest = serde_json::from_str(r#"{"roleId": 3}"#).unwrap();
        assert_eq!(req.role_id, 3);
        assert!(req.permission_ids.is_empty());
    }
}
