//! Function (menu and API) handlers
//!
//! Every write clears the permission caches, since any user may hold the
//! permission a function is bound to.

use axum::{
    extract::{Query, State},
    response::Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;

use crate::entity::function::{self, FunctionType};
use crate::entity::permission;
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::common::{existing_id, fetch_page, now, IdQuery, PageQuery, PageResult};
use crate::routes::ApiResponse;
use crate::service::tree;
use crate::state::AppState;

const TABLE: &str = "sys_function";

/// Create or update request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionForm {
    pub id: Option<i64>,
    pub name: String,
    pub code: String,
    pub function_type: i32,
    pub link: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<i64>,
    pub permission_id: Option<i64>,
    #[serde(default)]
    pub order_no: f32,
}

/// List filter, read alongside `PageQuery`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionFilter {
    pub function_type: Option<i32>,
}

/// GET /api/function/list
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<FunctionFilter>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<PageResult<function::Model>>>> {
    let mut select = function::Entity::find()
        .order_by_asc(function::Column::OrderNo)
        .order_by_asc(function::Column::Id);
    if let Some(function_type) = filter.function_type {
        select = select.filter(function::Column::FunctionType.eq(function_type));
    }
    if let Some(like) = query.like() {
        select = select.filter(
            Condition::any()
                .add(function::Column::Name.like(like.as_str()))
                .add(function::Column::Code.like(like.as_str())),
        );
    }
    Ok(Json(ApiResponse::success(fetch_page(&state.db, select, &query).await?)))
}

/// GET /api/function/get
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<function::Model>>> {
    let found = function::Entity::find_by_id(query.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("function")?;
    Ok(Json(ApiResponse::success(found)))
}

/// POST /api/function/save
pub async fn save(
    State(state): State<AppState>,
    Json(form): Json<FunctionForm>,
) -> AppResult<Json<ApiResponse<function::Model>>> {
    if form.name.trim().is_empty() || form.code.trim().is_empty() {
        return Err(AppError::InvalidParam("function name and code are required".to_string()));
    }
    FunctionType::try_from(form.function_type).map_err(|t| {
        AppError::InvalidParam(format!("unknown function type {}", t))
    })?;
    let id = existing_id(form.id);
    let parent_id = existing_id(form.parent_id);
    let permission_id = existing_id(form.permission_id);

    let txn = state.db.begin().await?;

    let duplicate = function::Entity::find()
        .filter(function::Column::Code.eq(form.code.trim()))
        .one(&txn)
        .await?;
    if duplicate.is_some_and(|f| Some(f.id) != id) {
        return Err(AppError::Conflict("function code already exists".to_string()));
    }

    if let Some(pid) = permission_id {
        permission::Entity::find_by_id(pid)
            .one(&txn)
            .await?
            .ok_or_not_found("permission")?;
    }

    let parent_path = match parent_id {
        Some(pid) => Some(
            function::Entity::find_by_id(pid)
                .one(&txn)
                .await?
                .ok_or_not_found("parent function")?
                .id_path,
        ),
        None => None,
    };

    let (mut model, old_path): (function::ActiveModel, Option<String>) = match id {
        Some(id) => {
            tree::check_parent(id, parent_id, parent_path.as_deref())?;
            let found = function::Entity::find_by_id(id)
                .one(&txn)
                .await?
                .ok_or_not_found("function")?;
            let old_path = found.id_path.clone();
            (found.into(), Some(old_path))
        }
        None => (
            function::ActiveModel {
                id_path: Set(String::new()),
                create_time: Set(now()),
                ..Default::default()
            },
            None,
        ),
    };
    model.name = Set(form.name.trim().to_string());
    model.code = Set(form.code.trim().to_string());
    model.function_type = Set(form.function_type);
    model.link = Set(form.link);
    model.icon = Set(form.icon);
    model.parent_id = Set(parent_id);
    model.permission_id = Set(permission_id);
    model.order_no = Set(form.order_no);
    model.update_time = Set(now());

    let saved = match id.zip(old_path) {
        Some((id, old_path)) => {
            let new_path = tree::child_id_path(parent_path.as_deref(), id);
            model.id_path = Set(new_path.clone());
            let saved = model.update(&txn).await?;
            tree::rebase_descendants(&txn, TABLE, &old_path, &new_path).await?;
            saved
        }
        None => {
            let created = model.insert(&txn).await?;
            let mut model: function::ActiveModel = created.clone().into();
            model.id_path = Set(tree::child_id_path(parent_path.as_deref(), created.id));
            model.update(&txn).await?
        }
    };

    txn.commit().await?;
    state.cache().invalidate_all();
    tracing::info!("Function {} ({}) saved", saved.id, saved.code);
    Ok(Json(ApiResponse::success(saved)))
}

/// POST /api/function/delete
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    let children = function::Entity::find()
        .filter(function::Column::ParentId.eq(query.id))
        .count(&state.db)
        .await?;
    if children > 0 {
        return Err(AppError::Conflict("function still has children".to_string()));
    }

    let result = function::Entity::delete_by_id(query.id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("function".to_string()));
    }
    state.cache().invalidate_all();
    Ok(Json(ApiResponse::success_msg("success")))
}
