//! Dictionary handlers

use axum::{
    extract::{Query, State},
    response::Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;

use crate::entity::dict;
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::common::{existing_id, fetch_page, now, IdQuery, PageQuery, PageResult};
use crate::routes::ApiResponse;
use crate::service::tree;
use crate::state::AppState;

const TABLE: &str = "sys_dict";

/// Create or update request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictForm {
    pub id: Option<i64>,
    pub code: String,
    pub name: String,
    pub value: Option<String>,
    pub parent_id: Option<i64>,
}

/// List filter, read alongside `PageQuery`. `parentId` narrows to direct
/// children.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictFilter {
    pub parent_id: Option<i64>,
}

/// GET /api/dict/list
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<DictFilter>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<PageResult<dict::Model>>>> {
    let mut select = dict::Entity::find().order_by_asc(dict::Column::IdPath);
    if let Some(parent_id) = filter.parent_id {
        select = select.filter(dict::Column::ParentId.eq(parent_id));
    }
    if let Some(like) = query.like() {
        select = select.filter(
            Condition::any()
                .add(dict::Column::Code.like(like.as_str()))
                .add(dict::Column::Name.like(like.as_str())),
        );
    }
    Ok(Json(ApiResponse::success(fetch_page(&state.db, select, &query).await?)))
}

/// GET /api/dict/get
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<dict::Model>>> {
    let found = dict::Entity::find_by_id(query.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("dict")?;
    Ok(Json(ApiResponse::success(found)))
}

/// POST /api/dict/save
pub async fn save(
    State(state): State<AppState>,
    Json(form): Json<DictForm>,
) -> AppResult<Json<ApiResponse<dict::Model>>> {
    if form.code.trim().is_empty() || form.name.trim().is_empty() {
        return Err(AppError::InvalidParam("dict code and name are required".to_string()));
    }
    let id = existing_id(form.id);
    let parent_id = existing_id(form.parent_id);

    let txn = state.db.begin().await?;

    let parent_path = match parent_id {
        Some(pid) => Some(
            dict::Entity::find_by_id(pid)
                .one(&txn)
                .await?
                .ok_or_not_found("parent dict")?
                .id_path,
        ),
        None => None,
    };

    let saved = match id {
        Some(id) => {
            tree::check_parent(id, parent_id, parent_path.as_deref())?;
            let found = dict::Entity::find_by_id(id)
                .one(&txn)
                .await?
                .ok_or_not_found("dict")?;
            let old_path = found.id_path.clone();
            let new_path = tree::child_id_path(parent_path.as_deref(), id);

            let mut model: dict::ActiveModel = found.into();
            model.code = Set(form.code.trim().to_string());
            model.name = Set(form.name.trim().to_string());
            model.value = Set(form.value);
            model.parent_id = Set(parent_id);
            model.id_path = Set(new_path.clone());
            model.update_time = Set(now());
            let saved = model.update(&txn).await?;

            tree::rebase_descendants(&txn, TABLE, &old_path, &new_path).await?;
            saved
        }
        None => {
            let created = dict::ActiveModel {
                code: Set(form.code.trim().to_string()),
                name: Set(form.name.trim().to_string()),
                value: Set(form.value),
                parent_id: Set(parent_id),
                id_path: Set(String::new()),
                create_time: Set(now()),
                update_time: Set(now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            let mut model: dict::ActiveModel = created.clone().into();
            model.id_path = Set(tree::child_id_path(parent_path.as_deref(), created.id));
            model.update(&txn).await?
        }
    };

    txn.commit().await?;
    Ok(Json(ApiResponse::success(saved)))
}

/// POST /api/dict/delete
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    let children = dict::Entity::find()
        .filter(dict::Column::ParentId.eq(query.id))
        .count(&state.db)
        .await?;
    if children > 0 {
        return Err(AppError::Conflict("dict entry still has children".to_string()));
    }

    let result = dict::Entity::delete_by_id(query.id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("dict".to_string()));
    }
    Ok(Json(ApiResponse::success_msg("success")))
}
