//! Organization handlers
//!
//! Organizations form a tree; `id_path` is maintained on every save.

use axum::{
    extract::{Query, State},
    response::Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;

use crate::entity::{organization, user_organization};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::common::{existing_id, fetch_page, now, IdQuery, PageQuery, PageResult};
use crate::routes::ApiResponse;
use crate::service::tree;
use crate::state::AppState;

const TABLE: &str = "sys_organization";

/// Create or update request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationForm {
    pub id: Option<i64>,
    pub name: String,
    pub code: String,
    pub parent_id: Option<i64>,
}

/// GET /api/organization/list
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<PageResult<organization::Model>>>> {
    let mut select = organization::Entity::find().order_by_asc(organization::Column::IdPath);
    if let Some(like) = query.like() {
        select = select.filter(
            Condition::any()
                .add(organization::Column::Name.like(like.as_str()))
                .add(organization::Column::Code.like(like.as_str())),
        );
    }
    Ok(Json(ApiResponse::success(fetch_page(&state.db, select, &query).await?)))
}

/// GET /api/organization/get
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<organization::Model>>> {
    let found = organization::Entity::find_by_id(query.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("organization")?;
    Ok(Json(ApiResponse::success(found)))
}

/// POST /api/organization/save
pub async fn save(
    State(state): State<AppState>,
    Json(form): Json<OrganizationForm>,
) -> AppResult<Json<ApiResponse<organization::Model>>> {
    if form.name.trim().is_empty() || form.code.trim().is_empty() {
        return Err(AppError::InvalidParam("organization name and code are required".to_string()));
    }
    let id = existing_id(form.id);
    let parent_id = existing_id(form.parent_id);

    let txn = state.db.begin().await?;

    let duplicate = organization::Entity::find()
        .filter(organization::Column::Code.eq(form.code.trim()))
        .one(&txn)
        .await?;
    if duplicate.is_some_and(|o| Some(o.id) != id) {
        return Err(AppError::Conflict("organization code already exists".to_string()));
    }

    let parent_path = match parent_id {
        Some(pid) => Some(
            organization::Entity::find_by_id(pid)
                .one(&txn)
                .await?
                .ok_or_not_found("parent organization")?
                .id_path,
        ),
        None => None,
    };

    let saved = match id {
        Some(id) => {
            tree::check_parent(id, parent_id, parent_path.as_deref())?;
            let found = organization::Entity::find_by_id(id)
                .one(&txn)
                .await?
                .ok_or_not_found("organization")?;
            let old_path = found.id_path.clone();
            let new_path = tree::child_id_path(parent_path.as_deref(), id);

            let mut model: organization::ActiveModel = found.into();
            model.name = Set(form.name.trim().to_string());
            model.code = Set(form.code.trim().to_string());
            model.parent_id = Set(parent_id);
            model.id_path = Set(new_path.clone());
            model.update_time = Set(now());
            let saved = model.update(&txn).await?;

            tree::rebase_descendants(&txn, TABLE, &old_path, &new_path).await?;
            saved
        }
        None => {
            let created = organization::ActiveModel {
                name: Set(form.name.trim().to_string()),
                code: Set(form.code.trim().to_string()),
                parent_id: Set(parent_id),
                id_path: Set(String::new()),
                create_time: Set(now()),
                update_time: Set(now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            let mut model: organization::ActiveModel = created.clone().into();
            model.id_path = Set(tree::child_id_path(parent_path.as_deref(), created.id));
            model.update(&txn).await?
        }
    };

    txn.commit().await?;
    Ok(Json(ApiResponse::success(saved)))
}

/// POST /api/organization/delete
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    let children = organization::Entity::find()
        .filter(organization::Column::ParentId.eq(query.id))
        .count(&state.db)
        .await?;
    if children > 0 {
        return Err(AppError::Conflict("organization still has children".to_string()));
    }

    let txn = state.db.begin().await?;
    user_organization::Entity::delete_many()
        .filter(user_organization::Column::OrganId.eq(query.id))
        .exec(&txn)
        .await?;
    let result = organization::Entity::delete_by_id(query.id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("organization".to_string()));
    }
    txn.commit().await?;

    Ok(Json(ApiResponse::success_msg("success")))
}
