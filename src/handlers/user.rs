//! User handlers
//!
//! User management and grants of roles, permissions and organizations.

use axum::{
    extract::{Query, State},
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::crypto::{generate_salt, hash_password};
use crate::entity::user::{self, UserSummary, UserType};
use crate::entity::{organization, permission, role, user_organization, user_permission, user_role};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::common::{existing_id, fetch_page, now, IdQuery, PageQuery, PageResult};
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::service::UserService;
use crate::state::AppState;

/// Create or update request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserForm {
    pub id: Option<i64>,
    pub user_name: Option<String>,
    /// Plain password; omitted or empty keeps the current one on update
    pub password: Option<String>,
    pub nickname: Option<String>,
    pub real_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub user_type: Option<i32>,
    pub about: Option<String>,
    pub organ_id: Option<i64>,
    pub active: Option<bool>,
}

/// List filter, read alongside `PageQuery`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub organ_id: Option<i64>,
}

/// User with the ids of everything granted to it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserSummary,
    pub role_ids: Vec<i64>,
    pub permission_ids: Vec<i64>,
    pub organ_ids: Vec<i64>,
}

/// Replace grants of a user. Omitted lists are left unchanged.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGrantRequest {
    pub user_id: i64,
    pub role_ids: Option<Vec<i64>>,
    pub permission_ids: Option<Vec<i64>>,
    pub organ_ids: Option<Vec<i64>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn dedup(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// GET /api/user/list
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<PageResult<UserSummary>>>> {
    let mut select = user::Entity::find().order_by_asc(user::Column::Id);
    if let Some(organ_id) = filter.organ_id {
        select = select.filter(user::Column::OrganId.eq(organ_id));
    }
    if let Some(like) = query.like() {
        select = select.filter(
            Condition::any()
                .add(user::Column::UserName.like(like.as_str()))
                .add(user::Column::Nickname.like(like.as_str()))
                .add(user::Column::RealName.like(like.as_str()))
                .add(user::Column::Mobile.like(like.as_str())),
        );
    }
    let page = fetch_page(&state.db, select, &query).await?;
    Ok(Json(ApiResponse::success(page.map(UserSummary::from))))
}

/// GET /api/user/get
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<UserDetail>>> {
    let found = user::Entity::find_by_id(query.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("user")?;

    let role_ids = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(found.id))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|r| r.role_id)
        .collect();
    let permission_ids = user_permission::Entity::find()
        .filter(user_permission::Column::UserId.eq(found.id))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|p| p.permission_id)
        .collect();
    let organ_ids = user_organization::Entity::find()
        .filter(user_organization::Column::UserId.eq(found.id))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|o| o.organ_id)
        .collect();

    Ok(Json(ApiResponse::success(UserDetail {
        user: UserSummary::from(found),
        role_ids,
        permission_ids,
        organ_ids,
    })))
}

/// POST /api/user/save
pub async fn save(
    State(state): State<AppState>,
    Json(form): Json<UserForm>,
) -> AppResult<Json<ApiResponse<UserSummary>>> {
    let id = existing_id(form.id);
    let user_name = non_empty(form.user_name);
    let password = non_empty(form.password);
    let mobile = non_empty(form.mobile);

    if id.is_none() && (user_name.is_none() || password.is_none()) {
        return Err(AppError::InvalidParam("user name and password are required".to_string()));
    }

    if let Some(name) = &user_name {
        let duplicate = user::Entity::find()
            .filter(user::Column::UserName.eq(name.as_str()))
            .one(&state.db)
            .await?;
        if duplicate.is_some_and(|u| Some(u.id) != id) {
            return Err(AppError::Conflict("user name already exists".to_string()));
        }
    }
    if let Some(mobile) = &mobile {
        let duplicate = user::Entity::find()
            .filter(user::Column::Mobile.eq(mobile.as_str()))
            .one(&state.db)
            .await?;
        if duplicate.is_some_and(|u| Some(u.id) != id) {
            return Err(AppError::Conflict("mobile already exists".to_string()));
        }
    }

    let (mut model, was_active): (user::ActiveModel, bool) = match id {
        Some(id) => {
            let found = user::Entity::find_by_id(id)
                .one(&state.db)
                .await?
                .ok_or_not_found("user")?;
            let was_active = found.active;
            (found.into(), was_active)
        }
        None => (
            user::ActiveModel {
                active: Set(true),
                user_type: Set(UserType::Normal.into()),
                create_time: Set(now()),
                ..Default::default()
            },
            true,
        ),
    };

    if user_name.is_some() {
        model.user_name = Set(user_name);
    }
    let password_changed = password.is_some();
    if let Some(password) = password {
        let salt = generate_salt();
        model.password = Set(Some(hash_password(&password, &salt)));
        model.salt = Set(Some(salt));
    }
    model.nickname = Set(non_empty(form.nickname));
    model.real_name = Set(non_empty(form.real_name));
    model.email = Set(non_empty(form.email));
    model.mobile = Set(mobile);
    model.about = Set(form.about);
    model.organ_id = Set(existing_id(form.organ_id));
    if let Some(user_type) = form.user_type {
        model.user_type = Set(UserType::from(user_type).into());
    }
    if let Some(active) = form.active {
        model.active = Set(active);
    }
    model.update_time = Set(now());

    let saved = if id.is_some() {
        model.update(&state.db).await?
    } else {
        model.insert(&state.db).await?
    };

    if id.is_some() {
        // existing sessions end when the password changes or the user is disabled
        let revoke_sessions = password_changed || (was_active && !saved.active);
        after_user_updated(&state.users, saved.id, revoke_sessions);
    }

    Ok(Json(ApiResponse::success(UserSummary::from(saved))))
}

/// Drop cached permissions of an edited user, and optionally its sessions
fn after_user_updated(users: &UserService, user_id: i64, revoke_sessions: bool) {
    users.cache().invalidate_user(user_id);
    if revoke_sessions {
        users.secrets().invalidate_user(&user_id.to_string());
        tracing::info!("Sessions of user {} revoked", user_id);
    }
}

/// POST /api/user/delete
pub async fn delete(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    if query.id == current_user.id {
        return Err(AppError::InvalidParam("cannot delete yourself".to_string()));
    }

    let txn = state.db.begin().await?;
    user_role::Entity::delete_many()
        .filter(user_role::Column::UserId.eq(query.id))
        .exec(&txn)
        .await?;
    user_permission::Entity::delete_many()
        .filter(user_permission::Column::UserId.eq(query.id))
        .exec(&txn)
        .await?;
    user_organization::Entity::delete_many()
        .filter(user_organization::Column::UserId.eq(query.id))
        .exec(&txn)
        .await?;
    let result = user::Entity::delete_by_id(query.id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("user".to_string()));
    }
    txn.commit().await?;

    state.secrets().invalidate_user(&query.id.to_string());
    state.cache().invalidate_user(query.id);
    tracing::info!("User {} deleted by {}", query.id, current_user.id);
    Ok(Json(ApiResponse::success_msg("success")))
}

/// Fail unless every id exists in the entity's table
async fn ensure_all_exist<E, C>(conn: &C, column: E::Column, ids: &[i64], what: &str) -> AppResult<()>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(());
    }
    let found = E::find()
        .filter(column.is_in(ids.to_vec()))
        .all(conn)
        .await?;
    if found.len() != ids.len() {
        return Err(AppError::InvalidParam(format!("unknown {} id", what)));
    }
    Ok(())
}

async fn replace_roles(txn: &DatabaseTransaction, user_id: i64, ids: Vec<i64>) -> AppResult<()> {
    ensure_all_exist::<role::Entity, _>(txn, role::Column::Id, &ids, "role").await?;
    user_role::Entity::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .exec(txn)
        .await?;
    if !ids.is_empty() {
        user_role::Entity::insert_many(ids.into_iter().map(|role_id| user_role::ActiveModel {
            user_id: Set(user_id),
            role_id: Set(role_id),
            ..Default::default()
        }))
        .exec(txn)
        .await?;
    }
    Ok(())
}

async fn replace_permissions(txn: &DatabaseTransaction, user_id: i64, ids: Vec<i64>) -> AppResult<()> {
    ensure_all_exist::<permission::Entity, _>(txn, permission::Column::Id, &ids, "permission").await?;
    user_permission::Entity::delete_many()
        .filter(user_permission::Column::UserId.eq(user_id))
        .exec(txn)
        .await?;
    if !ids.is_empty() {
        user_permission::Entity::insert_many(ids.into_iter().map(|permission_id| {
            user_permission::ActiveModel {
                user_id: Set(user_id),
                permission_id: Set(permission_id),
                ..Default::default()
            }
        }))
        .exec(txn)
        .await?;
    }
    Ok(())
}

async fn replace_organizations(txn: &DatabaseTransaction, user_id: i64, ids: Vec<i64>) -> AppResult<()> {
    ensure_all_exist::<organization::Entity, _>(txn, organization::Column::Id, &ids, "organization")
        .await?;
    user_organization::Entity::delete_many()
        .filter(user_organization::Column::UserId.eq(user_id))
        .exec(txn)
        .await?;
    if !ids.is_empty() {
        user_organization::Entity::insert_many(ids.into_iter().map(|organ_id| {
            user_organization::ActiveModel {
                user_id: Set(user_id),
                organ_id: Set(organ_id),
                ..Default::default()
            }
        }))
        .exec(txn)
        .await?;
    }
    Ok(())
}

/// POST /api/user/grant
pub async fn grant(
    State(state): State<AppState>,
    Json(req): Json<UserGrantRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let txn = state.db.begin().await?;

    user::Entity::find_by_id(req.user_id)
        .one(&txn)
        .await?
        .ok_or_not_found("user")?;

    if let Some(ids) = req.role_ids {
        replace_roles(&txn, req.user_id, dedup(ids)).await?;
    }
    if let Some(ids) = req.permission_ids {
        replace_permissions(&txn, req.user_id, dedup(ids)).await?;
    }
    if let Some(ids) = req.organ_ids {
        replace_organizations(&txn, req.user_id, dedup(ids)).await?;
    }
    txn.commit().await?;

    state.cache().invalidate_user(req.user_id);
    tracing::info!("Grants of user {} replaced", req.user_id);
    Ok(Json(ApiResponse::success_msg("success")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some(" bob ".to_string())).as_deref(), Some("bob"));
        assert!(non_empty(Some("  ".to_string())).is_none());
        assert!(non_empty(None).is_none());
    }

    #[test]
    fn test_dedup() {
        assert_eq!(dedup(vec![3, 1, 3, 2, 1]), vec![1, 2, 3]);
    }

    #[test]
    fn test_grant_request_keeps_omitted_lists() {
        let req: UserGrantRequest =
            serde_json::from_str(r#"{"userId": 5, "roleIds": []}"#).unwrap();
        assert_eq!(req.role_ids, Some(vec![]));
        assert!(req.permission_ids.is_none());
        assert!(req.organ_ids.is_none());
    }

    #[tokio::test]
    async fn test_after_user_updated() {
        use crate::service::user::tests::{service, user_with_password, StubStore};
        use std::sync::Arc;

        let svc = service(Arc::new(StubStore::with_users(vec![user_with_password(
            3, "dave", "secret",
        )])));
        let login = svc.login("dave", "secret").await.unwrap();
        svc.role_permission(3).await.unwrap();

        after_user_updated(&svc, 3, false);
        assert!(svc.cache().role_permission(3).is_none());
        assert!(svc.validate_token(&login.token_info.token).is_ok());

        svc.role_permission(3).await.unwrap();
        after_user_updated(&svc, 3, true);
        assert!(svc.cache().role_permission(3).is_none());
        assert!(svc.validate_token(&login.token_info.token).is_err());
    }
}

