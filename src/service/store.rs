//! Data access used by authentication
//!
//! `UserStore` keeps the login and permission logic independent of the
//! database so it can run against stubs.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::cache::RolePermission;
use crate::entity::user::UserType;
use crate::entity::{file, function, permission, role, role_permission, user, user_permission, user_role};
use crate::error::AppResult;

/// Profile used to register a user on first third-party login
#[derive(Debug, Clone, Default)]
pub struct NewWechatUser {
    pub open_id: String,
    pub nickname: Option<String>,
    pub head_img_url: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: i64) -> AppResult<Option<user::Model>>;

    async fn find_by_user_name(&self, user_name: &str) -> AppResult<Option<user::Model>>;

    async fn find_by_open_id(&self, open_id: &str) -> AppResult<Option<user::Model>>;

    async fn create_wechat_user(&self, profile: NewWechatUser) -> AppResult<user::Model>;

    /// Role codes and permission codes (direct and via roles) of a user
    async fn role_permission(&self, user_id: i64) -> AppResult<RolePermission>;

    /// Functions with no permission or with one of `permission_codes`
    async fn functions_for(&self, permission_codes: &[String]) -> AppResult<Vec<function::Model>>;
}

pub struct DbUserStore {
    db: DatabaseConnection,
}

impl DbUserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn push_unique(target: &mut Vec<String>, value: String) {
    if !target.contains(&value) {
        target.push(value);
    }
}

#[async_trait]
impl UserStore for DbUserStore {
    async fn get(&self, id: i64) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_by_user_name(&self, user_name: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::UserName.eq(user_name))
            .one(&self.db)
            .await?)
    }

    async fn find_by_open_id(&self, open_id: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::OpenId.eq(open_id))
            .one(&self.db)
            .await?)
    }

    async fn create_wechat_user(&self, profile: NewWechatUser) -> AppResult<user::Model> {
        let now = chrono::Utc::now().timestamp();
        let txn = self.db.begin().await?;

        let head_img_id = match profile.head_img_url.filter(|url| !url.is_empty()) {
            Some(url) => {
                let guid = uuid::Uuid::new_v4().to_string();
                let head_img = file::ActiveModel {
                    guid: Set(guid.clone()),
                    origin_name: Set(url.rsplit('/').next().unwrap_or_default().to_string()),
                    file_name: Set(guid),
                    file_path: Set(url),
                    extension: Set(None),
                    size: Set(0),
                    create_time: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                Some(head_img.id)
            }
            None => None,
        };

        let created = user::ActiveModel {
            active: Set(true),
            nickname: Set(profile.nickname),
            head_img_id: Set(head_img_id),
            open_id: Set(Some(profile.open_id)),
            user_type: Set(UserType::Wechat.into()),
            create_time: Set(now),
            update_time: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(created)
    }

    async fn role_permission(&self, user_id: i64) -> AppResult<RolePermission> {
        let role_ids: Vec<i64> = user_role::Entity::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|r| r.role_id)
            .collect();

        let mut roles = Vec::new();
        if !role_ids.is_empty() {
            for r in role::Entity::find()
                .filter(role::Column::Id.is_in(role_ids.clone()))
                .order_by_asc(role::Column::Id)
                .all(&self.db)
                .await?
            {
                push_unique(&mut roles, r.code);
            }
        }

        let mut permission_ids: Vec<i64> = user_permission::Entity::find()
            .filter(user_permission::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| p.permission_id)
            .collect();
        if !role_ids.is_empty() {
            permission_ids.extend(
                role_permission::Entity::find()
                    .filter(role_permission::Column::RoleId.is_in(role_ids))
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .map(|p| p.permission_id),
            );
        }

        let mut permissions = Vec::new();
        if !permission_ids.is_empty() {
            let found = permission::Entity::find()
                .filter(permission::Column::Id.is_in(permission_ids.clone()))
                .all(&self.db)
                .await?;
            // keep grant order: direct grants first, then role grants
            for id in permission_ids {
                if let Some(p) = found.iter().find(|p| p.id == id) {
                    push_unique(&mut permissions, p.code.clone());
                }
            }
        }

        Ok(RolePermission {
            user_id,
            roles,
            permissions,
        })
    }

    async fn functions_for(&self, permission_codes: &[String]) -> AppResult<Vec<function::Model>> {
        let mut condition = Condition::any().add(function::Column::PermissionId.is_null());
        if !permission_codes.is_empty() {
            let permission_ids: Vec<i64> = permission::Entity::find()
                .filter(permission::Column::Code.is_in(permission_codes.to_vec()))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect();
            if !permission_ids.is_empty() {
                condition = condition.add(function::Column::PermissionId.is_in(permission_ids));
            }
        }

        Ok(function::Entity::find()
            .filter(condition)
            .order_by_asc(function::Column::OrderNo)
            .order_by_asc(function::Column::Id)
            .all(&self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_unique_keeps_first_occurrence() {
        let mut codes = vec!["a".to_string()];
        push_unique(&mut codes, "b".to_string());
        push_unique(&mut codes, "a".to_string());
        assert_eq!(codes, vec!["a", "b"]);
    }
}
