//! UserPermission entity - 用户权限关联表
//!
//! 表名: sys_user_permission

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_user_permission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 用户ID
    pub user_id: i64,

    /// 权限ID
    pub permission_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
