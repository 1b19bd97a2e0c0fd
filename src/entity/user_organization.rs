//! UserOrganization entity - 用户所属机构关联表
//!
//! 表名: sys_user_organ

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_user_organ")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 用户ID
    pub user_id: i64,

    /// 机构ID
    pub organ_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
