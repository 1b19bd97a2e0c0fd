//! Role entity - 角色表
//!
//! 表名: sys_role

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 内置管理员角色编码
pub const ADMIN_ROLE: &str = "admin";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_role")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 角色编码 (唯一)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub code: String,

    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    #[sea_orm(column_type = "String(Some(256))", nullable)]
    pub description: Option<String>,

    #[serde(default)]
    pub create_time: i64,

    #[serde(default)]
    pub update_time: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
