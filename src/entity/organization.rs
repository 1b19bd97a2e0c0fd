//! Organization entity - 机构表
//!
//! 表名: sys_organization

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_organization")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 机构名称
    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    /// 机构编码 (唯一)
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub code: String,

    /// 上级机构ID (空表示顶级机构)
    #[sea_orm(nullable)]
    pub parent_id: Option<i64>,

    /// 祖先ID路径, 以逗号分隔, 包含自身
    #[sea_orm(column_type = "String(Some(256))")]
    pub id_path: String,

    #[serde(default)]
    pub create_time: i64,

    #[serde(default)]
    pub update_time: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 自引用关系通过 id_path 处理，避免递归查询

impl ActiveModelBehavior for ActiveModel {}
