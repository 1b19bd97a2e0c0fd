//! Dict entity - 数据字典表
//!
//! 表名: sys_dict

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_dict")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 字典编码
    #[sea_orm(column_type = "String(Some(64))")]
    pub code: String,

    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    #[sea_orm(column_type = "String(Some(256))", nullable)]
    pub value: Option<String>,

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

impl ActiveModelBehavior for ActiveModel {}
