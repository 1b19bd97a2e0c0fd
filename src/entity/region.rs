//! Region entity - 行政区划表
//!
//! 表名: sys_region

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 省
pub const LEVEL_PROVINCE: i32 = 1;
/// 市
pub const LEVEL_CITY: i32 = 2;
/// 区县
pub const LEVEL_DISTRICT: i32 = 3;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_region")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 区划编码 (唯一)
    #[sea_orm(column_type = "String(Some(16))", unique)]
    pub code: String,

    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    /// 级别: 1=省, 2=市, 3=区县
    pub level: i32,

    /// 上级区划编码
    #[sea_orm(column_type = "String(Some(16))", nullable)]
    pub parent_code: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// 区划树节点 (用于API响应)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionTree {
    pub value: String,
    pub label: String,
    pub level: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RegionTree>,
}

impl From<Model> for RegionTree {
    fn from(model: Model) -> Self {
        Self {
            value: model.code,
            label: model.name,
            level: model.level,
            parent: model.parent_code,
            children: Vec::new(),
        }
    }
}
