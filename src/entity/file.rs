//! File entity - 文件信息表
//!
//! 只记录文件元数据
//! 表名: sys_file

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_file")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(36))", unique)]
    pub guid: String,

    /// 原始文件名
    #[sea_orm(column_type = "String(Some(256))")]
    pub origin_name: String,

    /// 存储文件名
    #[sea_orm(column_type = "String(Some(256))")]
    pub file_name: String,

    /// 存储路径或URL
    #[sea_orm(column_type = "String(Some(512))")]
    pub file_path: String,

    #[sea_orm(column_type = "String(Some(16))", nullable)]
    pub extension: Option<String>,

    /// 文件大小 (字节)
    pub size: i64,

    pub create_time: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
