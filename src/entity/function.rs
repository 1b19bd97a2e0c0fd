//! Function entity - 功能表 (菜单与API)
//!
//! 表名: sys_function

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 功能类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionType {
    /// 菜单
    Menu = 1,
    /// 接口
    Api = 2,
}

impl TryFrom<i32> for FunctionType {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FunctionType::Menu),
            2 => Ok(FunctionType::Api),
            other => Err(other),
        }
    }
}

impl From<FunctionType> for i32 {
    fn from(function_type: FunctionType) -> Self {
        function_type as i32
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_function")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    /// 功能编码，API 类型即路由编码
    #[sea_orm(column_type = "String(Some(128))", unique)]
    pub code: String,

    /// 功能类型: 1=菜单, 2=API
    pub function_type: i32,

    #[sea_orm(column_type = "String(Some(256))", nullable)]
    pub link: Option<String>,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub icon: Option<String>,

    #[sea_orm(nullable)]
    pub parent_id: Option<i64>,

    /// 祖先ID路径, 以逗号分隔, 包含自身
    #[sea_orm(column_type = "String(Some(256))")]
    pub id_path: String,

    /// 所需权限ID (空表示登录用户均可访问)
    #[sea_orm(nullable)]
    pub permission_id: Option<i64>,

    /// 排序号
    pub order_no: f32,

    #[serde(default)]
    pub create_time: i64,

    #[serde(default)]
    pub update_time: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn function_type(&self) -> Option<FunctionType> {
        FunctionType::try_from(self.function_type).ok()
    }
}

/// 菜单树节点 (用于API响应)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuTree {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub id_path: String,
    pub children: Vec<MenuTree>,
}

impl From<Model> for MenuTree {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            code: model.code,
            icon: model.icon,
            link: model.link,
            id_path: model.id_path,
            children: Vec::new(),
        }
    }
}
