//! User entity - 系统用户表
//!
//! 表名: sys_user

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用户类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    /// 管理员
    Admin = 0,
    /// 普通用户
    Normal = 1,
    /// 微信用户
    Wechat = 2,
}

impl From<i32> for UserType {
    fn from(value: i32) -> Self {
        match value {
            0 => UserType::Admin,
            2 => UserType::Wechat,
            _ => UserType::Normal,
        }
    }
}

impl From<UserType> for i32 {
    fn from(user_type: UserType) -> Self {
        user_type as i32
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 用户名 (唯一)
    #[sea_orm(column_type = "String(Some(32))", unique, nullable)]
    pub user_name: Option<String>,

    /// 密码摘要: sha256(密码 + 盐)
    #[sea_orm(column_type = "String(Some(64))", nullable)]
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// 盐
    #[sea_orm(column_type = "String(Some(16))", nullable)]
    #[serde(skip_serializing)]
    pub salt: Option<String>,

    /// 是否有效
    pub active: bool,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub nickname: Option<String>,

    #[sea_orm(column_type = "String(Some(32))", nullable)]
    pub real_name: Option<String>,

    /// 头像文件ID
    #[sea_orm(nullable)]
    pub head_img_id: Option<i64>,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub email: Option<String>,

    /// 手机号 (唯一)
    #[sea_orm(column_type = "String(Some(14))", unique, nullable)]
    pub mobile: Option<String>,

    /// 微信 openId
    #[sea_orm(column_type = "String(Some(64))", nullable, indexed)]
    pub open_id: Option<String>,

    /// 用户类型: 0=管理员, 1=普通用户, 2=微信用户
    pub user_type: i32,

    #[sea_orm(column_type = "String(Some(128))", nullable)]
    pub about: Option<String>,

    /// 登记机构ID
    #[sea_orm(nullable)]
    pub organ_id: Option<i64>,

    pub create_time: i64,

    pub update_time: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 角色、权限、机构通过关联表手动查询

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn user_type(&self) -> UserType {
        UserType::from(self.user_type)
    }

    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn has_open_id(&self) -> bool {
        self.open_id.as_deref().is_some_and(|o| !o.is_empty())
    }
}

/// 用户摘要 (不含密码和盐)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub user_name: Option<String>,
    pub nickname: Option<String>,
    pub real_name: Option<String>,
    pub head_img_id: Option<i64>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub user_type: i32,
    pub active: bool,
    pub organ_id: Option<i64>,
    pub create_time: i64,
}

impl From<Model> for UserSummary {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_name: model.user_name,
            nickname: model.nickname,
            real_name: model.real_name,
            head_img_id: model.head_img_id,
            email: model.email,
            mobile: model.mobile,
            user_type: model.user_type,
            active: model.active,
            organ_id: model.organ_id,
            create_time: model.create_time,
        }
    }
}
