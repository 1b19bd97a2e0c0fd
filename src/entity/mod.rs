//! Entity module - SeaORM 实体定义
//!
//! 包含所有数据库表对应的实体模型

pub mod dict;
pub mod file;
pub mod function;
pub mod order;
pub mod organization;
pub mod permission;
pub mod port;
pub mod region;
pub mod role;
pub mod role_permission;
pub mod user;
pub mod user_organization;
pub mod user_permission;
pub mod user_role;
