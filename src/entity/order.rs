//! Order entity - 运单表
//!
//! 表名: biz_order

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "biz_order")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 计划装货时间 (Unix 时间戳)
    #[sea_orm(nullable)]
    pub plan_load_time: Option<i64>,

    /// 计划装货时间范围，单位：天
    pub plan_load_range: i32,

    /// 计划卸货时间 (Unix 时间戳)
    #[sea_orm(nullable)]
    pub plan_unload_time: Option<i64>,

    /// 发货人姓名
    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub sender_name: Option<String>,

    /// 发货人电话
    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub sender_mobile: Option<String>,

    /// 发货港ID
    #[sea_orm(nullable)]
    pub sender_port_id: Option<i64>,

    /// 收货人姓名
    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub receiver_name: Option<String>,

    /// 收货人电话
    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub receiver_mobile: Option<String>,

    /// 收货港ID
    #[sea_orm(nullable)]
    pub receiver_port_id: Option<i64>,

    /// 货物名称
    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub cargo_name: Option<String>,

    /// 货物数量
    #[sea_orm(nullable)]
    pub cargo_quantity: Option<f32>,

    /// 货物重量
    #[sea_orm(nullable)]
    pub cargo_weight: Option<f32>,

    /// 货物体积
    #[sea_orm(nullable)]
    pub cargo_bulk: Option<f32>,

    /// 定金
    #[sea_orm(nullable)]
    pub deposit: Option<f64>,

    /// 预付款
    #[sea_orm(nullable)]
    pub prepay: Option<f64>,

    /// 尾款
    #[sea_orm(nullable)]
    pub fullpay: Option<f64>,

    /// 总运费
    #[sea_orm(nullable)]
    pub sum_pay: Option<f64>,

    #[serde(default)]
    pub create_time: i64,

    #[serde(default)]
    pub update_time: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 港口关系通过 sender_port_id / receiver_port_id 手动查询

impl ActiveModelBehavior for ActiveModel {}
