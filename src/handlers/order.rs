//! Order handlers

use axum::{
    extract::{Query, State},
    response::Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;

use crate::entity::order;
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::common::{existing_id, fetch_page, now, IdQuery, PageQuery, PageResult};
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Create or update request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderForm {
    pub id: Option<i64>,
    pub plan_load_time: Option<i64>,
    #[serde(default)]
    pub plan_load_range: i32,
    pub plan_unload_time: Option<i64>,
    pub sender_name: Option<String>,
    pub sender_mobile: Option<String>,
    pub sender_port_id: Option<i64>,
    pub receiver_name: Option<String>,
    pub receiver_mobile: Option<String>,
    pub receiver_port_id: Option<i64>,
    pub cargo_name: Option<String>,
    pub cargo_quantity: Option<f32>,
    pub cargo_weight: Option<f32>,
    pub cargo_bulk: Option<f32>,
    pub deposit: Option<f64>,
    pub prepay: Option<f64>,
    pub fullpay: Option<f64>,
    pub sum_pay: Option<f64>,
}

impl OrderForm {
    fn apply(self, model: &mut order::ActiveModel) {
        model.plan_load_time = Set(self.plan_load_time);
        model.plan_load_range = Set(self.plan_load_range);
        model.plan_unload_time = Set(self.plan_unload_time);
        model.sender_name = Set(self.sender_name);
        model.sender_mobile = Set(self.sender_mobile);
        model.sender_port_id = Set(self.sender_port_id);
        model.receiver_name = Set(self.receiver_name);
        model.receiver_mobile = Set(self.receiver_mobile);
        model.receiver_port_id = Set(self.receiver_port_id);
        model.cargo_name = Set(self.cargo_name);
        model.cargo_quantity = Set(self.cargo_quantity);
        model.cargo_weight = Set(self.cargo_weight);
        model.cargo_bulk = Set(self.cargo_bulk);
        model.deposit = Set(self.deposit);
        model.prepay = Set(self.prepay);
        model.fullpay = Set(self.fullpay);
        model.sum_pay = Set(self.sum_pay);
        model.update_time = Set(now());
    }
}

/// GET /api/order/list
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<PageResult<order::Model>>>> {
    let mut select = order::Entity::find().order_by_desc(order::Column::Id);
    if let Some(like) = query.like() {
        select = select.filter(
            Condition::any()
                .add(order::Column::SenderName.like(like.as_str()))
                .add(order::Column::ReceiverName.like(like.as_str()))
                .add(order::Column::CargoName.like(like.as_str())),
        );
    }
    Ok(Json(ApiResponse::success(fetch_page(&state.db, select, &query).await?)))
}

/// GET /api/order/get
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<order::Model>>> {
    let found = order::Entity::find_by_id(query.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("order")?;
    Ok(Json(ApiResponse::success(found)))
}

/// POST /api/order/save
pub async fn save(
    State(state): State<AppState>,
    Json(form): Json<OrderForm>,
) -> AppResult<Json<ApiResponse<order::Model>>> {
    let saved = match existing_id(form.id) {
        Some(id) => {
            let found = order::Entity::find_by_id(id)
                .one(&state.db)
                .await?
                .ok_or_not_found("order")?;
            let mut model: order::ActiveModel = found.into();
            form.apply(&mut model);
            model.update(&state.db).await?
        }
        None => {
            let mut model = order::ActiveModel {
                create_time: Set(now()),
                ..Default::default()
            };
            form.apply(&mut model);
            model.insert(&state.db).await?
        }
    };
    tracing::info!("Order {} saved", saved.id);
    Ok(Json(ApiResponse::success(saved)))
}

/// POST /api/order/delete
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    let result = order::Entity::delete_by_id(query.id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("order".to_string()));
    }
    tracing::info!("Order {} deleted", query.id);
    Ok(Json(ApiResponse::success_msg("success")))
}
