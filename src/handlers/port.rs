//! Port handlers

use axum::{
    extract::{Query, State},
    response::Json,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;

use crate::entity::port;
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::common::{existing_id, fetch_page, now, IdQuery, PageQuery, PageResult};
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Create or update request
#[derive(Debug, Deserialize)]
pub struct PortForm {
    pub id: Option<i64>,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
}

impl PortForm {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidParam("port name is required".to_string()));
        }
        if !(-180.0..=180.0).contains(&self.longitude) || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AppError::InvalidParam("coordinates out of range".to_string()));
        }
        Ok(())
    }
}

/// GET /api/port/list
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<PageResult<port::Model>>>> {
    let mut select = port::Entity::find().order_by_asc(port::Column::Name);
    if let Some(like) = query.like() {
        select = select.filter(port::Column::Name.like(like.as_str()));
    }
    Ok(Json(ApiResponse::success(fetch_page(&state.db, select, &query).await?)))
}

/// GET /api/port/get
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<port::Model>>> {
    let found = port::Entity::find_by_id(query.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("port")?;
    Ok(Json(ApiResponse::success(found)))
}

/// POST /api/port/save
pub async fn save(
    State(state): State<AppState>,
    Json(form): Json<PortForm>,
) -> AppResult<Json<ApiResponse<port::Model>>> {
    form.validate()?;
    let id = existing_id(form.id);

    let duplicate = port::Entity::find()
        .filter(port::Column::Name.eq(form.name.trim()))
        .one(&state.db)
        .await?;
    if duplicate.is_some_and(|p| Some(p.id) != id) {
        return Err(AppError::Conflict("port name already exists".to_string()));
    }

    let mut model: port::ActiveModel = match id {
        Some(id) => port::Entity::find_by_id(id)
            .one(&state.db)
            .await?
            .ok_or_not_found("port")?
            .into(),
        None => port::ActiveModel {
            create_time: Set(now()),
            ..Default::default()
        },
    };
    model.name = Set(form.name.trim().to_string());
    model.longitude = Set(form.longitude);
    model.latitude = Set(form.latitude);
    model.update_time = Set(now());

    let saved = if id.is_some() {
        model.update(&state.db).await?
    } else {
        model.insert(&state.db).await?
    };
    Ok(Json(ApiResponse::success(saved)))
}

/// POST /api/port/delete
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    let result = port::Entity::delete_by_id(query.id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("port".to_string()));
    }
    Ok(Json(ApiResponse::success_msg("success")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, longitude: f64, latitude: f64) -> PortForm {
        PortForm {
            id: None,
            name: name.to_string(),
            longitude,
            latitude,
        }
    }

    #[test]
    fn test_validate() {
        assert!(form("Shanghai", 121.5, 31.2).validate().is_ok());
        assert!(form(" ", 121.5, 31.2).validate().is_err());
        assert!(form("Nowhere", 200.0, 0.0).validate().is_err());
        assert!(form("Nowhere", 0.0, -91.0).validate().is_err());
    }
}
