//! Region handlers

use axum::{
    extract::{Query, State},
    response::Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;

use crate::entity::region::{self, LEVEL_DISTRICT, LEVEL_PROVINCE};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::common::{existing_id, fetch_page, IdQuery, PageQuery, PageResult};
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Create or update request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionForm {
    pub id: Option<i64>,
    pub code: String,
    pub name: String,
    pub level: i32,
    pub parent_code: Option<String>,
}

impl RegionForm {
    fn parent_code(&self) -> Option<&str> {
        self.parent_code.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    fn validate(&self) -> AppResult<()> {
        if self.code.trim().is_empty() || self.name.trim().is_empty() {
            return Err(AppError::InvalidParam("region code and name are required".to_string()));
        }
        if !(LEVEL_PROVINCE..=LEVEL_DISTRICT).contains(&self.level) {
            return Err(AppError::InvalidParam(format!("unknown region level {}", self.level)));
        }
        match (self.level, self.parent_code()) {
            (LEVEL_PROVINCE, Some(_)) => Err(AppError::InvalidParam(
                "a province has no parent".to_string(),
            )),
            (LEVEL_PROVINCE, None) => Ok(()),
            (_, None) => Err(AppError::InvalidParam("parent code is required".to_string())),
            (_, Some(parent)) if parent == self.code.trim() => Err(AppError::InvalidParam(
                "a region cannot be its own parent".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// GET /api/region/list
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<PageResult<region::Model>>>> {
    let mut select = region::Entity::find().order_by_asc(region::Column::Code);
    if let Some(like) = query.like() {
        select = select.filter(
            Condition::any()
                .add(region::Column::Code.like(like.as_str()))
                .add(region::Column::Name.like(like.as_str())),
        );
    }
    Ok(Json(ApiResponse::success(fetch_page(&state.db, select, &query).await?)))
}

/// GET /api/region/get
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<region::Model>>> {
    let found = region::Entity::find_by_id(query.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("region")?;
    Ok(Json(ApiResponse::success(found)))
}

/// POST /api/region/save
pub async fn save(
    State(state): State<AppState>,
    Json(form): Json<RegionForm>,
) -> AppResult<Json<ApiResponse<region::Model>>> {
    form.validate()?;
    let id = existing_id(form.id);
    let code = form.code.trim().to_string();

    let duplicate = region::Entity::find()
        .filter(region::Column::Code.eq(code.as_str()))
        .one(&state.db)
        .await?;
    if duplicate.is_some_and(|r| Some(r.id) != id) {
        return Err(AppError::Conflict(format!("region code {} already exists", code)));
    }

    if let Some(parent_code) = form.parent_code() {
        let parent = region::Entity::find()
            .filter(region::Column::Code.eq(parent_code))
            .one(&state.db)
            .await?
            .ok_or_not_found("parent region")?;
        if parent.level != form.level - 1 {
            return Err(AppError::InvalidParam(
                "parent must be one level above".to_string(),
            ));
        }
    }

    let mut model: region::ActiveModel = match id {
        Some(id) => region::Entity::find_by_id(id)
            .one(&state.db)
            .await?
            .ok_or_not_found("region")?
            .into(),
        None => Default::default(),
    };
    model.code = Set(code);
    model.name = Set(form.name.trim().to_string());
    model.level = Set(form.level);
    model.parent_code = Set(form.parent_code().map(str::to_string));

    let saved = if id.is_some() {
        model.update(&state.db).await?
    } else {
        model.insert(&state.db).await?
    };
    Ok(Json(ApiResponse::success(saved)))
}

/// POST /api/region/delete
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    let found = region::Entity::find_by_id(query.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("region")?;

    let children = region::Entity::find()
        .filter(region::Column::ParentCode.eq(found.code.as_str()))
        .count(&state.db)
        .await?;
    if children > 0 {
        return Err(AppError::Conflict("region still has sub-regions".to_string()));
    }

    region::Entity::delete_by_id(found.id).exec(&state.db).await?;
    Ok(Json(ApiResponse::success_msg("success")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::region::LEVEL_CITY;

    fn form(code: &str, level: i32, parent: Option<&str>) -> RegionForm {
        RegionForm {
            id: None,
            code: code.to_string(),
            name: code.to_string(),
            level,
            parent_code: parent.map(str::to_string),
        }
    }

    #[test]
    fn test_validate() {
        assert!(form("110000", LEVEL_PROVINCE, None).validate().is_ok());
        assert!(form("110000", LEVEL_PROVINCE, Some("1")).validate().is_err());
        assert!(form("110100", LEVEL_CITY, Some("110000")).validate().is_ok());
        assert!(form("110100", LEVEL_CITY, None).validate().is_err());
        assert!(form("110100", LEVEL_CITY, Some("110100")).validate().is_err());
        assert!(form("110101", 4, Some("110100")).validate().is_err());
    }
}
