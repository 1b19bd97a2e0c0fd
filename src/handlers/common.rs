//! Query and paging types shared by the CRUD handlers

use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, Select};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 500;

/// Query parameters for get and delete
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: i64,
}

/// Query parameters for list
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// 1-based page number
    pub page: Option<u64>,
    pub size: Option<u64>,
    pub keyword: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn size(&self) -> u64 {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Keyword for a `LIKE` filter, if any
    pub fn like(&self) -> Option<String> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| format!("%{}%", k))
    }
}

/// One page of results
#[derive(Debug, Serialize)]
pub struct PageResult<T: Serialize> {
    pub total: u64,
    pub page: u64,
    pub size: u64,
    pub items: Vec<T>,
}

impl<T: Serialize> PageResult<T> {
    pub fn map<U: Serialize>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            total: self.total,
            page: self.page,
            size: self.size,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Run a select one page at a time
pub async fn fetch_page<E>(
    db: &DatabaseConnection,
    select: Select<E>,
    query: &PageQuery,
) -> AppResult<PageResult<E::Model>>
where
    E: EntityTrait,
    E::Model: Serialize + Sync,
{
    let (page, size) = (query.page(), query.size());
    let paginator = select.paginate(db, size);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page - 1).await?;
    Ok(PageResult {
        total,
        page,
        size,
        items,
    })
}

/// Current unix time in seconds
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// `Some(id)` for an update, `None` for a create
pub fn existing_id(id: Option<i64>) -> Option<i64> {
    id.filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_bounds() {
        let query = PageQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.size(), DEFAULT_PAGE_SIZE);

        let query = PageQuery {
            page: Some(0),
            size: Some(10_000),
            keyword: Some("  ".to_string()),
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.size(), MAX_PAGE_SIZE);
        assert!(query.like().is_none());
    }

    #[test]
    fn test_like_keyword() {
        let query = PageQuery {
            keyword: Some(" port ".to_string()),
            ..Default::default()
        };
        assert_eq!(query.like().as_deref(), Some("%port%"));
    }

    #[test]
    fn test_existing_id() {
        assert_eq!(existing_id(None), None);
        assert_eq!(existing_id(Some(0)), None);
        assert_eq!(existing_id(Some(7)), Some(7));
    }
}
