//! `id_path` maintenance for self-referencing tables
//!
//! An `id_path` lists the ancestor ids of a record followed by its own id,
//! separated by commas, e.g. `1,4,9`.

use sea_orm::{ConnectionTrait, Statement, Value};

use crate::error::{AppError, AppResult};

/// Split a path into ids. Both ',' and '.' are accepted as separators.
pub fn parse_id_path(path: &str) -> Vec<i64> {
    path.split([',', '.'])
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

/// Path of a record with `id` placed under a parent with `parent_path`
pub fn child_id_path(parent_path: Option<&str>, id: i64) -> String {
    match parent_path.filter(|p| !p.is_empty()) {
        Some(parent) => format!("{},{}", parent, id),
        None => id.to_string(),
    }
}

/// A parent whose path already contains `id` would close a loop
pub fn creates_cycle(id: i64, parent_path: &str) -> bool {
    parse_id_path(parent_path).contains(&id)
}

/// Rewrite `path` if it lies under `old_prefix`
pub fn rebase_id_path(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if path == old_prefix {
        return Some(new_prefix.to_string());
    }
    path.strip_prefix(old_prefix)
        .filter(|rest| rest.starts_with(','))
        .map(|rest| format!("{}{}", new_prefix, rest))
}

/// Reject a parent that is the record itself or one of its descendants
pub fn check_parent(id: i64, parent_id: Option<i64>, parent_path: Option<&str>) -> AppResult<()> {
    if parent_id == Some(id) || parent_path.is_some_and(|p| creates_cycle(id, p)) {
        return Err(AppError::InvalidParam(
            "parent cannot be the record itself or one of its descendants".to_string(),
        ));
    }
    Ok(())
}

/// Rewrite the `id_path` prefix of every descendant after a move
pub async fn rebase_descendants<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    old_path: &str,
    new_path: &str,
) -> AppResult<u64> {
    if old_path == new_path {
        return Ok(0);
    }
    let backend = conn.get_database_backend();
    let rows = conn
        .query_all(Statement::from_sql_and_values(
            backend,
            format!("SELECT id, id_path FROM {} WHERE id_path LIKE $1", table),
            [Value::from(format!("{},%", old_path))],
        ))
        .await?;

    let mut rebased = 0;
    for row in rows {
        let id: i64 = row.try_get("", "id")?;
        let path: String = row.try_get("", "id_path")?;
        let Some(moved) = rebase_id_path(&path, old_path, new_path) else {
            continue;
        };
        conn.execute(Statement::from_sql_and_values(
            backend,
            format!("UPDATE {} SET id_path = $1 WHERE id = $2", table),
            [Value::from(moved), Value::from(id)],
        ))
        .await?;
        rebased += 1;
    }
    tracing::debug!(
        "Rebased {} descendant(s) in {} from {} to {}",
        rebased,
        table,
        old_path,
        new_path
    );
    Ok(rebased)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_path() {
        assert_eq!(parse_id_path("1,2,3"), vec![1, 2, 3]);
        assert_eq!(parse_id_path("1.2"), vec![1, 2]);
        assert_eq!(parse_id_path("7"), vec![7]);
        assert!(parse_id_path("").is_empty());
    }

    #[test]
    fn test_child_id_path() {
        assert_eq!(child_id_path(None, 5), "5");
        assert_eq!(child_id_path(Some(""), 5), "5");
        assert_eq!(child_id_path(Some("1,2"), 5), "1,2,5");
    }

    #[test]
    fn test_cycle_detection() {
        assert!(creates_cycle(2, "1,2,3"));
        assert!(!creates_cycle(2, "1,12,3"));
        assert!(check_parent(3, Some(3), None).is_err());
        assert!(check_parent(2, Some(3), Some("1,2,3")).is_err());
        assert!(check_parent(4, Some(3), Some("1,2,3")).is_ok());
        assert!(check_parent(4, None, None).is_ok());
    }

    #[test]
    fn test_rebase_id_path() {
        assert_eq!(rebase_id_path("1,2", "1,2", "5,2").as_deref(), Some("5,2"));
        assert_eq!(rebase_id_path("1,2,7,8", "1,2", "5,2").as_deref(), Some("5,2,7,8"));
        assert_eq!(rebase_id_path("1,22,7", "1,2", "5,2"), None);
        assert_eq!(rebase_id_path("3,4", "1,2", "5,2"), None);
    }

    #[tokio::test]
    async fn test_rebase_descendants_moves_subtree() {
        use sea_orm::{DbBackend, MockDatabase, MockExecResult, Transaction};
        use std::collections::BTreeMap;

        fn row(id: i64, path: &str) -> BTreeMap<&'static str, Value> {
            BTreeMap::from([("id", Value::from(id)), ("id_path", Value::from(path))])
        }
        let updated = || MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        };

        // node 2 moves from under 1 to under 5; 3 and 4 sit one and two levels below it
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![row(3, "1,2,3"), row(4, "1,2,3,4")]])
            .append_exec_results([updated(), updated()])
            .into_connection();

        let moved = rebase_descendants(&db, "sys_organization", "1,2", "5,2")
            .await
            .unwrap();
        assert_eq!(moved, 2);

        assert_eq!(
            db.into_transaction_log(),
            vec![
                Transaction::from_sql_and_values(
                    DbBackend::Postgres,
                    "SELECT id, id_path FROM sys_organization WHERE id_path LIKE $1",
                    [Value::from("1,2,%")],
                ),
                Transaction::from_sql_and_values(
                    DbBackend::Postgres,
                    "UPDATE sys_organization SET id_path = $1 WHERE id = $2",
                    [Value::from("5,2,3"), Value::from(3i64)],
                ),
                Transaction::from_sql_and_values(
                    DbBackend::Postgres,
                    "UPDATE sys_organization SET id_path = $1 WHERE id = $2",
                    [Value::from("5,2,3,4"), Value::from(4i64)],
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_rebase_descendants_unchanged_path_is_noop() {
        use sea_orm::{DbBackend, MockDatabase};

        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        assert_eq!(rebase_descendants(&db, "sys_dict", "1,2", "1,2").await.unwrap(), 0);
        assert!(db.into_transaction_log().is_empty());
    }
}

