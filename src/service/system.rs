//! Menu tree and region tree assembly

use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::entity::function::{self, FunctionType, MenuTree};
use crate::entity::region::{self, RegionTree, LEVEL_CITY, LEVEL_DISTRICT, LEVEL_PROVINCE};
use crate::error::AppResult;
use crate::service::tree::parse_id_path;
use crate::service::UserService;

/// Nest menu nodes by their `id_path`.
///
/// Shallower nodes are placed first. Each node descends through its
/// ancestors as far as they exist and is appended to the list reached, so
/// a node with a missing ancestor stays at the deepest level found.
pub fn assemble_menu_tree(menus: Vec<function::Model>) -> Vec<MenuTree> {
    let mut by_depth: BTreeMap<usize, Vec<(Vec<i64>, MenuTree)>> = BTreeMap::new();
    for menu in menus {
        let path = parse_id_path(&menu.id_path);
        by_depth
            .entry(path.len())
            .or_default()
            .push((path, MenuTree::from(menu)));
    }

    let mut roots: Vec<MenuTree> = Vec::new();
    for (path, node) in by_depth.into_values().flatten() {
        let ancestors = &path[..path.len().saturating_sub(1)];
        let mut level = &mut roots;
        for ancestor in ancestors {
            let Some(i) = level.iter().position(|n| n.id == *ancestor) else {
                break;
            };
            let tmp = level;
            level = &mut tmp[i].children;
        }
        level.push(node);
    }
    roots
}

/// Nest districts under cities and cities under provinces by code.
/// Regions whose parent is missing are dropped.
pub fn assemble_region_tree(regions: Vec<region::Model>) -> Vec<RegionTree> {
    let mut provinces = Vec::new();
    let mut cities = Vec::new();
    let mut districts: HashMap<String, Vec<RegionTree>> = HashMap::new();

    for r in regions {
        match r.level {
            LEVEL_PROVINCE => provinces.push(RegionTree::from(r)),
            LEVEL_CITY => cities.push(RegionTree::from(r)),
            LEVEL_DISTRICT => match r.parent_code.clone() {
                Some(parent) => districts.entry(parent).or_default().push(RegionTree::from(r)),
                None => tracing::warn!("District {} has no parent code", r.code),
            },
            other => tracing::warn!("Region {} has unknown level {}", r.code, other),
        }
    }

    let mut city_groups: HashMap<String, Vec<RegionTree>> = HashMap::new();
    for mut city in cities {
        city.children = districts.remove(&city.value).unwrap_or_default();
        match city.parent.clone() {
            Some(parent) => city_groups.entry(parent).or_default().push(city),
            None => tracing::warn!("City {} has no parent code", city.value),
        }
    }

    for province in provinces.iter_mut() {
        province.children = city_groups.remove(&province.value).unwrap_or_default();
    }

    for (parent, orphans) in districts.iter().chain(city_groups.iter()) {
        tracing::warn!("Dropped {} region(s) with missing parent {}", orphans.len(), parent);
    }

    provinces
}

pub struct SystemService {
    db: DatabaseConnection,
    users: Arc<UserService>,
}

impl SystemService {
    pub fn new(db: DatabaseConnection, users: Arc<UserService>) -> Self {
        Self { db, users }
    }

    /// Menu tree of the functions available to a user
    pub async fn menus(&self, user_id: i64) -> AppResult<Vec<MenuTree>> {
        let mut functions = self.users.user_functions(user_id).await?;
        let menus = functions.remove(&FunctionType::Menu).unwrap_or_default();
        Ok(assemble_menu_tree(menus))
    }

    pub async fn regions(&self) -> AppResult<Vec<RegionTree>> {
        let regions = region::Entity::find()
            .order_by_asc(region::Column::Code)
            .all(&self.db)
            .await?;
        Ok(assemble_region_tree(regions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu(id: i64, id_path: &str) -> function::Model {
        function::Model {
            id,
            name: format!("menu-{}", id),
            code: format!("menu:{}", id),
            function_type: FunctionType::Menu.into(),
            link: None,
            icon: None,
            parent_id: None,
            id_path: id_path.to_string(),
            permission_id: None,
            order_no: 0.0,
            create_time: 0,
            update_time: 0,
        }
    }

    fn region(code: &str, level: i32, parent: Option<&str>) -> region::Model {
        region::Model {
            id: 0,
            code: code.to_string(),
            name: code.to_string(),
            level,
            parent_code: parent.map(str::to_string),
        }
    }

    #[test]
    fn test_menu_chain() {
        let tree = assemble_menu_tree(vec![menu(3, "1,2,3"), menu(1, "1"), menu(2, "1,2")]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, 1);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].id, 2);
        assert_eq!(tree[0].children[0].children[0].id, 3);
    }

    #[test]
    fn test_menu_siblings_keep_order() {
        let tree = assemble_menu_tree(vec![
            menu(1, "1"),
            menu(5, "1,5"),
            menu(4, "1,4"),
            menu(9, "9"),
        ]);
        assert_eq!(tree.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 9]);
        assert_eq!(
            tree[0].children.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![5, 4]
        );
    }

    #[test]
    fn test_menu_missing_ancestor() {
        // 2 is not granted: 3 lands under 1, 8 has no known ancestor
        let tree = assemble_menu_tree(vec![menu(1, "1"), menu(3, "1,2,3"), menu(8, "7.8")]);
        assert_eq!(tree.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 8]);
        assert_eq!(tree[0].children[0].id, 3);
    }

    #[test]
    fn test_region_tree() {
        let tree = assemble_region_tree(vec![
            region("110000", LEVEL_PROVINCE, None),
            region("110100", LEVEL_CITY, Some("110000")),
            region("110101", LEVEL_DISTRICT, Some("110100")),
            region("110102", LEVEL_DISTRICT, Some("110100")),
            region("110200", LEVEL_CITY, Some("110000")),
            region("120000", LEVEL_PROVINCE, None),
            region("990100", LEVEL_CITY, Some("990000")),
            region("990101", LEVEL_DISTRICT, Some("990199")),
        ]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].value, "110000");
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].children.len(), 2);
        assert_eq!(tree[0].children[0].children[1].value, "110102");
        assert!(tree[0].children[1].children.is_empty());
        assert!(tree[1].children.is_empty());
    }
}
