//! Per-user role/permission and function caches
//!
//! Entries are filled lazily by the user service. They live until the TTL
//! (when configured) runs out or until a write to roles, permissions,
//! functions or user grants invalidates them.
//!
//! A fill captures the [`CacheEpoch`] before reading the store. Every
//! invalidation bumps the epoch, and a fill whose epoch is out of date is
//! dropped instead of stored.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::entity::function::{self, FunctionType};

/// Role and permission codes of one user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermission {
    pub user_id: i64,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// Functions available to one user, grouped by type
pub type UserFunctions = HashMap<FunctionType, Vec<function::Model>>;

#[derive(Clone)]
struct Entry<T> {
    value: T,
    cached_at: Instant,
}

/// Invalidation generation seen by a cache fill
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheEpoch {
    global: u64,
    user: u64,
}

pub struct InfoCache {
    ttl: Option<Duration>,
    global_epoch: AtomicU64,
    user_epochs: DashMap<i64, u64>,
    permissions: DashMap<i64, Entry<RolePermission>>,
    functions: DashMap<i64, Entry<UserFunctions>>,
}

impl InfoCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            global_epoch: AtomicU64::new(0),
            user_epochs: DashMap::new(),
            permissions: DashMap::new(),
            functions: DashMap::new(),
        }
    }

    /// Current epoch of one user, captured before loading from the store
    pub fn epoch(&self, user_id: i64) -> CacheEpoch {
        CacheEpoch {
            global: self.global_epoch.load(Ordering::SeqCst),
            user: self.user_epochs.get(&user_id).map_or(0, |e| *e),
        }
    }

    fn fresh<T>(&self, entry: &Entry<T>) -> bool {
        self.ttl.map_or(true, |ttl| entry.cached_at.elapsed() < ttl)
    }

    pub fn role_permission(&self, user_id: i64) -> Option<RolePermission> {
        let entry = self.permissions.get(&user_id)?;
        self.fresh(entry.value()).then(|| entry.value().value.clone())
    }

    /// Store a loaded summary unless the user was invalidated since `epoch`.
    /// Returns whether the entry was kept.
    pub fn put_role_permission(&self, epoch: CacheEpoch, value: RolePermission) -> bool {
        let user_id = value.user_id;
        if self.epoch(user_id) != epoch {
            return false;
        }
        self.permissions.insert(
            user_id,
            Entry {
                value,
                cached_at: Instant::now(),
            },
        );
        // an invalidation may have cleared the map between the check and the insert
        if self.epoch(user_id) != epoch {
            self.permissions.remove(&user_id);
            return false;
        }
        true
    }

    pub fn functions(&self, user_id: i64) -> Option<UserFunctions> {
        let entry = self.functions.get(&user_id)?;
        self.fresh(entry.value()).then(|| entry.value().value.clone())
    }

    /// Store loaded functions unless the user was invalidated since `epoch`
    pub fn put_functions(&self, epoch: CacheEpoch, user_id: i64, value: UserFunctions) -> bool {
        if self.epoch(user_id) != epoch {
            return false;
        }
        self.functions.insert(
            user_id,
            Entry {
                value,
                cached_at: Instant::now(),
            },
        );
        if self.epoch(user_id) != epoch {
            self.functions.remove(&user_id);
            return false;
        }
        true
    }

    /// Forget everything cached for one user
    pub fn invalidate_user(&self, user_id: i64) {
        *self.user_epochs.entry(user_id).or_insert(0) += 1;
        self.permissions.remove(&user_id);
        self.functions.remove(&user_id);
    }

    /// Forget everything. Used when roles, permissions or functions change,
    /// since those edits can affect any number of users.
    pub fn invalidate_all(&self) {
        self.global_epoch.fetch_add(1, Ordering::SeqCst);
        self.permissions.clear();
        self.functions.clear();
        tracing::debug!("Permission and function caches cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(user_id: i64) -> RolePermission {
        RolePermission {
            user_id,
            roles: vec!["admin".to_string()],
            permissions: vec!["order:edit".to_string()],
        }
    }

    #[test]
    fn test_put_and_get() {
        let cache = InfoCache::new(None);
        assert!(cache.role_permission(1).is_none());
        assert!(cache.put_role_permission(cache.epoch(1), summary(1)));
        assert_eq!(cache.role_permission(1), Some(summary(1)));
        assert!(cache.role_permission(2).is_none());
    }

    #[test]
    fn test_invalidate_user() {
        let cache = InfoCache::new(None);
        cache.put_role_permission(cache.epoch(1), summary(1));
        cache.put_role_permission(cache.epoch(2), summary(2));
        cache.put_functions(cache.epoch(1), 1, UserFunctions::new());

        cache.invalidate_user(1);
        assert!(cache.role_permission(1).is_none());
        assert!(cache.functions(1).is_none());
        assert!(cache.role_permission(2).is_some());
    }

    #[test]
    fn test_invalidate_all() {
        let cache = InfoCache::new(None);
        cache.put_role_permission(cache.epoch(1), summary(1));
        cache.put_functions(cache.epoch(2), 2, UserFunctions::new());
        cache.invalidate_all();
        assert!(cache.role_permission(1).is_none());
        assert!(cache.functions(2).is_none());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = InfoCache::new(Some(Duration::from_millis(20)));
        cache.put_role_permission(cache.epoch(1), summary(1));
        assert!(cache.role_permission(1).is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.role_permission(1).is_none());
    }

    #[test]
    fn test_fill_after_invalidate_all_is_dropped() {
        let cache = InfoCache::new(None);
        let epoch = cache.epoch(1);
        cache.invalidate_all();

        assert!(!cache.put_role_permission(epoch, summary(1)));
        assert!(!cache.put_functions(epoch, 1, UserFunctions::new()));
        assert!(cache.role_permission(1).is_none());
        assert!(cache.functions(1).is_none());

        assert!(cache.put_role_permission(cache.epoch(1), summary(1)));
    }

    #[test]
    fn test_fill_after_invalidate_user_is_dropped() {
        let cache = InfoCache::new(None);
        let stale = cache.epoch(1);
        let other = cache.epoch(2);
        cache.invalidate_user(1);

        assert!(!cache.put_role_permission(stale, summary(1)));
        assert!(cache.role_permission(1).is_none());
        // other users are unaffected
        assert!(cache.put_role_permission(other, summary(2)));
    }
}
