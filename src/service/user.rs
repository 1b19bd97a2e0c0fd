//! User service
//!
//! Authentication, the three login flows, and the per-user permission and
//! function caches used to authorize API routes.

use serde::Serialize;
use std::sync::Arc;

use crate::cache::{InfoCache, RolePermission, UserFunctions};
use crate::crypto::hash_password;
use crate::entity::function::FunctionType;
use crate::entity::user::{self, UserSummary};
use crate::error::{AppError, AppResult};
use crate::secret::{SecretManager, SECRET_TYPE_OPEN_ID, SECRET_TYPE_PASSWORD};
use crate::service::store::{NewWechatUser, UserStore};
use crate::wx::OAuthProvider;

/// Issued login key as returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySummary {
    pub key: String,
    pub expired_in: u64,
    pub generate_time: i64,
}

/// Issued token as returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSummary {
    pub token: String,
    pub expired_in: u64,
    pub generate_time: i64,
}

/// Result of every successful login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInfo {
    pub user_id: i64,
    pub key_info: KeySummary,
    pub token_info: TokenSummary,
    pub user_info: UserSummary,
}

pub struct UserService {
    store: Arc<dyn UserStore>,
    secrets: SecretManager,
    cache: Arc<InfoCache>,
    oauth: Arc<dyn OAuthProvider>,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        secrets: SecretManager,
        cache: Arc<InfoCache>,
        oauth: Arc<dyn OAuthProvider>,
    ) -> Self {
        Self {
            store,
            secrets,
            cache,
            oauth,
        }
    }

    pub fn secrets(&self) -> &SecretManager {
        &self.secrets
    }

    pub fn cache(&self) -> &InfoCache {
        &self.cache
    }

    /// Look a user up by numeric id, then by user name
    async fn find_user(&self, identity: &str) -> AppResult<Option<user::Model>> {
        if let Ok(id) = identity.parse::<i64>() {
            if let Some(found) = self.store.get(id).await? {
                return Ok(Some(found));
            }
        }
        self.store.find_by_user_name(identity).await
    }

    /// Check a plaintext secret against the stored salted digest.
    /// An unknown user is `false`, not an error.
    pub async fn authenticate(&self, identity: &str, secret: &str) -> AppResult<bool> {
        if identity.is_empty() || secret.is_empty() {
            return Ok(false);
        }
        let Some(found) = self.find_user(identity).await? else {
            return Ok(false);
        };
        Ok(password_matches(&found, secret))
    }

    /// Password login
    pub async fn login(&self, identity: &str, password: &str) -> AppResult<LoginInfo> {
        if !self.authenticate(identity, password).await? {
            tracing::warn!("Login failed for {}", identity);
            return Err(AppError::InvalidCredential);
        }
        let found = self
            .find_user(identity)
            .await?
            .ok_or(AppError::InvalidCredential)?;
        self.issue(found, password, SECRET_TYPE_PASSWORD)
    }

    /// Re-login with a key issued earlier. The key is consumed.
    pub async fn key_login(&self, key: &str) -> AppResult<LoginInfo> {
        let info = self
            .secrets
            .key_info(key)
            .and_then(|info| self.secrets.invalidate_key(key, false).map(|_| info))
            .map_err(|_| AppError::InvalidCredential)?;

        let user_id: i64 = info
            .identifier
            .parse()
            .map_err(|_| AppError::InvalidCredential)?;
        let found = self
            .store
            .get(user_id)
            .await?
            .ok_or(AppError::InvalidCredential)?;

        if found.has_password() {
            if !password_matches(&found, &info.secret) {
                return Err(AppError::InvalidCredential);
            }
            self.issue(found, &info.secret, SECRET_TYPE_PASSWORD)
        } else if found.has_open_id() {
            if found.open_id.as_deref() != Some(info.secret.as_str()) {
                return Err(AppError::InvalidCredential);
            }
            self.issue(found, &info.secret, SECRET_TYPE_OPEN_ID)
        } else {
            Err(AppError::InvalidCredential)
        }
    }

    /// WeChat authorization-code login. Unknown open-ids get a new account.
    pub async fn wx_login(&self, code: &str) -> AppResult<LoginInfo> {
        let token = self.oauth.exchange_code(code).await.map_err(|e| {
            tracing::warn!("OAuth code exchange failed: {}", e);
            AppError::InvalidParam("invalid code".to_string())
        })?;

        let found = match self.store.find_by_open_id(&token.openid).await? {
            Some(found) => found,
            None => {
                let profile = self
                    .oauth
                    .user_info(&token.access_token, &token.openid)
                    .await?;
                tracing::info!("Registering user for open-id {}", token.openid);
                self.store
                    .create_wechat_user(NewWechatUser {
                        open_id: token.openid.clone(),
                        nickname: profile.nickname,
                        head_img_url: profile.headimgurl,
                    })
                    .await?
            }
        };

        self.issue(found, &token.openid, SECRET_TYPE_OPEN_ID)
    }

    /// Invalidate a key together with every token derived from it
    pub fn logout(&self, key: &str) -> AppResult<()> {
        self.secrets.invalidate_key(key, true)?;
        Ok(())
    }

    /// Exchange a valid key for an extra token
    pub fn get_token(&self, key: &str) -> AppResult<TokenSummary> {
        let token = self.secrets.generate_token(key)?;
        Ok(TokenSummary {
            token: token.token,
            expired_in: self.secrets.token_expired_in(),
            generate_time: token.generate_time,
        })
    }

    /// Resolve a request token to a user id
    pub fn validate_token(&self, token: &str) -> AppResult<i64> {
        let identifier = self.secrets.validate_token(token)?;
        identifier.parse().map_err(|_| {
            tracing::warn!("Dropping token bound to non-numeric identifier {}", identifier);
            let _ = self.secrets.invalidate_token(token);
            AppError::TokenInvalid
        })
    }

    fn issue(&self, found: user::Model, secret: &str, secret_type: &str) -> AppResult<LoginInfo> {
        if !found.active {
            tracing::warn!("Login refused for inactive user {}", found.id);
            return Err(AppError::InvalidCredential);
        }

        let key = self
            .secrets
            .generate_key(&found.id.to_string(), secret, secret_type);
        let token = self.secrets.generate_token(&key.key)?;
        tracing::info!("User {} logged in ({})", found.id, secret_type);

        Ok(LoginInfo {
            user_id: found.id,
            key_info: KeySummary {
                key: key.key,
                expired_in: self.secrets.key_expired_in(),
                generate_time: key.generate_time,
            },
            token_info: TokenSummary {
                token: token.token,
                expired_in: self.secrets.token_expired_in(),
                generate_time: token.generate_time,
            },
            user_info: UserSummary::from(found),
        })
    }

    pub async fn get_user(&self, id: i64) -> AppResult<Option<user::Model>> {
        self.store.get(id).await
    }

    /// Role and permission codes, cached per user
    pub async fn role_permission(&self, user_id: i64) -> AppResult<RolePermission> {
        if let Some(cached) = self.cache.role_permission(user_id) {
            return Ok(cached);
        }
        let epoch = self.cache.epoch(user_id);
        let loaded = self.store.role_permission(user_id).await?;
        if !self.cache.put_role_permission(epoch, loaded.clone()) {
            tracing::debug!("Discarded permission load of user {} raced by invalidation", user_id);
        }
        Ok(loaded)
    }

    /// Functions available to a user grouped by type, cached per user.
    /// Both groups are always present.
    pub async fn user_functions(&self, user_id: i64) -> AppResult<UserFunctions> {
        if let Some(cached) = self.cache.functions(user_id) {
            return Ok(cached);
        }

        let epoch = self.cache.epoch(user_id);
        let role_permission = self.role_permission(user_id).await?;
        let functions = self.store.functions_for(&role_permission.permissions).await?;

        let mut grouped = UserFunctions::new();
        grouped.insert(FunctionType::Menu, Vec::new());
        grouped.insert(FunctionType::Api, Vec::new());
        for f in functions {
            match f.function_type() {
                Some(kind) => grouped.entry(kind).or_default().push(f),
                None => tracing::warn!("Function {} has unknown type {}", f.id, f.function_type),
            }
        }

        self.cache.put_functions(epoch, user_id, grouped.clone());
        Ok(grouped)
    }

    /// Routes without a code need no authorization; otherwise the user
    /// must hold an API function with exactly that code.
    pub async fn check_authorities(&self, user_id: i64, route: Option<&str>) -> AppResult<bool> {
        let Some(route) = route.filter(|r| !r.is_empty()) else {
            return Ok(true);
        };
        let functions = self.user_functions(user_id).await?;
        Ok(functions
            .get(&FunctionType::Api)
            .is_some_and(|apis| apis.iter().any(|a| a.code == route)))
    }
}

fn password_matches(found: &user::Model, secret: &str) -> bool {
    match (found.password.as_deref(), found.salt.as_deref()) {
        (Some(stored), salt) if !stored.is_empty() => {
            hash_password(secret, salt.unwrap_or_default()) == stored
        }
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entity::function;
    use crate::secret::InMemorySecretStore;
    use crate::wx::{OAuthAccessToken, WxUserInfo};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    pub(crate) fn user_with_password(id: i64, name: &str, password: &str) -> user::Model {
        let salt = "abcdefgh12345678".to_string();
        user::Model {
            id,
            user_name: Some(name.to_string()),
            password: Some(hash_password(password, &salt)),
            salt: Some(salt),
            active: true,
            nickname: Some(name.to_string()),
            real_name: None,
            head_img_id: None,
            email: None,
            mobile: None,
            open_id: None,
            user_type: 1,
            about: None,
            organ_id: None,
            create_time: 0,
            update_time: 0,
        }
    }

    pub(crate) fn api(id: i64, code: &str, permission_id: Option<i64>) -> function::Model {
        function::Model {
            id,
            name: code.to_string(),
            code: code.to_string(),
            function_type: FunctionType::Api.into(),
            link: None,
            icon: None,
            parent_id: None,
            id_path: id.to_string(),
            permission_id,
            order_no: 0.0,
            create_time: 0,
            update_time: 0,
        }
    }

    /// In-memory store counting permission and function queries
    #[derive(Default)]
    pub(crate) struct StubStore {
        users: Mutex<Vec<user::Model>>,
        /// (permission code, function)
        functions: Vec<(Option<String>, function::Model)>,
        permissions: Vec<String>,
        pub role_permission_calls: AtomicUsize,
        pub function_calls: AtomicUsize,
    }

    impl StubStore {
        pub(crate) fn with_users(users: Vec<user::Model>) -> Self {
            Self {
                users: Mutex::new(users),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl UserStore for StubStore {
        async fn get(&self, id: i64) -> AppResult<Option<user::Model>> {
            Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
        }

        async fn find_by_user_name(&self, user_name: &str) -> AppResult<Option<user::Model>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.user_name.as_deref() == Some(user_name))
                .cloned())
        }

        async fn find_by_open_id(&self, open_id: &str) -> AppResult<Option<user::Model>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.open_id.as_deref() == Some(open_id))
                .cloned())
        }

        async fn create_wechat_user(&self, profile: NewWechatUser) -> AppResult<user::Model> {
            let mut users = self.users.lock().unwrap();
            let created = user::Model {
                id: users.len() as i64 + 100,
                user_name: None,
                password: None,
                salt: None,
                open_id: Some(profile.open_id),
                nickname: profile.nickname,
                user_type: 2,
                ..user_with_password(0, "", "")
            };
            users.push(created.clone());
            Ok(created)
        }

        async fn role_permission(&self, user_id: i64) -> AppResult<RolePermission> {
            self.role_permission_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RolePermission {
                user_id,
                roles: vec!["clerk".to_string()],
                permissions: self.permissions.clone(),
            })
        }

        async fn functions_for(&self, permission_codes: &[String]) -> AppResult<Vec<function::Model>> {
            self.function_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .functions
                .iter()
                .filter(|(code, _)| code.as_ref().map_or(true, |c| permission_codes.contains(c)))
                .map(|(_, f)| f.clone())
                .collect())
        }
    }

    /// OAuth stub accepting the code "good" for open-id "wx-open-id"
    pub(crate) struct StubOAuth;

    #[async_trait]
    impl OAuthProvider for StubOAuth {
        async fn exchange_code(&self, code: &str) -> AppResult<OAuthAccessToken> {
            if code != "good" {
                return Err(AppError::Remote("invalid code".to_string()));
            }
            Ok(OAuthAccessToken {
                access_token: "at".to_string(),
                openid: "wx-open-id".to_string(),
                expires_in: 7200,
                refresh_token: None,
                scope: None,
            })
        }

        async fn user_info(&self, _access_token: &str, open_id: &str) -> AppResult<WxUserInfo> {
            Ok(WxUserInfo {
                openid: open_id.to_string(),
                nickname: Some("wechat fan".to_string()),
                headimgurl: None,
                sex: None,
                unionid: None,
            })
        }
    }

    pub(crate) fn service(store: Arc<StubStore>) -> UserService {
        let secrets = SecretManager::new(
            Arc::new(InMemorySecretStore::new()),
            Duration::from_secs(3600),
            Duration::from_secs(600),
        );
        UserService::new(store, secrets, Arc::new(InfoCache::new(None)), Arc::new(StubOAuth))
    }

    #[tokio::test]
    async fn test_authenticate() {
        let svc = service(Arc::new(StubStore::with_users(vec![user_with_password(
            1, "alice", "secret",
        )])));

        assert!(svc.authenticate("1", "secret").await.unwrap());
        assert!(svc.authenticate("alice", "secret").await.unwrap());
        assert!(!svc.authenticate("1", "wrong").await.unwrap());
        assert!(!svc.authenticate("bob", "secret").await.unwrap());
        assert!(!svc.authenticate("1", "").await.unwrap());
        assert!(!svc.authenticate("", "secret").await.unwrap());
    }

    #[tokio::test]
    async fn test_authenticate_without_password() {
        let mut no_password = user_with_password(2, "carol", "x");
        no_password.password = None;
        let svc = service(Arc::new(StubStore::with_users(vec![no_password])));
        assert!(!svc.authenticate("2", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_password_login_issues_key_and_token() {
        let svc = service(Arc::new(StubStore::with_users(vec![user_with_password(
            1, "alice", "secret",
        )])));

        let info = assert_ok!(svc.login("alice", "secret").await);
        assert_eq!(info.user_id, 1);
        assert_eq!(info.key_info.expired_in, 3600);
        assert_eq!(info.token_info.expired_in, 600);
        assert_eq!(svc.validate_token(&info.token_info.token).unwrap(), 1);

        let json = serde_json::to_value(&info).unwrap();
        assert!(json["userInfo"].get("password").is_none());
        assert!(json["userInfo"].get("salt").is_none());

        assert!(matches!(
            svc.login("alice", "wrong").await,
            Err(AppError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_login() {
        let mut disabled = user_with_password(1, "alice", "secret");
        disabled.active = false;
        let svc = service(Arc::new(StubStore::with_users(vec![disabled])));
        assert!(matches!(
            svc.login("alice", "secret").await,
            Err(AppError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn test_key_login_is_single_use() {
        let svc = service(Arc::new(StubStore::with_users(vec![user_with_password(
            1, "alice", "secret",
        )])));
        let first = svc.login("alice", "secret").await.unwrap();

        let second = assert_ok!(svc.key_login(&first.key_info.key).await);
        assert_eq!(second.user_id, 1);
        assert_ne!(second.key_info.key, first.key_info.key);
        // tokens from the consumed key stay valid
        assert!(svc.validate_token(&first.token_info.token).is_ok());

        assert!(matches!(
            svc.key_login(&first.key_info.key).await,
            Err(AppError::InvalidCredential)
        ));
        assert_ok!(svc.key_login(&second.key_info.key).await);
    }

    #[tokio::test]
    async fn test_key_login_unknown_key() {
        let svc = service(Arc::new(StubStore::default()));
        assert!(matches!(
            svc.key_login("garbage").await,
            Err(AppError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn test_wx_login_registers_then_reuses_user() {
        let store = Arc::new(StubStore::default());
        let svc = service(store.clone());

        let first = assert_ok!(svc.wx_login("good").await);
        assert_eq!(first.user_info.nickname.as_deref(), Some("wechat fan"));
        assert_eq!(first.user_info.user_type, 2);

        let second = assert_ok!(svc.wx_login("good").await);
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(store.users.lock().unwrap().len(), 1);

        // the open-id key can be exchanged for a new login
        assert_ok!(svc.key_login(&second.key_info.key).await);

        assert!(matches!(
            svc.wx_login("bad").await,
            Err(AppError::InvalidParam(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_key_and_tokens() {
        let svc = service(Arc::new(StubStore::with_users(vec![user_with_password(
            1, "alice", "secret",
        )])));
        let info = svc.login("alice", "secret").await.unwrap();
        let extra = assert_ok!(svc.get_token(&info.key_info.key));

        assert_ok!(svc.logout(&info.key_info.key));
        assert_err!(svc.validate_token(&info.token_info.token));
        assert_err!(svc.validate_token(&extra.token));
        assert_err!(svc.get_token(&info.key_info.key));
    }

    #[tokio::test]
    async fn test_check_authorities() {
        let store = Arc::new(StubStore {
            functions: vec![
                (Some("order:edit".to_string()), api(1, "order:save", Some(10))),
                (None, api(2, "port:list", None)),
                (Some("user:admin".to_string()), api(3, "user:save", Some(11))),
            ],
            permissions: vec!["order:edit".to_string()],
            ..Default::default()
        });
        let svc = service(store);

        assert!(svc.check_authorities(5, None).await.unwrap());
        assert!(svc.check_authorities(5, Some("")).await.unwrap());
        assert!(svc.check_authorities(5, Some("order:save")).await.unwrap());
        assert!(svc.check_authorities(5, Some("port:list")).await.unwrap());
        assert!(!svc.check_authorities(5, Some("user:save")).await.unwrap());
        assert!(!svc.check_authorities(5, Some("order:sav")).await.unwrap());
    }

    #[tokio::test]
    async fn test_function_groups_always_present() {
        let svc = service(Arc::new(StubStore::default()));
        let groups = svc.user_functions(1).await.unwrap();
        assert!(groups[&FunctionType::Menu].is_empty());
        assert!(groups[&FunctionType::Api].is_empty());
    }

    #[tokio::test]
    async fn test_permission_cache_queries_once() {
        let store = Arc::new(StubStore::default());
        let svc = service(store.clone());

        let first = svc.role_permission(7).await.unwrap();
        let second = svc.role_permission(7).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.role_permission_calls.load(Ordering::SeqCst), 1);

        svc.role_permission(8).await.unwrap();
        assert_eq!(store.role_permission_calls.load(Ordering::SeqCst), 2);

        svc.user_functions(7).await.unwrap();
        svc.user_functions(7).await.unwrap();
        assert_eq!(store.function_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.role_permission_calls.load(Ordering::SeqCst), 2);

        svc.cache().invalidate_user(7);
        svc.role_permission(7).await.unwrap();
        assert_eq!(store.role_permission_calls.load(Ordering::SeqCst), 3);
    }

    /// Store whose first permission load blocks until released, so an
    /// invalidation can run while the load is in flight
    struct GatedStore {
        permissions: Mutex<Vec<String>>,
        hold_first: AtomicBool,
        loading: Notify,
        release: Notify,
    }

    #[async_trait]
    impl UserStore for GatedStore {
        async fn get(&self, _id: i64) -> AppResult<Option<user::Model>> {
            Ok(None)
        }

        async fn find_by_user_name(&self, _user_name: &str) -> AppResult<Option<user::Model>> {
            Ok(None)
        }

        async fn find_by_open_id(&self, _open_id: &str) -> AppResult<Option<user::Model>> {
            Ok(None)
        }

        async fn create_wechat_user(&self, _profile: NewWechatUser) -> AppResult<user::Model> {
            Err(AppError::Internal("not supported".to_string()))
        }

        async fn role_permission(&self, user_id: i64) -> AppResult<RolePermission> {
            let permissions = self.permissions.lock().unwrap().clone();
            if self.hold_first.swap(false, Ordering::SeqCst) {
                self.loading.notify_one();
                self.release.notified().await;
            }
            Ok(RolePermission {
                user_id,
                roles: Vec::new(),
                permissions,
            })
        }

        async fn functions_for(&self, _permission_codes: &[String]) -> AppResult<Vec<function::Model>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_invalidation_during_load_is_not_undone() {
        let store = Arc::new(GatedStore {
            permissions: Mutex::new(vec!["order:edit".to_string()]),
            hold_first: AtomicBool::new(true),
            loading: Notify::new(),
            release: Notify::new(),
        });
        let secrets = SecretManager::new(
            Arc::new(InMemorySecretStore::new()),
            Duration::from_secs(3600),
            Duration::from_secs(600),
        );
        let svc = Arc::new(UserService::new(
            store.clone(),
            secrets,
            Arc::new(InfoCache::new(None)),
            Arc::new(StubOAuth),
        ));

        let loader = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.role_permission(7).await })
        };
        store.loading.notified().await;

        // revoke while the old snapshot is still being loaded
        store.permissions.lock().unwrap().clear();
        svc.cache().invalidate_all();
        store.release.notify_one();

        let in_flight = loader.await.unwrap().unwrap();
        assert_eq!(in_flight.permissions, vec!["order:edit"]);

        let reloaded = svc.role_permission(7).await.unwrap();
        assert!(reloaded.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_token_with_bad_identifier_is_dropped() {
        let svc = service(Arc::new(StubStore::default()));
        let key = svc.secrets().generate_key("not-a-number", "s", SECRET_TYPE_PASSWORD);
        let token = svc.secrets().generate_token(&key.key).unwrap();

        assert!(matches!(
            svc.validate_token(&token.token),
            Err(AppError::TokenInvalid)
        ));
        assert!(matches!(
            svc.secrets().validate_token(&token.token),
            Err(AppError::TokenInvalid)
        ));
    }
}

