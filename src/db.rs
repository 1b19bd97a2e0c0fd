use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DbBackend, DbErr, EntityTrait, QueryFilter, Schema, Set, Statement,
};
use sea_orm::sea_query::TableCreateStatement;
use std::time::Duration;
use tracing::info;

use crate::config::{BootstrapConfig, DatabaseConfig};
use crate::crypto::{generate_salt, hash_password};
use crate::entity::function::FunctionType;
use crate::entity::user::UserType;
use crate::entity::{
    dict, file, function, order, organization, permission, port, region, role, role_permission,
    user, user_organization, user_permission, user_role,
};
use crate::entity::role::ADMIN_ROLE;
use crate::service::tree;

/// Permission guarding every management route
pub const ADMIN_PERMISSION: &str = "sys:admin";

/// Entities with list/get/save/delete routes
pub const MANAGED_ENTITIES: [&str; 9] = [
    "order",
    "port",
    "organization",
    "role",
    "permission",
    "function",
    "region",
    "dict",
    "user",
];

const CRUD_OPS: [&str; 4] = ["list", "get", "save", "delete"];

/// Route codes of every management API
pub fn admin_route_codes() -> Vec<String> {
    let mut codes: Vec<String> = MANAGED_ENTITIES
        .iter()
        .flat_map(|entity| CRUD_OPS.iter().map(move |op| format!("{}:{}", entity, op)))
        .collect();
    codes.push("user:grant".to_string());
    codes.push("role:grant".to_string());
    codes
}

/// Initialize database connection and auto-migrate tables
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.connection_url();

    info!("Connecting to database: {}:{}/{}", config.host, config.port, config.name);

    let mut opt = ConnectOptions::new(&database_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug)
        .set_schema_search_path(config.schema.as_str());

    let db = Database::connect(opt).await?;
    info!("Database connection established");

    auto_migrate(&db).await?;

    Ok(db)
}

/// Create missing tables
async fn auto_migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("Running auto-migration for all entities...");

    // System tables
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(file::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(user::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(organization::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(role::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(permission::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(function::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(region::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(dict::Entity)).await?;

    // Join tables
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(user_role::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(user_permission::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(user_organization::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(role_permission::Entity)).await?;

    // Business tables
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(port::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(order::Entity)).await?;

    info!("Auto-migration completed successfully");
    Ok(())
}

/// Create a table if it doesn't exist
async fn create_table_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: TableCreateStatement,
) -> Result<(), DbErr> {
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

async fn ensure_permission(db: &DatabaseConnection, code: &str, name: &str) -> Result<permission::Model, DbErr> {
    if let Some(found) = permission::Entity::find()
        .filter(permission::Column::Code.eq(code))
        .one(db)
        .await?
    {
        return Ok(found);
    }
    info!("Seeding permission {}", code);
    permission::ActiveModel {
        code: Set(code.to_string()),
        name: Set(name.to_string()),
        create_time: Set(now()),
        update_time: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

async fn ensure_role(db: &DatabaseConnection, code: &str, name: &str) -> Result<role::Model, DbErr> {
    if let Some(found) = role::Entity::find()
        .filter(role::Column::Code.eq(code))
        .one(db)
        .await?
    {
        return Ok(found);
    }
    info!("Seeding role {}", code);
    role::ActiveModel {
        code: Set(code.to_string()),
        name: Set(name.to_string()),
        create_time: Set(now()),
        update_time: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Function row seeded at startup
struct FunctionSeed<'a> {
    name: &'a str,
    code: &'a str,
    function_type: FunctionType,
    link: Option<String>,
    order_no: f32,
}

async fn ensure_function(
    db: &DatabaseConnection,
    seed: FunctionSeed<'_>,
    parent: Option<&function::Model>,
    permission_id: i64,
) -> Result<function::Model, DbErr> {
    if let Some(found) = function::Entity::find()
        .filter(function::Column::Code.eq(seed.code))
        .one(db)
        .await?
    {
        return Ok(found);
    }
    let created = function::ActiveModel {
        name: Set(seed.name.to_string()),
        code: Set(seed.code.to_string()),
        function_type: Set(seed.function_type.into()),
        link: Set(seed.link),
        parent_id: Set(parent.map(|p| p.id)),
        id_path: Set(String::new()),
        permission_id: Set(Some(permission_id)),
        order_no: Set(seed.order_no),
        create_time: Set(now()),
        update_time: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut model: function::ActiveModel = created.clone().into();
    model.id_path = Set(tree::child_id_path(
        parent.map(|p| p.id_path.as_str()),
        created.id,
    ));
    model.update(db).await
}

/// Seed the admin role, its permission, the management functions and,
/// when configured, an admin user. Existing rows are left untouched.
pub async fn seed(db: &DatabaseConnection, bootstrap: &BootstrapConfig) -> Result<(), DbErr> {
    let admin_permission = ensure_permission(db, ADMIN_PERMISSION, "系统管理").await?;
    let admin_role = ensure_role(db, ADMIN_ROLE, "管理员").await?;

    let granted = role_permission::Entity::find()
        .filter(role_permission::Column::RoleId.eq(admin_role.id))
        .filter(role_permission::Column::PermissionId.eq(admin_permission.id))
        .one(db)
        .await?;
    if granted.is_none() {
        role_permission::ActiveModel {
            role_id: Set(admin_role.id),
            permission_id: Set(admin_permission.id),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    let root_menu = ensure_function(
        db,
        FunctionSeed {
            name: "系统管理",
            code: "menu:system",
            function_type: FunctionType::Menu,
            link: None,
            order_no: 0.0,
        },
        None,
        admin_permission.id,
    )
    .await?;
    for (i, entity) in MANAGED_ENTITIES.iter().enumerate() {
        let code = format!("menu:{}", entity);
        ensure_function(
            db,
            FunctionSeed {
                name: entity,
                code: &code,
                function_type: FunctionType::Menu,
                link: Some(format!("/{}", entity)),
                order_no: i as f32,
            },
            Some(&root_menu),
            admin_permission.id,
        )
        .await?;
    }
    for code in admin_route_codes() {
        ensure_function(
            db,
            FunctionSeed {
                name: &code,
                code: &code,
                function_type: FunctionType::Api,
                link: None,
                order_no: 0.0,
            },
            None,
            admin_permission.id,
        )
        .await?;
    }

    if let (Some(name), Some(password)) = (&bootstrap.admin_user, &bootstrap.admin_password) {
        seed_admin_user(db, name, password, admin_role.id).await?;
    }
    Ok(())
}

async fn seed_admin_user(
    db: &DatabaseConnection,
    name: &str,
    password: &str,
    role_id: i64,
) -> Result<(), DbErr> {
    let existing = user::Entity::find()
        .filter(user::Column::UserName.eq(name))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let salt = generate_salt();
    let admin = user::ActiveModel {
        user_name: Set(Some(name.to_string())),
        password: Set(Some(hash_password(password, &salt))),
        salt: Set(Some(salt)),
        active: Set(true),
        nickname: Set(Some(name.to_string())),
        user_type: Set(UserType::Admin.into()),
        create_time: Set(now()),
        update_time: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    user_role::ActiveModel {
        user_id: Set(admin.id),
        role_id: Set(role_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Seeded admin user {} ({})", name, admin.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_route_codes() {
        let codes = admin_route_codes();
        assert_eq!(codes.len(), MANAGED_ENTITIES.len() * 4 + 2);
        assert!(codes.contains(&"order:list".to_string()));
        assert!(codes.contains(&"user:delete".to_string()));
        assert!(codes.contains(&"role:grant".to_string()));
    }
}
