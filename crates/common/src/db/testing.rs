//! In-memory SQLite fixtures for repository-level tests

use super::models::*;
use super::schema::ensure_schema;
use super::{DbPool, Repository};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, NotSet, Set};

/// Fresh single-connection in-memory database with the catalog schema
pub(crate) async fn memory_pool() -> DbPool {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    // Every pooled connection would otherwise get its own private database
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let conn = Database::connect(opts).await.expect("connect to in-memory sqlite");
    ensure_schema(&conn).await.expect("create catalog schema");
    DbPool::from_connection(conn)
}

pub(crate) async fn memory_repo() -> Repository {
    Repository::new(memory_pool().await)
}

pub(crate) async fn seed_customer(repo: &Repository, name: &str) -> i32 {
    let customer = CustomerActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        email: Set(Some(format!("{}@example.com", name.to_lowercase().replace(' ', ".")))),
    };
    customer
        .insert(repo.pool().write())
        .await
        .expect("insert customer")
        .id
}
