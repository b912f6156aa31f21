use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use crate::db::models::User;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    // Every connection to an in-memory database opens a fresh, empty one.
    let pool = if is_in_memory(database_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections)
    };

    pool.connect_with(options).await
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

pub async fn create_user_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One page of users with `rowid` above `after`, paired with their rowids.
/// The connection is returned to the pool as soon as the page is read.
pub async fn list_users_page(
    pool: &SqlitePool,
    after: i64,
    limit: i64,
) -> Result<Vec<(i64, User)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, String, String, String)>(
        r#"
        SELECT rowid, id, name, email FROM users
        WHERE rowid > ?
        ORDER BY rowid
        LIMIT ?
        "#,
    )
    .bind(after)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(rowid, id, name, email)| (rowid, User { id, name, email }))
        .collect())
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT id, name, email FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_user(pool: &SqlitePool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (id, name, email)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(&user.email)
    .execute(pool)
    .await?;

    Ok(())
}

/// Replaces the row keyed by `user.id`. `None` when no such row exists.
pub async fn update_user(pool: &SqlitePool, user: &User) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET name = ?, email = ?
        WHERE id = ?
        RETURNING id, name, email
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_user(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("DELETE FROM users WHERE id = ? RETURNING id, name, email")
        .bind(id)
        .fetch_optional(pool)
        .await
}
