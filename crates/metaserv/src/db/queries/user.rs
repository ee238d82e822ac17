//! User and project queries.

use sqlx::PgConnection;

use crate::db::models::{NewUser, Project, User};
use crate::db::DbPool;
use crate::error::AppResult;

/// Insert a project and return its id.
pub async fn insert_project(pool: &DbPool, name: &str) -> AppResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO metaserv.ms_project (name)
        VALUES ($1)
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Insert a user and return its id.
pub async fn insert_user(pool: &DbPool, user: &NewUser) -> AppResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO metaserv.ms_user (email, first_name, last_name)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Look up a user by email.
pub async fn get_user_by_email(conn: &mut PgConnection, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, first_name, last_name, email
        FROM metaserv.ms_user
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(conn)
    .await?;

    Ok(user)
}

/// Look up a project by name.
pub async fn get_project_by_name(conn: &mut PgConnection, name: &str) -> AppResult<Option<Project>> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        SELECT id, name, created_at
        FROM metaserv.ms_project
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(conn)
    .await?;

    Ok(project)
}
