use crate::{modules::users::model::User, utils::errors::AppError};
use anyhow::Context;
use sqlx::PgPool;
use tracing::instrument;

pub struct UserService;

impl UserService {
    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "users"))]
    pub async fn get_users(db: &PgPool, search: Option<&str>) -> Result<Vec<User>, AppError> {
        let users = match search {
            Some(username) => {
                sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, username, first_name, last_name, email
                    FROM users
                    WHERE username = $1
                    ORDER BY id
                    "#,
                )
                .bind(username)
                .fetch_all(db)
                .await
            }
            None => {
                sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, username, first_name, last_name, email
                    FROM users
                    ORDER BY id
                    "#,
                )
                .fetch_all(db)
                .await
            }
        }
        .context("Failed to fetch users")
        .map_err(AppError::internal)?;

        Ok(users)
    }

    #[instrument(skip(db), fields(db.operation = "SELECT", db.table = "users"))]
    pub async fn get_user(db: &PgPool, id: i32) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, first_name, last_name, email
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("Failed to fetch user")
        .map_err(AppError::internal)?;

        Ok(user)
    }
}
