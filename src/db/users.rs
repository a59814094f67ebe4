use crate::error::AppError;
use crate::models::user::User;
use sqlx::{Executor, Sqlite, SqlitePool};

const USER_COLUMNS: &str = "id, email, password_hash, daily_submit_count, last_submit_date, created_at, updated_at";

pub async fn create_user(
    pool: &SqlitePool,
    id: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(id)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_id<'e, E>(executor: E, id: &str) -> Result<Option<User>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(user)
}

/// Consumes one submission from the user's daily quota in a single statement.
///
/// The count and date move together: a stored date earlier than `today` resets
/// the counter to 1, otherwise it is incremented. The `WHERE` guard refuses the
/// update once today's count has reached `limit`, so two concurrent submitters
/// cannot both take the last slot.
///
/// Returns `false` when the guard rejected the update (or the user is gone).
pub async fn conditional_increment_quota<'e, E>(
    executor: E,
    user_id: &str,
    today: &str,
    limit: i64,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE users
        SET daily_submit_count = CASE
                WHEN last_submit_date IS NULL OR last_submit_date < ? THEN 1
                ELSE daily_submit_count + 1
            END,
            last_submit_date = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ?
          AND (last_submit_date IS NULL OR last_submit_date < ? OR daily_submit_count < ?)
        "#,
    )
    .bind(today)
    .bind(today)
    .bind(user_id)
    .bind(today)
    .bind(limit)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn store_refresh_token(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
    token_hash: &str,
    expires_at: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_refresh_token(
    pool: &SqlitePool,
    token_hash: &str,
) -> Result<Option<(String, String, String)>, AppError> {
    let row = sqlx::query_as::<_, (String, String, String)>(
        r#"
        SELECT id, user_id, expires_at
        FROM refresh_tokens
        WHERE token_hash = ?
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn delete_refresh_token(pool: &SqlitePool, token_hash: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn delete_user_refresh_tokens(pool: &SqlitePool, user_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}
