//! # 글(Writing) 데이터베이스 쿼리 모듈
//!
//! `writings` 테이블의 CRUD와, 제출 흐름에서 쓰는 조건부 상태 전이를 담당합니다.
//!
//! ## 상태 전이는 항상 조건부
//! `conditional_update_status`는 "현재 상태가 from일 때만 to로 바꾼다"를
//! UPDATE 한 문장으로 처리합니다. 먼저 읽고 나중에 쓰는 방식이면 두 요청이 동시에
//! `draft`를 읽고 둘 다 제출에 성공할 수 있기 때문입니다.

use crate::error::AppError;
use crate::models::*;
use sqlx::{Executor, Sqlite, SqlitePool};

const WRITING_COLUMNS: &str =
    "id, user_id, type, title, content, status, created_at, updated_at, submitted_at";

/// 새 글을 `draft` 상태로 생성합니다.
///
/// `RETURNING`: INSERT한 행을 바로 돌려받아, 다시 SELECT할 필요가 없습니다.
pub async fn create_writing(
    pool: &SqlitePool,
    user_id: &str,
    req: &CreateWritingRequest,
) -> Result<Writing, AppError> {
    // UUIDv7: 시간 기반 UUID로, 생성 순서대로 정렬됩니다
    let id = uuid::Uuid::now_v7().to_string();

    let writing = sqlx::query_as::<_, Writing>(&format!(
        "INSERT INTO writings (id, user_id, type, title, content) VALUES (?, ?, ?, ?, ?) RETURNING {}",
        WRITING_COLUMNS
    ))
    .bind(&id)
    .bind(user_id)
    .bind(req.writing_type.as_str())
    .bind(&req.title)
    .bind(&req.content)
    .fetch_one(pool)
    .await?;

    Ok(writing)
}

/// ID로 글 하나를 조회합니다.
///
/// 풀(`&SqlitePool`)과 트랜잭션(`&mut *tx`) 어느 쪽에서도 호출할 수 있도록
/// `Executor` 트레이트를 제네릭으로 받습니다.
pub async fn find_by_id<'e, E>(executor: E, id: &str) -> Result<Option<Writing>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let writing = sqlx::query_as::<_, Writing>(&format!(
        "SELECT {} FROM writings WHERE id = ?",
        WRITING_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(writing)
}

/// 사용자의 글 목록을 최근 수정순으로 한 페이지 조회하고, 전체 개수도 함께 반환합니다.
pub async fn list_by_user(
    pool: &SqlitePool,
    user_id: &str,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Writing>, i64), AppError> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM writings WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let writings = sqlx::query_as::<_, Writing>(&format!(
        "SELECT {} FROM writings WHERE user_id = ? ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?",
        WRITING_COLUMNS
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((writings, total))
}

/// 초안(draft)의 내용을 부분 수정합니다.
///
/// `COALESCE(?, column)`: 바인딩한 값이 NULL(None)이면 기존 값을 유지합니다.
/// `status = 'draft'` 조건 때문에 제출된 글은 수정되지 않고 `None`이 반환됩니다.
pub async fn update_draft(
    pool: &SqlitePool,
    id: &str,
    req: &UpdateWritingRequest,
) -> Result<Option<Writing>, AppError> {
    let writing = sqlx::query_as::<_, Writing>(&format!(
        r#"
        UPDATE writings
        SET type = COALESCE(?, type),
            title = COALESCE(?, title),
            content = COALESCE(?, content),
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ? AND status = 'draft'
        RETURNING {}
        "#,
        WRITING_COLUMNS
    ))
    .bind(req.writing_type.map(WritingType::as_str))
    .bind(req.title.as_deref())
    .bind(req.content.as_deref())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(writing)
}

/// 초안을 삭제합니다. 삭제했으면 `true`.
///
/// 제출된 글에는 분석 기록이 붙어 있으므로 지우지 않습니다.
pub async fn delete_draft(pool: &SqlitePool, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM writings WHERE id = ? AND status = 'draft'")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// 글의 상태를 `from`에서 `to`로 바꿉니다. 현재 상태가 `from`이 아니면 아무것도 하지 않습니다.
///
/// ## 매개변수
/// - `submitted_at`: Some이면 제출 시각도 함께 기록 (draft → submitted 전이에서 사용)
///
/// ## 반환값
/// - `Ok(true)`: 이 호출이 상태를 바꿈
/// - `Ok(false)`: 다른 요청이 먼저 바꿨거나 글이 없음
pub async fn conditional_update_status<'e, E>(
    executor: E,
    id: &str,
    from: WritingStatus,
    to: WritingStatus,
    submitted_at: Option<&str>,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE writings
        SET status = ?,
            submitted_at = COALESCE(?, submitted_at),
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(to.as_str())
    .bind(submitted_at)
    .bind(id)
    .bind(from.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, seed_writing, test_pool};

    #[tokio::test]
    async fn status_transition_applies_only_once() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "race@example.com").await;
        let writing = seed_writing(&pool, &user.id).await;

        let first = conditional_update_status(
            &pool,
            &writing.id,
            WritingStatus::Draft,
            WritingStatus::Submitted,
            Some("2026-10-19T09:00:00.000Z"),
        )
        .await
        .unwrap();
        let second = conditional_update_status(
            &pool,
            &writing.id,
            WritingStatus::Draft,
            WritingStatus::Submitted,
            Some("2026-10-19T09:00:01.000Z"),
        )
        .await
        .unwrap();

        assert!(first);
        assert!(!second);
        let stored = find_by_id(&pool, &writing.id).await.unwrap().unwrap();
        assert_eq!(stored.status, WritingStatus::Submitted);
        assert_eq!(stored.submitted_at.as_deref(), Some("2026-10-19T09:00:00.000Z"));
    }

    #[tokio::test]
    async fn submitted_writing_cannot_be_edited_or_deleted() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "locked@example.com").await;
        let writing = seed_writing(&pool, &user.id).await;
        conditional_update_status(
            &pool,
            &writing.id,
            WritingStatus::Draft,
            WritingStatus::Submitted,
            None,
        )
        .await
        .unwrap();

        let req = UpdateWritingRequest {
            writing_type: None,
            title: Some("new".into()),
            content: None,
        };
        assert!(update_draft(&pool, &writing.id, &req).await.unwrap().is_none());
        assert!(!delete_draft(&pool, &writing.id).await.unwrap());
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "edit@example.com").await;
        let writing = seed_writing(&pool, &user.id).await;

        let req = UpdateWritingRequest {
            writing_type: Some(WritingType::CoverLetter),
            title: None,
            content: None,
        };
        let updated = update_draft(&pool, &writing.id, &req).await.unwrap().unwrap();

        assert_eq!(updated.writing_type, WritingType::CoverLetter);
        assert_eq!(updated.title, writing.title);
        assert_eq!(updated.content, writing.content);
    }

    #[tokio::test]
    async fn list_is_scoped_to_owner_and_paged() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let other = seed_user(&pool, "other@example.com").await;
        for _ in 0..3 {
            seed_writing(&pool, &owner.id).await;
        }
        seed_writing(&pool, &other.id).await;

        let (page, total) = list_by_user(&pool, &owner.id, 0, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|w| w.user_id == owner.id));
    }
}
