//! # 작업 큐(outbox) 쿼리 모듈
//!
//! 워커에게 전달할 분석 작업을 `task_outbox` 테이블에 쌓고 꺼냅니다.
//!
//! ## 작업의 일생
//! ```text
//! enqueue ──▶ 대기(claimed_at = NULL)
//!               │ claim_next
//!               ▼
//!             임대 중(claimed_at = 가져간 시각) ──▶ ack: 콜백이 최종 상태를 기록하면 삭제
//!               │
//!               ├─ release: 재시도 가능한 실패 → 바로 대기로 돌아감
//!               └─ 임대 시간 초과 → 다시 claim_next 대상
//! ```
//! 워커가 작업을 가져간 뒤 콜백 없이 죽어도 작업은 사라지지 않습니다.

use crate::error::AppError;
use sqlx::{Executor, Sqlite, SqlitePool};
use std::time::Duration;

/// 작업 메시지(JSON 문자열)를 큐 끝에 추가합니다.
pub async fn enqueue(
    pool: &SqlitePool,
    stream: &str,
    task_id: &str,
    payload: &str,
) -> Result<(), AppError> {
    sqlx::query("INSERT INTO task_outbox (stream, task_id, payload) VALUES (?, ?, ?)")
        .bind(stream)
        .bind(task_id)
        .bind(payload)
        .execute(pool)
        .await?;

    Ok(())
}

/// 가져갈 수 있는 가장 오래된 작업 하나에 임대를 걸고 내용을 돌려줍니다.
///
/// 대기 중인 작업과 임대 시간(`lease`)이 지난 작업이 대상입니다.
/// `UPDATE ... RETURNING` 한 문장이므로 워커 두 개가 동시에 호출해도
/// 같은 행을 둘 다 받는 일은 없습니다. 가져갈 작업이 없으면 `None`.
pub async fn claim_next(
    pool: &SqlitePool,
    stream: &str,
    lease: Duration,
) -> Result<Option<String>, AppError> {
    // SQLite 날짜 수식어: "-300 seconds"
    let expired_before = format!("-{} seconds", lease.as_secs());

    let payload = sqlx::query_scalar::<_, String>(
        r#"
        UPDATE task_outbox
        SET claimed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = (
            SELECT id FROM task_outbox
            WHERE stream = ?
              AND (claimed_at IS NULL
                   OR claimed_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?))
            ORDER BY id
            LIMIT 1
        )
        RETURNING payload
        "#,
    )
    .bind(stream)
    .bind(&expired_before)
    .fetch_optional(pool)
    .await?;

    Ok(payload)
}

/// 작업을 큐에서 지웁니다. 처리가 끝난 작업에 호출합니다.
///
/// 이미 지워진 작업이면 `false`.
pub async fn ack<'e, E>(executor: E, task_id: &str) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM task_outbox WHERE task_id = ?")
        .bind(task_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// 임대를 풀어 작업을 바로 다시 가져갈 수 있게 합니다.
///
/// 큐에 없는 작업이면 `false`.
pub async fn release<'e, E>(executor: E, task_id: &str) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE task_outbox SET claimed_at = NULL WHERE task_id = ?")
        .bind(task_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// 아직 아무 워커도 가져가지 않은 작업 수
pub async fn pending_count(pool: &SqlitePool, stream: &str) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM task_outbox WHERE stream = ? AND claimed_at IS NULL",
    )
    .bind(stream)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;

    const LEASE: Duration = Duration::from_secs(300);

    /// 임대 시각을 과거로 돌려 임대가 끝난 상황을 만듭니다.
    async fn expire_lease(pool: &SqlitePool, task_id: &str) {
        sqlx::query("UPDATE task_outbox SET claimed_at = '2000-01-01T00:00:00.000Z' WHERE task_id = ?")
            .bind(task_id)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn claims_in_insertion_order_per_stream() {
        let pool = test_pool().await;
        enqueue(&pool, "analysis_tasks", "t1", "{\"n\":1}").await.unwrap();
        enqueue(&pool, "other", "t2", "{\"n\":2}").await.unwrap();
        enqueue(&pool, "analysis_tasks", "t3", "{\"n\":3}").await.unwrap();

        assert_eq!(
            claim_next(&pool, "analysis_tasks", LEASE).await.unwrap().as_deref(),
            Some("{\"n\":1}")
        );
        assert_eq!(
            claim_next(&pool, "analysis_tasks", LEASE).await.unwrap().as_deref(),
            Some("{\"n\":3}")
        );
        assert_eq!(claim_next(&pool, "analysis_tasks", LEASE).await.unwrap(), None);
        assert_eq!(pending_count(&pool, "analysis_tasks").await.unwrap(), 0);
        assert_eq!(pending_count(&pool, "other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unacknowledged_task_is_claimable_again_after_lease_expires() {
        let pool = test_pool().await;
        enqueue(&pool, "analysis_tasks", "t1", "{\"n\":1}").await.unwrap();

        assert!(claim_next(&pool, "analysis_tasks", LEASE).await.unwrap().is_some());
        // 임대 중에는 다른 워커에게 나가지 않습니다.
        assert_eq!(claim_next(&pool, "analysis_tasks", LEASE).await.unwrap(), None);

        // 워커가 콜백 없이 사라졌고 임대 시간이 지났음
        expire_lease(&pool, "t1").await;
        assert_eq!(
            claim_next(&pool, "analysis_tasks", LEASE).await.unwrap().as_deref(),
            Some("{\"n\":1}")
        );
    }

    #[tokio::test]
    async fn ack_removes_and_release_requeues() {
        let pool = test_pool().await;
        enqueue(&pool, "analysis_tasks", "t1", "{\"n\":1}").await.unwrap();
        enqueue(&pool, "analysis_tasks", "t2", "{\"n\":2}").await.unwrap();
        claim_next(&pool, "analysis_tasks", LEASE).await.unwrap();
        claim_next(&pool, "analysis_tasks", LEASE).await.unwrap();

        assert!(ack(&pool, "t1").await.unwrap());
        assert!(!ack(&pool, "t1").await.unwrap());

        assert!(release(&pool, "t2").await.unwrap());
        assert_eq!(pending_count(&pool, "analysis_tasks").await.unwrap(), 1);
        assert_eq!(
            claim_next(&pool, "analysis_tasks", LEASE).await.unwrap().as_deref(),
            Some("{\"n\":2}")
        );

        // 지워진 작업은 임대가 끝나도 돌아오지 않습니다.
        expire_lease(&pool, "t1").await;
        assert_eq!(claim_next(&pool, "analysis_tasks", LEASE).await.unwrap(), None);
        assert!(!release(&pool, "t1").await.unwrap());
    }
}
