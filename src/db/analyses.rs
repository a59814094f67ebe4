//! # 분석(Analysis) 데이터베이스 쿼리 모듈
//!
//! 분석 기록의 생성, 조회, 조건부 전이를 담당합니다.
//!
//! 행은 `AnalysisRow`로 읽은 뒤 `Analysis::try_from`으로 상태별 variant로 조립합니다.
//! 이 모듈 밖으로는 항상 `Analysis`만 나갑니다.
//!
//! ## 조건부 갱신
//! 모든 전이는 `WHERE status IN ('pending', 'processing')` 조건을 붙인 UPDATE 한 문장입니다.
//! 같은 task_id로 콜백 두 개가 동시에 와도 최종 상태 변경은 하나만 적용됩니다.

use crate::error::AppError;
use crate::models::*;
use sqlx::{Executor, Sqlite, SqlitePool};

const ANALYSIS_COLUMNS: &str = "id, writing_id, task_id, status, ai_score, feedback, latency_ms, \
     error_code, error_message, retry_count, created_at, updated_at";

/// 아직 끝나지 않은 상태를 고르는 SQL 조건
const OPEN_STATUS: &str = "status IN ('pending', 'processing')";

/// 조건부 갱신으로 적용할 변경 내용
#[derive(Debug, Clone, Copy)]
pub enum AnalysisUpdate<'a> {
    /// 결과를 기록하고 completed로 전이
    Complete(&'a CompletedDetails),
    /// 에러를 기록하고 failed로 전이
    Fail(&'a FailedDetails),
}

/// `pending` 상태의 분석 기록을 새로 만듭니다.
pub async fn create_analysis<'e, E>(
    executor: E,
    writing_id: &str,
    task_id: &str,
) -> Result<Analysis, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = uuid::Uuid::now_v7().to_string();

    let row = sqlx::query_as::<_, AnalysisRow>(&format!(
        "INSERT INTO analyses (id, writing_id, task_id, status) VALUES (?, ?, ?, 'pending') RETURNING {}",
        ANALYSIS_COLUMNS
    ))
    .bind(&id)
    .bind(writing_id)
    .bind(task_id)
    .fetch_one(executor)
    .await?;

    Analysis::try_from(row)
}

/// task_id로 분석 기록을 찾습니다. 콜백이 분석을 찾는 유일한 경로입니다.
pub async fn find_by_task_id<'e, E>(executor: E, task_id: &str) -> Result<Option<Analysis>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, AnalysisRow>(&format!(
        "SELECT {} FROM analyses WHERE task_id = ?",
        ANALYSIS_COLUMNS
    ))
    .bind(task_id)
    .fetch_optional(executor)
    .await?;

    // Option<Row> → Option<Result<Analysis>> → Result<Option<Analysis>>
    row.map(Analysis::try_from).transpose()
}

/// 글의 가장 최근 분석 기록을 조회합니다.
pub async fn find_latest_by_writing(
    pool: &SqlitePool,
    writing_id: &str,
) -> Result<Option<Analysis>, AppError> {
    let row = sqlx::query_as::<_, AnalysisRow>(&format!(
        "SELECT {} FROM analyses WHERE writing_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
        ANALYSIS_COLUMNS
    ))
    .bind(writing_id)
    .fetch_optional(pool)
    .await?;

    row.map(Analysis::try_from).transpose()
}

/// 아직 끝나지 않은 분석에만 변경을 적용합니다.
///
/// ## 반환값
/// - `Ok(true)`: 이 호출이 변경을 적용함
/// - `Ok(false)`: 이미 최종 상태이거나 기록이 없음
pub async fn conditional_update_analysis<'e, E>(
    executor: E,
    task_id: &str,
    update: AnalysisUpdate<'_>,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = match update {
        AnalysisUpdate::Complete(details) => {
            sqlx::query(&format!(
                r#"
                UPDATE analyses
                SET status = 'completed', ai_score = ?, feedback = ?, latency_ms = ?,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                WHERE task_id = ? AND {}
                "#,
                OPEN_STATUS
            ))
            .bind(details.ai_score)
            .bind(&details.feedback)
            .bind(details.latency_ms)
            .bind(task_id)
            .execute(executor)
            .await?
        }
        AnalysisUpdate::Fail(details) => {
            sqlx::query(&format!(
                r#"
                UPDATE analyses
                SET status = 'failed', error_code = ?, error_message = ?,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                WHERE task_id = ? AND {}
                "#,
                OPEN_STATUS
            ))
            .bind(&details.error_code)
            .bind(&details.error_message)
            .bind(task_id)
            .execute(executor)
            .await?
        }
    };

    Ok(result.rows_affected() == 1)
}

/// 상태는 그대로 두고 retry_count만 1 올립니다.
///
/// 아직 끝나지 않았고 현재 값이 `max` 미만일 때만 적용되며, 올라간 뒤의 값을 돌려줍니다.
/// 적용되지 않았으면 `None`. 동시에 온 콜백끼리도 각자 자기가 만든 값을 받습니다.
pub async fn increment_retry<'e, E>(
    executor: E,
    task_id: &str,
    max: i64,
) -> Result<Option<i64>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let retry_count = sqlx::query_scalar::<_, i64>(&format!(
        r#"
        UPDATE analyses
        SET retry_count = retry_count + 1,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE task_id = ? AND {} AND retry_count < ?
        RETURNING retry_count
        "#,
        OPEN_STATUS
    ))
    .bind(task_id)
    .bind(max)
    .fetch_optional(executor)
    .await?;

    Ok(retry_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, seed_writing, test_pool};

    #[tokio::test]
    async fn terminal_update_is_guarded_on_open_status() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "guard@example.com").await;
        let writing = seed_writing(&pool, &user.id).await;
        create_analysis(&pool, &writing.id, "task-1").await.unwrap();

        let done = CompletedDetails {
            ai_score: 0.8,
            feedback: "ok".into(),
            latency_ms: 120,
        };
        let fail = FailedDetails {
            error_code: "TIMEOUT".into(),
            error_message: "late".into(),
        };

        assert!(conditional_update_analysis(&pool, "task-1", AnalysisUpdate::Complete(&done))
            .await
            .unwrap());
        assert!(!conditional_update_analysis(&pool, "task-1", AnalysisUpdate::Fail(&fail))
            .await
            .unwrap());

        let stored = find_by_task_id(&pool, "task-1").await.unwrap().unwrap();
        assert_eq!(stored.state, AnalysisState::Completed(done));
    }

    #[tokio::test]
    async fn retry_increment_respects_cap() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "cap@example.com").await;
        let writing = seed_writing(&pool, &user.id).await;
        create_analysis(&pool, &writing.id, "task-2").await.unwrap();

        for expected in 1..=3 {
            assert_eq!(
                increment_retry(&pool, "task-2", MAX_RETRIES).await.unwrap(),
                Some(expected)
            );
        }
        assert_eq!(increment_retry(&pool, "task-2", MAX_RETRIES).await.unwrap(), None);

        let stored = find_by_task_id(&pool, "task-2").await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 3);
        assert_eq!(stored.status(), AnalysisStatus::Pending);
    }

    #[tokio::test]
    async fn task_id_is_unique() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "unique@example.com").await;
        let writing = seed_writing(&pool, &user.id).await;

        create_analysis(&pool, &writing.id, "dup").await.unwrap();
        assert!(create_analysis(&pool, &writing.id, "dup").await.is_err());
    }
}
