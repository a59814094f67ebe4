//! # 제출 코디네이터 (Submission Coordinator)
//!
//! 글을 분석에 제출하는 전체 흐름을 담당합니다.
//!
//! ## 처리 순서
//! 각 단계가 실패하면 즉시 중단하며, 그 시점까지 DB에는 아무 변경도 남지 않습니다.
//! ```text
//! 1. 글 조회            없으면 NotFound
//! 2. 소유자 확인        다르면 Forbidden
//! 3. 상태 확인          draft가 아니면 Validation ("already submitted")
//! 4. 하루 한도 검사     초과면 RateLimited (현재 횟수/한도 포함)
//! ┌─ 트랜잭션 ─────────────────────────────────────────────┐
//! │ 5. task_id 발급, Analysis(pending) 생성                 │
//! │ 6. 글 draft → submitted (조건부), 제출 시각 기록        │
//! │ 7. 한도 1회 소비 (조건부)                                │
//! └─ 커밋 ────────────────────────────────────────────────┘
//! 8. AnalysisTask 생성 후 발행
//! ```
//!
//! 5~7단계는 발행 전에 커밋됩니다. 그래서 발행 직후 콜백이 바로 도착해도
//! task_id로 분석 기록을 항상 찾을 수 있습니다.
//!
//! ## 발행 실패 (dispatch gap)
//! 8단계가 실패하면 `Internal` 에러를 반환하지만, 5~7단계는 이미 커밋된 상태입니다.
//! 결과적으로 "작업이 한 번도 전달되지 않은 pending 분석"이 남습니다.
//! 여기서 조용히 재시도하지 않고 에러로 드러내며, task_id를 `error!` 로그로 남겨
//! 외부 정리 작업(reconciliation sweep)이 찾을 수 있게 합니다.

use crate::db;
use crate::error::AppError;
use crate::models::*;
use crate::services::quota::{self, QuotaTracker};
use crate::services::transport::TaskPublisher;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// 발행 호출을 기다리는 최대 시간. 넘기면 실패로 취급합니다.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// 글 제출을 조율하는 서비스
///
/// 핸들러마다 복제하지 않도록 `Arc<SubmissionCoordinator>`로 공유합니다.
pub struct SubmissionCoordinator {
    pool: SqlitePool,
    publisher: Arc<dyn TaskPublisher>,
    quota: QuotaTracker,
    /// 작업 메시지에 넣을 절대 콜백 URL
    callback_url: String,
    publish_timeout: Duration,
}

impl SubmissionCoordinator {
    pub fn new(
        pool: SqlitePool,
        publisher: Arc<dyn TaskPublisher>,
        quota: QuotaTracker,
        callback_url: String,
    ) -> Self {
        Self {
            pool,
            publisher,
            quota,
            callback_url,
            publish_timeout: PUBLISH_TIMEOUT,
        }
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// 글을 분석에 제출하고, 생성된 `pending` 분석 기록을 반환합니다.
    pub async fn submit_writing(
        &self,
        writing_id: &str,
        requesting_user_id: &str,
    ) -> Result<Analysis, AppError> {
        // 1. 글 조회
        let writing = db::writings::find_by_id(&self.pool, writing_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Writing not found".to_string()))?;

        // 2. 소유자 확인
        if writing.user_id != requesting_user_id {
            return Err(AppError::Forbidden(
                "You don't have permission to submit this writing".to_string(),
            ));
        }

        // 3. 재제출은 항상 거부 (멱등 처리하지 않음)
        if writing.status != WritingStatus::Draft {
            return Err(already_submitted());
        }

        // 4. 하루 한도 검사 (아직 소비하지 않음)
        let user = db::users::find_by_id(&self.pool, requesting_user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let today = quota::today();
        self.quota.check(&user, today)?;

        // 작업 메시지에 들어갈 writing_id는 커밋 전에 미리 검증해 둡니다.
        // 커밋 후에 실패하면 되돌릴 수 없기 때문입니다.
        let writing_uuid = Uuid::parse_str(&writing.id)
            .map_err(|e| AppError::Internal(format!("writing {} has invalid id: {}", writing.id, e)))?;

        // 5~7. 하나의 트랜잭션으로 묶습니다.
        // 중간에 `?`로 빠져나가면 tx가 drop되면서 자동으로 롤백됩니다.
        let task_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        // 5. 분석 기록 생성
        let analysis =
            db::analyses::create_analysis(&mut *tx, &writing.id, &task_id.to_string()).await?;

        // 6. draft → submitted. 동시에 들어온 다른 제출이 먼저 바꿨다면 여기서 실패합니다.
        let submitted_at = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let transitioned = db::writings::conditional_update_status(
            &mut *tx,
            &writing.id,
            WritingStatus::Draft,
            WritingStatus::Submitted,
            Some(&submitted_at),
        )
        .await?;
        if !transitioned {
            return Err(already_submitted());
        }

        // 7. 한도 1회 소비
        self.quota.consume(&mut *tx, &user, today).await?;

        tx.commit().await?;

        tracing::info!(
            task_id = %task_id,
            writing_id = %writing.id,
            user_id = %user.id,
            "Writing submitted for analysis"
        );

        // 8. 작업 발행
        let task = AnalysisTask::new(
            task_id,
            writing_uuid,
            writing.content,
            writing.writing_type,
            self.callback_url.clone(),
        );
        self.dispatch(&task).await?;

        Ok(analysis)
    }

    /// 작업을 발행합니다. 실패나 시간 초과는 재시도 없이 `Internal`로 반환합니다.
    async fn dispatch(&self, task: &AnalysisTask) -> Result<(), AppError> {
        let cause = match tokio::time::timeout(self.publish_timeout, self.publisher.publish(task))
            .await
        {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("publish timed out after {:?}", self.publish_timeout),
        };

        // 분석 기록은 이미 커밋되었으므로 정리 작업이 찾을 수 있도록 task_id를 남깁니다.
        tracing::error!(
            task_id = %task.task_id,
            writing_id = %task.writing_id,
            error = %cause,
            "Analysis committed but task was never dispatched; needs reconciliation"
        );
        Err(AppError::Internal(format!(
            "Failed to queue analysis task: {}",
            cause
        )))
    }
}

fn already_submitted() -> AppError {
    AppError::Validation("Writing has already been submitted".to_string())
}
