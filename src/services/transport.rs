//! # 작업 전송(Task Transport)
//!
//! 분석 작업을 워커 쪽 큐로 내보내는 경계입니다. 제출 코디네이터는 구체적인 큐가
//! 무엇인지 모르고 `TaskPublisher` 트레이트만 사용합니다.
//!
//! 발행은 "보내고 잊기(fire-and-forget)"이며, 이 계층은 실패를 재시도하지 않습니다.
//! 받는 쪽(워커)은 같은 작업을 여러 번 받을 수 있다고 가정해야 합니다.

use crate::db;
use crate::models::AnalysisTask;
use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;

/// 작업 발행 실패
#[derive(Debug, Error)]
pub enum PublishError {
    /// 작업을 JSON으로 직렬화하지 못함
    #[error("failed to encode task: {0}")]
    Encode(#[from] serde_json::Error),

    /// 큐에 쓰지 못함
    #[error("failed to enqueue task: {0}")]
    Queue(String),
}

/// 분석 작업 발행기
///
/// `#[async_trait]`: 트레이트 안의 async fn을 `Box<dyn Future>`로 바꿔 주어서
/// `Arc<dyn TaskPublisher>`처럼 트레이트 객체로 쓸 수 있게 합니다.
/// `Send + Sync`: 여러 요청 핸들러(스레드)가 하나의 발행기를 공유하기 때문에 필요합니다.
#[async_trait]
pub trait TaskPublisher: Send + Sync {
    async fn publish(&self, task: &AnalysisTask) -> Result<(), PublishError>;
}

/// SQLite `task_outbox` 테이블에 작업을 쌓는 발행기
///
/// 워커는 `POST /api/v1/internal/tasks/claim`으로 작업을 하나씩 가져갑니다.
/// 작업은 콜백이 최종 상태를 기록할 때까지 큐에 남습니다 (`db::outbox` 참고).
#[derive(Clone)]
pub struct OutboxPublisher {
    pool: SqlitePool,
    stream: String,
}

impl OutboxPublisher {
    pub fn new(pool: SqlitePool, stream: impl Into<String>) -> Self {
        Self {
            pool,
            stream: stream.into(),
        }
    }
}

#[async_trait]
impl TaskPublisher for OutboxPublisher {
    async fn publish(&self, task: &AnalysisTask) -> Result<(), PublishError> {
        let payload = serde_json::to_string(task)?;

        db::outbox::enqueue(&self.pool, &self.stream, &task.task_id.to_string(), &payload)
            .await
            .map_err(|e| PublishError::Queue(e.to_string()))?;

        tracing::debug!(task_id = %task.task_id, stream = %self.stream, "Task queued");
        Ok(())
    }
}
