//! # 콜백 처리기 (Callback Processor)
//!
//! 워커가 보낸 분석 결과를 받아 분석 기록의 상태를 전이시킵니다.
//!
//! ## 멱등성
//! 콜백은 최소 한 번 전달되므로 같은 task_id의 콜백이 여러 번 올 수 있습니다.
//! 이미 최종 상태(completed/failed)인 분석에 대한 콜백은 아무것도 바꾸지 않고
//! 성공으로 응답합니다. 동시에 도착한 두 콜백은 조건부 UPDATE가 한쪽만 통과시킵니다.
//!
//! ## 전이 규칙 (최종 상태가 아닌 분석에 대해)
//! | 콜백 | 조건 | 결과 |
//! |------|------|------|
//! | completed + result | | 결과 기록, 분석 → completed, 글 → analyzed |
//! | failed + error | retryable이고 retry_count < 3 | retry_count만 +1, 분석은 pending 유지 |
//! | failed + error | 재시도 불가 또는 retry_count ≥ 3 | 에러 기록, 분석 → failed, 글은 submitted 유지 |
//! | 그 밖의 조합 | | Validation 에러, 변경 없음 |
//!
//! ## 작업 큐와의 관계
//! 최종 상태로 전이하는 트랜잭션 안에서 큐의 작업도 지웁니다(ack).
//! 재시도 가능한 실패는 작업의 임대만 풀어서, 다음 claim에서 같은 task_id로 다시 나가게 합니다.
//! 새 작업을 발행하지는 않습니다.

use crate::db;
use crate::db::analyses::AnalysisUpdate;
use crate::error::AppError;
use crate::models::*;
use sqlx::SqlitePool;

/// 콜백 하나를 처리한 결과
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// 분석이 completed로 전이됨
    Completed,
    /// 재시도 가능한 실패로 기록됨 (증가한 뒤의 retry_count)
    RetryRecorded { retry_count: i64 },
    /// 분석이 failed로 전이됨
    Failed,
    /// 이미 최종 상태였거나 다른 콜백이 먼저 처리함. 아무것도 바뀌지 않음
    Duplicate,
}

/// 워커 콜백 처리 서비스
#[derive(Clone)]
pub struct CallbackProcessor {
    pool: SqlitePool,
}

impl CallbackProcessor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 콜백을 처리합니다.
    ///
    /// ## 순서
    /// 1. task_id 파싱 (UUID가 아니면 Validation)
    /// 2. 분석 조회 (없으면 NotFound)
    /// 3. 이미 최종 상태면 `Duplicate`로 성공
    /// 4. status/result/error 조합 검증 후 전이
    ///
    /// 3단계가 검증보다 앞에 있으므로, 끝난 작업에 대한 중복 콜백은 내용과 상관없이 흡수됩니다.
    pub async fn handle_callback(
        &self,
        payload: CallbackPayload,
    ) -> Result<CallbackOutcome, AppError> {
        let task_id = payload.parsed_task_id()?.to_string();

        let analysis = db::analyses::find_by_task_id(&self.pool, &task_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Analysis not found".to_string()))?;

        if analysis.is_terminal() {
            tracing::debug!(task_id = %task_id, status = analysis.status().as_str(), "Duplicate callback ignored");
            return Ok(CallbackOutcome::Duplicate);
        }

        match payload.into_report()? {
            WorkerReport::Completed(result) => self.complete(&analysis, result).await,
            WorkerReport::Failed(error) => self.fail(&analysis, error).await,
        }
    }

    /// 결과를 기록하고 글을 analyzed로 옮깁니다. 두 변경은 한 트랜잭션입니다.
    async fn complete(
        &self,
        analysis: &Analysis,
        result: CallbackResult,
    ) -> Result<CallbackOutcome, AppError> {
        let details = CompletedDetails {
            ai_score: result.ai_probability,
            feedback: result.feedback,
            latency_ms: result.latency_ms,
        };

        let mut tx = self.pool.begin().await?;

        let applied = db::analyses::conditional_update_analysis(
            &mut *tx,
            &analysis.task_id,
            AnalysisUpdate::Complete(&details),
        )
        .await?;
        if !applied {
            // 조회 이후 다른 콜백이 먼저 최종 상태로 만들었음
            return Ok(CallbackOutcome::Duplicate);
        }

        let cascaded = db::writings::conditional_update_status(
            &mut *tx,
            &analysis.writing_id,
            WritingStatus::Submitted,
            WritingStatus::Analyzed,
            None,
        )
        .await?;
        if !cascaded {
            tracing::warn!(
                task_id = %analysis.task_id,
                writing_id = %analysis.writing_id,
                "Writing was not in submitted state when its analysis completed"
            );
        }

        db::outbox::ack(&mut *tx, &analysis.task_id).await?;
        tx.commit().await?;

        tracing::info!(
            task_id = %analysis.task_id,
            writing_id = %analysis.writing_id,
            ai_score = details.ai_score,
            latency_ms = details.latency_ms,
            "Analysis completed"
        );
        Ok(CallbackOutcome::Completed)
    }

    async fn fail(
        &self,
        analysis: &Analysis,
        error: CallbackError,
    ) -> Result<CallbackOutcome, AppError> {
        if error.retryable && analysis.retry_count < MAX_RETRIES {
            let mut tx = self.pool.begin().await?;
            let incremented =
                db::analyses::increment_retry(&mut *tx, &analysis.task_id, MAX_RETRIES).await?;

            if let Some(retry_count) = incremented {
                db::outbox::release(&mut *tx, &analysis.task_id).await?;
                tx.commit().await?;

                tracing::warn!(
                    task_id = %analysis.task_id,
                    code = %error.code,
                    retry_count,
                    "Retryable analysis failure recorded"
                );
                return Ok(CallbackOutcome::RetryRecorded { retry_count });
            }
            // 적용된 것이 없으니 롤백하고 연결을 돌려줍니다.
            drop(tx);

            // 다른 콜백이 먼저 끝냈거나, 그 사이 한도에 도달했음. 다시 읽어서 판단합니다.
            match db::analyses::find_by_task_id(&self.pool, &analysis.task_id).await? {
                Some(current) if !current.is_terminal() => {}
                _ => return Ok(CallbackOutcome::Duplicate),
            }
        }

        let details = FailedDetails {
            error_code: error.code,
            error_message: error.message,
        };

        let mut tx = self.pool.begin().await?;
        let applied = db::analyses::conditional_update_analysis(
            &mut *tx,
            &analysis.task_id,
            AnalysisUpdate::Fail(&details),
        )
        .await?;
        if !applied {
            return Ok(CallbackOutcome::Duplicate);
        }
        db::outbox::ack(&mut *tx, &analysis.task_id).await?;
        tx.commit().await?;

        // 글은 submitted에 그대로 둡니다.
        tracing::error!(
            task_id = %analysis.task_id,
            writing_id = %analysis.writing_id,
            code = %details.error_code,
            "Analysis failed"
        );
        Ok(CallbackOutcome::Failed)
    }
}
