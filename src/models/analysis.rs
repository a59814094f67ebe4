//! # 분석(Analysis) 모델과 상태 머신
//!
//! 글 하나를 제출할 때마다 분석 기록이 하나 생깁니다. 기록은 제출 시 발급된
//! `task_id`로만 콜백과 연결되며, 삭제되지 않습니다.
//!
//! ## 상태 머신
//! ```text
//!            ┌──(재시도 가능한 실패, retry_count < 3)──┐
//!            ▼                                        │
//!        pending ─────────────────────────────────────┘
//!            │
//!            ├──(completed 콜백)──▶ completed   (최종)
//!            └──(최종 실패)───────▶ failed      (최종)
//! ```
//! 최종 상태(completed, failed)에 도달하면 어떤 필드도 다시 바뀌지 않습니다.
//!
//! ## 결과/에러 필드 표현
//! DB에는 nullable 컬럼(`ai_score`, `error_code` 등)으로 저장되지만, Rust 쪽에서는
//! `AnalysisState` enum의 variant가 필드를 직접 소유합니다. 그래서 "completed인데
//! 점수가 없음" 같은 잘못된 조합은 타입으로 표현할 수 없습니다.

use crate::error::AppError;
use serde::Serialize;

/// 재시도 가능한 실패를 허용하는 최대 횟수
pub const MAX_RETRIES: i64 = 3;

/// 분석 상태 (DB 컬럼 값)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    /// 워커가 처리 중임을 표시할 때 쓰는 값. 이 서버는 직접 설정하지 않지만
    /// pending과 똑같이 "아직 끝나지 않은" 상태로 취급합니다.
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// 최종 상태인지 여부
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

/// 분석 성공 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedDetails {
    /// AI가 작성했을 확률 (0.0 ~ 1.0)
    pub ai_score: f64,
    pub feedback: String,
    /// 워커가 측정한 분석 소요 시간 (밀리초)
    pub latency_ms: i64,
}

/// 분석 최종 실패 정보
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedDetails {
    /// 워커가 보낸 에러 코드 (예: "TIMEOUT", "ML_MODEL_ERROR")
    pub error_code: String,
    pub error_message: String,
}

/// 분석의 현재 상태와, 그 상태에서만 존재하는 필드
///
/// `#[serde(tag = "status")]`: JSON으로 바꿀 때 variant 이름을 `status` 필드에 넣고
/// variant 내부 필드를 같은 객체에 펼칩니다.
/// 예: `{"status":"completed","ai_score":0.8,"feedback":"ok","latency_ms":120}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisState {
    Pending,
    Processing,
    Completed(CompletedDetails),
    Failed(FailedDetails),
}

impl AnalysisState {
    pub fn status(&self) -> AnalysisStatus {
        match self {
            AnalysisState::Pending => AnalysisStatus::Pending,
            AnalysisState::Processing => AnalysisStatus::Processing,
            AnalysisState::Completed(_) => AnalysisStatus::Completed,
            AnalysisState::Failed(_) => AnalysisStatus::Failed,
        }
    }
}

/// 분석 엔티티 (API 응답에도 그대로 사용)
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub id: String,
    pub writing_id: String,
    /// 제출 시 발급되는 상관관계(correlation) ID. 콜백은 이 값으로만 분석을 찾습니다.
    pub task_id: String,
    #[serde(flatten)]
    pub state: AnalysisState,
    pub retry_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Analysis {
    pub fn status(&self) -> AnalysisStatus {
        self.state.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

/// `analyses` 테이블 한 행 그대로의 모양 (nullable 컬럼 포함)
///
/// DB 계층(`db::analyses`)에서만 사용하고, 밖으로는 `Analysis`로 변환해서 내보냅니다.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisRow {
    pub id: String,
    pub writing_id: String,
    pub task_id: String,
    pub status: String,
    pub ai_score: Option<f64>,
    pub feedback: Option<String>,
    pub latency_ms: Option<i64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<AnalysisRow> for Analysis {
    type Error = AppError;

    /// 행을 상태별 variant로 조립합니다.
    ///
    /// 마이그레이션의 CHECK 제약이 잘못된 조합을 막지만, 그래도 맞지 않는 행이
    /// 나오면 조용히 기본값을 채우지 않고 내부 에러로 올립니다.
    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        let state = match row.status.as_str() {
            "pending" => AnalysisState::Pending,
            "processing" => AnalysisState::Processing,
            "completed" => match (row.ai_score, row.feedback, row.latency_ms) {
                (Some(ai_score), Some(feedback), Some(latency_ms)) => {
                    AnalysisState::Completed(CompletedDetails {
                        ai_score,
                        feedback,
                        latency_ms,
                    })
                }
                _ => {
                    return Err(AppError::Internal(format!(
                        "analysis {} is completed but has no result",
                        row.id
                    )))
                }
            },
            "failed" => match (row.error_code, row.error_message) {
                (Some(error_code), Some(error_message)) => AnalysisState::Failed(FailedDetails {
                    error_code,
                    error_message,
                }),
                _ => {
                    return Err(AppError::Internal(format!(
                        "analysis {} is failed but has no error",
                        row.id
                    )))
                }
            },
            other => {
                return Err(AppError::Internal(format!(
                    "analysis {} has unknown status {}",
                    row.id, other
                )))
            }
        };

        Ok(Analysis {
            id: row.id,
            writing_id: row.writing_id,
            task_id: row.task_id,
            state,
            retry_count: row.retry_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
