//! # 워커 메시지 정의
//!
//! 분석 워커(ML 서버)와 주고받는 두 가지 메시지입니다.
//!
//! - `AnalysisTask`: 서버 → 워커. 제출에 성공할 때마다 정확히 한 번 발행됩니다.
//! - `CallbackPayload`: 워커 → 서버. 분석이 끝나면(성공이든 실패든) 콜백 URL로 전송됩니다.
//!
//! 양쪽 모두 "최소 한 번(at-least-once)" 전달을 가정하므로, 같은 메시지가
//! 여러 번 도착해도 결과가 달라지지 않도록 받는 쪽이 처리해야 합니다.

use super::WritingType;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 현재 메시지 포맷 버전
pub const TASK_VERSION: &str = "1";

/// 워커에게 보내는 분석 작업
///
/// 한 번 만들어지면 바뀌지 않습니다 (필드를 수정하는 메서드가 없음).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub version: String,
    pub task_id: Uuid,
    pub writing_id: Uuid,
    pub content: String,
    pub writing_type: WritingType,
    /// 결과를 돌려보낼 절대 URL
    pub callback_url: String,
}

impl AnalysisTask {
    pub fn new(
        task_id: Uuid,
        writing_id: Uuid,
        content: String,
        writing_type: WritingType,
        callback_url: String,
    ) -> Self {
        Self {
            version: TASK_VERSION.to_string(),
            task_id,
            writing_id,
            content,
            writing_type,
            callback_url,
        }
    }
}

/// 분석 성공 결과 (콜백의 `result`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackResult {
    pub ai_probability: f64,
    pub feedback: String,
    pub latency_ms: i64,
}

/// 분석 실패 정보 (콜백의 `error`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackError {
    pub code: String,
    pub message: String,
    /// 워커가 판단한 재시도 가능 여부
    pub retryable: bool,
}

/// 워커가 보내는 콜백 본문: `POST /api/v1/internal/callback`
///
/// `status`를 enum이 아닌 String으로 받는 이유: 알 수 없는 값이 와도
/// 역직렬화 단계에서 튕기지 않고, 분석 기록을 찾은 뒤 검증 에러로 돌려주기 위함입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub version: String,
    pub task_id: String,
    pub status: String,
    #[serde(default)]
    pub result: Option<CallbackResult>,
    #[serde(default)]
    pub error: Option<CallbackError>,
}

/// 검증을 통과한 콜백 내용
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerReport {
    Completed(CallbackResult),
    Failed(CallbackError),
}

impl CallbackPayload {
    /// `task_id` 문자열을 UUID로 파싱합니다.
    pub fn parsed_task_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.task_id)
            .map_err(|_| AppError::Validation("Invalid task ID".to_string()))
    }

    /// status와 result/error 조합을 검사해 `WorkerReport`로 바꿉니다.
    ///
    /// 허용되는 조합은 두 가지뿐입니다:
    /// - `completed` + result (error 없음)
    /// - `failed` + error (result 없음)
    ///
    /// 그 밖의 모든 경우는 `AppError::Validation`입니다.
    pub fn into_report(self) -> Result<WorkerReport, AppError> {
        if self.version.trim().is_empty() {
            return Err(AppError::Validation("Callback version is required".to_string()));
        }

        match (self.status.as_str(), self.result, self.error) {
            ("completed", Some(result), None) => {
                if !result.ai_probability.is_finite()
                    || !(0.0..=1.0).contains(&result.ai_probability)
                {
                    return Err(AppError::Validation(
                        "ai_probability must be between 0 and 1".to_string(),
                    ));
                }
                if result.latency_ms < 0 {
                    return Err(AppError::Validation(
                        "latency_ms must not be negative".to_string(),
                    ));
                }
                Ok(WorkerReport::Completed(result))
            }
            ("failed", None, Some(error)) => Ok(WorkerReport::Failed(error)),
            ("completed", _, _) => Err(AppError::Validation(
                "Completed callback requires a result and no error".to_string(),
            )),
            ("failed", _, _) => Err(AppError::Validation(
                "Failed callback requires an error and no result".to_string(),
            )),
            (other, _, _) => Err(AppError::Validation(format!(
                "Invalid callback status: {}",
                other
            ))),
        }
    }
}
