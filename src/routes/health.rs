//! # 헬스체크(Health Check) 핸들러
//!
//! 서버가 정상적으로 동작하는지 확인하는 엔드포인트입니다.
//!
//! ## 엔드포인트
//! - `GET /health`       → `{ "status": "ok" }` (프로세스가 살아 있는지)
//! - `GET /health/ready` → `{ "status": "ready", "queued_tasks": 0 }` (DB까지 응답하는지)
//!
//! 주로 다음 용도로 사용됩니다:
//! - 로드밸런서의 서버 상태 확인
//! - 컨테이너 오케스트레이터의 liveness/readiness 체크

use crate::{db, routes::AppState};
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

/// `GET /health`: 서버 상태를 확인합니다.
///
/// Extractor 없이 작동하는 가장 단순한 형태이며, 실패하지 않습니다.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok"
    }))
}

/// `GET /health/ready`: DB에 쿼리를 보내 요청을 받을 준비가 되었는지 확인합니다.
///
/// 워커가 아직 가져가지 않은 작업 수(`queued_tasks`)도 함께 알려줍니다.
/// DB가 응답하지 않으면 503을 돌려줍니다. 에러 내용은 로그에만 남깁니다.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match db::outbox::pending_count(&state.pool, &state.task_stream).await {
        Ok(queued) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "queued_tasks": queued })),
        ),
        Err(e) => {
            tracing::error!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
