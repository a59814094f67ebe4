//! # 분석(Analysis) 라우트 핸들러
//!
//! ## 엔드포인트
//! - `POST /api/v1/writings/{id}/submit`    → 글을 분석에 제출 (202 Accepted)
//! - `GET  /api/v1/writings/{id}/analysis`  → 글의 최신 분석 결과
//! - `POST /api/v1/internal/callback`       → 워커가 분석 결과를 보고 (워커 전용)
//! - `POST /api/v1/internal/tasks/claim`    → 워커가 다음 작업을 가져감 (워커 전용)
//!
//! 제출은 분석이 끝날 때까지 기다리지 않습니다. 202 응답의 `task_id`가 이후 콜백과
//! 분석 기록을 잇는 유일한 연결고리입니다.

use crate::{
    db,
    error::AppError,
    middleware::auth::{AuthUser, WorkerAuth},
    models::*,
    routes::{validate_id, writings::find_owned, AppJson, AppPath, AppState},
};
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};

/// 제출 응답 본문
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: &'static str,
    pub analysis_id: String,
    pub task_id: String,
}

/// `POST /writings/{id}/submit`: 글을 분석에 제출합니다.
///
/// 실제 규칙(소유자, 재제출, 하루 한도, 트랜잭션, 발행)은 모두
/// `SubmissionCoordinator`가 처리하고, 여기서는 응답 모양만 만듭니다.
pub async fn submit_writing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<String>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    validate_id(&id, "writing")?;

    let analysis = state
        .submissions
        .submit_writing(&id, &auth_user.user_id)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            message: "Analysis task queued",
            analysis_id: analysis.id,
            task_id: analysis.task_id,
        }),
    ))
}

/// `GET /writings/{id}/analysis`: 글의 가장 최근 분석을 조회합니다.
///
/// 아직 제출하지 않은 글이면 404입니다.
pub async fn get_analysis(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<Analysis>, AppError> {
    let writing = find_owned(&state, &id, &auth_user).await?;

    let analysis = db::analyses::find_latest_by_writing(&state.pool, &writing.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Analysis not found".to_string()))?;

    Ok(Json(analysis))
}

/// `POST /internal/callback`: 워커의 분석 결과를 처리합니다.
///
/// 같은 콜백이 여러 번 와도 200을 돌려주므로, 워커는 200이 아닐 때만 다시 보내면 됩니다.
pub async fn callback(
    State(state): State<AppState>,
    _worker: WorkerAuth,
    AppJson(payload): AppJson<CallbackPayload>,
) -> Result<Json<Value>, AppError> {
    let task_id = payload.task_id.clone();
    let outcome = state.callbacks.handle_callback(payload).await?;
    tracing::debug!(task_id = %task_id, outcome = ?outcome, "Callback processed");

    Ok(Json(json!({ "message": "Callback processed" })))
}

/// `POST /internal/tasks/claim`: 큐에서 가장 오래된 작업 하나를 꺼내 줍니다.
///
/// 작업은 임대 시간 동안만 이 워커의 몫입니다. 그 안에 콜백이 오지 않으면
/// 다음 claim에서 다시 나갑니다. 가져갈 작업이 없으면 `{ "task": null }`입니다.
pub async fn claim_task(
    State(state): State<AppState>,
    _worker: WorkerAuth,
) -> Result<Json<Value>, AppError> {
    let Some(payload) =
        db::outbox::claim_next(&state.pool, &state.task_stream, state.task_lease).await?
    else {
        return Ok(Json(json!({ "task": null })));
    };

    let task: AnalysisTask = serde_json::from_str(&payload)
        .map_err(|e| AppError::Internal(format!("Corrupt task in outbox: {}", e)))?;
    tracing::debug!(task_id = %task.task_id, "Task claimed by worker");

    Ok(Json(json!({ "task": task })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{router, testing::*};
    use crate::services::OutboxPublisher;
    use crate::test_support::*;
    use std::sync::Arc;

    struct Harness {
        app: axum::Router,
        pool: sqlx::SqlitePool,
    }

    /// 실제 outbox 발행기를 쓰는 라우터. 워커 흐름을 끝까지 따라갈 수 있습니다.
    async fn harness() -> Harness {
        let pool = test_pool().await;
        let publisher = Arc::new(OutboxPublisher::new(pool.clone(), "analysis_tasks"));
        Harness {
            app: router(state(pool.clone(), publisher)),
            pool,
        }
    }

    #[tokio::test]
    async fn submit_claim_callback_round() {
        let h = harness().await;
        let user = seed_user(&h.pool, "flow@example.com").await;
        let writing = seed_writing(&h.pool, &user.id).await;
        let auth = bearer(&user.id);

        let (status, body) = send(
            &h.app,
            "POST",
            &format!("/api/v1/writings/{}/submit", writing.id),
            Some(&auth),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["message"], "Analysis task queued");
        let task_id = body["task_id"].as_str().unwrap().to_string();

        // 워커가 작업을 가져갑니다.
        let (status, body) =
            send_as_worker(&h.app, "/api/v1/internal/tasks/claim", WORKER_SECRET, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"]["task_id"], task_id.as_str());
        assert_eq!(body["task"]["writing_id"], writing.id.as_str());
        assert_eq!(body["task"]["writing_type"], "essay");
        assert_eq!(
            body["task"]["callback_url"],
            "http://localhost:8080/api/v1/internal/callback"
        );

        // 임대 중인 작업은 다시 나오지 않습니다.
        let (_, body) =
            send_as_worker(&h.app, "/api/v1/internal/tasks/claim", WORKER_SECRET, None).await;
        assert!(body["task"].is_null());

        let analysis_uri = format!("/api/v1/writings/{}/analysis", writing.id);
        let (_, body) = send(&h.app, "GET", &analysis_uri, Some(&auth), None).await;
        assert_eq!(body["status"], "pending");

        let callback = json!({
            "version": "1",
            "task_id": task_id,
            "status": "completed",
            "result": { "ai_probability": 0.82, "feedback": "AI 작성 가능성이 높습니다.", "latency_ms": 1450 }
        });
        for _ in 0..2 {
            let (status, body) = send_as_worker(
                &h.app,
                "/api/v1/internal/callback",
                WORKER_SECRET,
                Some(callback.clone()),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["message"], "Callback processed");
        }

        let (status, body) = send(&h.app, "GET", &analysis_uri, Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["ai_score"], 0.82);
        assert_eq!(body["latency_ms"], 1450);
        assert_eq!(body["task_id"], task_id.as_str());

        let (_, body) = send(
            &h.app,
            "GET",
            &format!("/api/v1/writings/{}", writing.id),
            Some(&auth),
            None,
        )
        .await;
        assert_eq!(body["status"], "analyzed");

        // 최종 상태가 기록된 작업은 큐에서 사라집니다.
        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_outbox")
            .fetch_one(&h.pool)
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[tokio::test]
    async fn resubmission_and_rate_limit_statuses() {
        let h = harness().await;
        let user = seed_user(&h.pool, "limits@example.com").await;
        let auth = bearer(&user.id);

        let writing = seed_writing(&h.pool, &user.id).await;
        let submit_uri = format!("/api/v1/writings/{}/submit", writing.id);
        let (status, _) = send(&h.app, "POST", &submit_uri, Some(&auth), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, body) = send(&h.app, "POST", &submit_uri, Some(&auth), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Writing has already been submitted");

        set_quota(&h.pool, &user.id, 5, Some(&today_str())).await;
        let fresh = seed_writing(&h.pool, &user.id).await;
        let (status, body) = send(
            &h.app,
            "POST",
            &format!("/api/v1/writings/{}/submit", fresh.id),
            Some(&auth),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
        assert_eq!(body["error"]["message"], "Daily submission limit reached (5/5)");
    }

    #[tokio::test]
    async fn submit_of_someone_elses_writing_is_forbidden() {
        let h = harness().await;
        let owner = seed_user(&h.pool, "owner@example.com").await;
        let other = seed_user(&h.pool, "other@example.com").await;
        let writing = seed_writing(&h.pool, &owner.id).await;

        let (status, _) = send(
            &h.app,
            "POST",
            &format!("/api/v1/writings/{}/submit", writing.id),
            Some(&bearer(&other.id)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            db::outbox::pending_count(&h.pool, "analysis_tasks").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn analysis_of_unsubmitted_writing_is_not_found() {
        let h = harness().await;
        let user = seed_user(&h.pool, "nothing@example.com").await;
        let writing = seed_writing(&h.pool, &user.id).await;

        let (status, body) = send(
            &h.app,
            "GET",
            &format!("/api/v1/writings/{}/analysis", writing.id),
            Some(&bearer(&user.id)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Analysis not found");
    }

    #[tokio::test]
    async fn worker_routes_require_the_shared_secret() {
        let h = harness().await;

        let (status, body) =
            send_as_worker(&h.app, "/api/v1/internal/tasks/claim", "wrong", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (status, _) = send_as_worker(
            &h.app,
            "/api/v1/internal/callback",
            "wrong",
            Some(json!({ "version": "1", "task_id": uuid::Uuid::new_v4(), "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn callback_errors_map_to_statuses() {
        let h = harness().await;

        let (status, _) = send_as_worker(
            &h.app,
            "/api/v1/internal/callback",
            WORKER_SECRET,
            Some(json!({ "version": "1", "task_id": "not-a-uuid", "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_as_worker(
            &h.app,
            "/api/v1/internal/callback",
            WORKER_SECRET,
            Some(json!({
                "version": "1",
                "task_id": uuid::Uuid::new_v4(),
                "status": "failed",
                "error": { "code": "TIMEOUT", "message": "timed out", "retryable": true }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // 본문이 JSON이 아니면 400
        let (status, body) = send_as_worker(&h.app, "/api/v1/internal/callback", WORKER_SECRET, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
