//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들과 전체 라우터 조립을 담당합니다.
//! 핸들러는 요청을 해석하고 응답 모양을 만드는 얇은 층이며, 실제 규칙은
//! `services`에 있습니다.
//!
//! 각 하위 모듈:
//! - `auth`: 회원가입, 로그인, 토큰 갱신, 로그아웃, 내 정보
//! - `writings`: 글 CRUD
//! - `analysis`: 분석 제출/조회, 워커 콜백, 워커 작업 가져가기
//! - `health`: 서버/DB 상태 확인

pub mod analysis;
pub mod auth;
pub mod health;
pub mod writings;

use crate::error::AppError;
use crate::services::{CallbackProcessor, QuotaTracker, SubmissionCoordinator};
use axum::{
    extract::{FromRequest, FromRequestParts},
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer}, // CORS(Cross-Origin Resource Sharing) 설정
    trace::TraceLayer,      // HTTP 요청/응답 로깅 미들웨어
};

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// Axum의 State Extractor는 요청마다 clone하므로, 무거운 서비스는 `Arc`로 감쌉니다.
#[derive(Clone)]
pub struct AppState {
    /// SQLite 연결 풀 (내부적으로 Arc로 공유)
    pub pool: SqlitePool,
    /// JWT 토큰 서명용 비밀키
    pub jwt_secret: String,
    /// 워커 전용 엔드포인트의 공유 비밀값
    pub callback_secret: String,
    /// 워커가 작업을 가져갈 큐 이름
    pub task_stream: String,
    /// 워커가 가져간 작업의 임대 시간
    pub task_lease: Duration,
    pub quota: QuotaTracker,
    pub submissions: Arc<SubmissionCoordinator>,
    pub callbacks: Arc<CallbackProcessor>,
}

// ── 에러 모양을 통일한 추출기 ──
// axum 기본 `Json`/`Query`/`Path`는 실패 시 평문 응답을 내보냅니다.
// `#[from_request(via(...), rejection(AppError))]`로 감싸면 실패가 `AppError`를 거쳐
// 다른 에러와 같은 `{ "error": { "code", "message" } }` 모양이 됩니다.

/// JSON 본문 추출기 (실패 시 400 VALIDATION_ERROR)
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// 쿼리스트링 추출기 (실패 시 400 VALIDATION_ERROR)
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// 경로 파라미터 추출기 (실패 시 400 VALIDATION_ERROR)
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// 경로의 ID가 UUID 모양인지 확인합니다.
///
/// 잘못된 ID로 DB까지 가지 않고 바로 400을 돌려줍니다.
pub fn validate_id(id: &str, what: &str) -> Result<(), AppError> {
    uuid::Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| AppError::Validation(format!("Invalid {} ID", what)))
}

/// 전체 라우터를 조립합니다.
///
/// `main`과 라우터 단위 테스트가 같은 함수를 사용하므로, 테스트가 실제 경로와
/// 미들웨어 구성을 그대로 검증합니다.
pub fn router(state: AppState) -> Router {
    // 인증 관련 라우트 (회원가입, 로그인, 토큰 갱신, 로그아웃, 내 정보)
    let auth_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me));

    // 워커 전용 라우트. `WorkerAuth` 추출기가 공유 비밀값을 확인합니다.
    let internal_routes = Router::new()
        .route("/internal/callback", post(analysis::callback))
        .route("/internal/tasks/claim", post(analysis::claim_task));

    let api_routes = Router::new()
        .merge(auth_routes)
        // 글(Writing) CRUD API
        // axum 0.8부터 경로 파라미터는 `{id}` 문법을 사용합니다.
        .route("/writings", get(writings::list_writings).post(writings::create_writing))
        .route(
            "/writings/{id}",
            get(writings::get_writing)
                .put(writings::update_writing)
                .delete(writings::delete_writing),
        )
        // 분석 제출/조회
        .route("/writings/{id}/submit", post(analysis::submit_writing))
        .route("/writings/{id}/analysis", get(analysis::get_analysis))
        .merge(internal_routes);

    // CORS: 개발 환경 기준으로 모두 허용합니다.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // 헬스체크는 버전 접두사 없이 둡니다 (로드밸런서/오케스트레이터용).
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness))
        // .nest(): API 라우트를 /api/v1 경로 아래에 중첩시킵니다.
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // .with_state(): 모든 핸들러에서 AppState를 사용할 수 있게 합니다.
        .with_state(state)
}
