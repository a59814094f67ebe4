//! # 에러 처리 모듈
//!
//! 애플리케이션에서 발생할 수 있는 모든 에러 타입을 정의합니다.
//! Rust에서는 예외(exception) 대신 `Result<T, E>` 타입으로 에러를 처리합니다.
//!
//! 이 모듈의 핵심:
//! - `AppError` 열거형(enum): 모든 에러 종류를 하나의 타입으로 통합
//! - `IntoResponse` 구현: 에러를 HTTP 응답으로 자동 변환
//!
//! ## 에러 분류
//! 비즈니스 규칙 위반(NotFound, Forbidden, Validation, RateLimited)은 재시도 없이
//! 그대로 클라이언트까지 전달됩니다. DB/전송 계층의 실패는 Internal 계열(500)로
//! 감싸지며, 내부 메시지는 로그에만 남깁니다.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection}, // 추출기 실패 타입
    http::StatusCode,                   // HTTP 상태 코드 (200, 404, 500 등)
    response::{IntoResponse, Response}, // Axum의 응답 변환 트레이트
    Json,                               // JSON 응답 래퍼
};
use serde_json::json; // json! 매크로: JSON 객체를 간편하게 생성
use thiserror::Error; // thiserror: 커스텀 에러 타입을 쉽게 만들어주는 매크로 크레이트

/// 애플리케이션에서 발생할 수 있는 모든 에러 종류
///
/// 각 에러 variant는 적절한 HTTP 상태 코드와 메시지로 변환됩니다.
/// 핸들러에서 `Result<T, AppError>`를 반환하면,
/// Axum이 자동으로 `IntoResponse`를 호출하여 HTTP 응답으로 변환합니다.
#[derive(Debug, Error)]
pub enum AppError {
    /// 요청한 리소스를 찾을 수 없음 (HTTP 404)
    /// 어떤 리소스인지 메시지로 알려줍니다 (예: "Writing not found").
    #[error("{0}")]
    NotFound(String),

    /// 리소스의 소유자가 아님 (HTTP 403)
    #[error("{0}")]
    Forbidden(String),

    /// 요청 내용이 규칙에 맞지 않음 (HTTP 400)
    /// 예: 이미 제출된 글을 다시 제출, 콜백 status와 result/error 불일치
    #[error("{0}")]
    Validation(String),

    /// 하루 제출 한도 초과 (HTTP 429)
    /// 클라이언트가 정확한 안내 문구를 만들 수 있도록 현재 횟수와 한도를 함께 담습니다.
    #[error("Daily submission limit reached ({current}/{limit})")]
    RateLimited { current: i64, limit: i64 },

    /// 서버 내부 오류 (HTTP 500)
    /// 작업 전송 실패처럼 원인을 감싸서 올려야 하는 경우에 사용합니다.
    #[error("Internal error: {0}")]
    Internal(String),

    /// 데이터베이스 오류 (HTTP 500)
    /// #[from]: sqlx::Error를 AppError로 자동 변환하는 From 트레이트를 구현합니다.
    /// 이를 통해 sqlx 함수에서 반환된 에러에 `?` 연산자를 사용하면
    /// 자동으로 AppError::Database로 변환됩니다.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 인증 실패 (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 리소스 충돌 (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl AppError {
    /// 클라이언트에 내려가는 에러 코드 문자열
    ///
    /// 프론트엔드는 이 값으로 분기합니다 (예: `RATE_LIMITED`이면 한도 경고 표시).
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Internal(_) | AppError::Database(_) => "INTERNAL_SERVER_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Conflict(_) => "CONFLICT",
        }
    }

    /// HTTP 상태 코드
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    /// AppError를 HTTP 응답으로 변환합니다.
    ///
    /// 내부 에러(Database, Internal)는 실제 에러 내용을 로그에만 기록하고,
    /// 클라이언트에는 일반적인 메시지만 반환합니다.
    fn into_response(self) -> Response {
        let message = match self {
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                "A database error occurred".to_string()
            }
            // 나머지는 Display 메시지가 곧 사용자에게 보여줄 문구입니다.
            ref other => other.to_string(),
        };

        // 결과: { "error": { "code": "NOT_FOUND", "message": "Writing not found" } }
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message
            }
        }));

        (self.status(), body).into_response()
    }
}

// ── 추출기(Extractor) 실패를 AppError로 ──
// axum 기본 거부 응답은 평문이므로, 모든 에러가 같은 JSON 모양을 갖도록 변환합니다.
// routes 모듈의 `AppJson`/`AppQuery`/`AppPath`가 이 변환을 사용합니다.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
