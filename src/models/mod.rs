//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! 각 하위 모듈은 특정 도메인의 데이터 타입을 담당합니다:
//! - `analysis`: 분석 기록(Analysis)과 상태 머신
//! - `task`: 워커와 주고받는 메시지 (작업, 콜백)
//! - `user`: 사용자(User)와 인증 요청/응답
//! - `writing`: 글(Writing)과 CRUD 요청
//!
//! `pub use X::*;`로 하위 모듈의 항목을 재공개하므로
//! `crate::models::writing::Writing` 대신 `crate::models::Writing`으로 접근할 수 있습니다.

pub mod analysis;
pub mod task;
pub mod user;
pub mod writing;

pub use analysis::*;
pub use task::*;
pub use user::*;
pub use writing::*;

use thiserror::Error;

/// DB에 저장된 문자열이 알려진 enum 값이 아닐 때의 에러
///
/// `#[sqlx(try_from = "String")]`로 행을 읽을 때 사용되며,
/// sqlx가 이를 디코딩 에러로 감싸 `AppError::Database`로 올립니다.
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
