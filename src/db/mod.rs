//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 데이터베이스와 직접 상호작용하는 함수들을 모아둔 모듈입니다.
//! 서비스(services/)와 라우트 핸들러(routes/)에서 이 모듈의 함수를 호출합니다.
//!
//! 각 하위 모듈:
//! - `analyses`: 분석 기록 생성/조회와 조건부 상태 전이
//! - `outbox`: 워커에게 전달할 작업 큐
//! - `users`: 사용자 인증 쿼리와 하루 제출 한도 카운터
//! - `writings`: 글 CRUD와 조건부 상태 전이
//!
//! 상태를 바꾸는 함수는 모두 "예상한 이전 상태일 때만 바꾼다"는 조건부 UPDATE이며,
//! 실제로 바뀌었는지를 `bool`로 돌려줍니다.

pub mod analyses;
pub mod outbox;
pub mod users;
pub mod writings;
