//! # 미들웨어(Extractor) 모듈
//!
//! - `auth`: JWT bearer 인증(`AuthUser`)과 워커 공유 비밀값 인증(`WorkerAuth`)

pub mod auth;
