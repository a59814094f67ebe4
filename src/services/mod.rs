//! # 서비스 계층 (비즈니스 로직)
//!
//! 라우트 핸들러와 DB 계층 사이에서 분석 제출 파이프라인을 구성합니다.
//!
//! - `quota`: 사용자별 하루 제출 한도
//! - `transport`: 분석 작업 발행 (`TaskPublisher`)
//! - `submission`: 글 제출 흐름 (검증 → 분석 생성 → 발행)
//! - `callback`: 워커 콜백 처리 (멱등 전이, 재시도 한도)

pub mod callback;
pub mod quota;
pub mod submission;
pub mod transport;

pub use callback::CallbackProcessor;
pub use quota::QuotaTracker;
pub use submission::SubmissionCoordinator;
pub use transport::{OutboxPublisher, TaskPublisher};
