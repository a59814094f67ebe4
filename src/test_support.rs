//! 테스트 공용 도우미: 인메모리 DB, 시드 데이터, 가짜 발행기

use crate::db;
use crate::models::*;
use crate::services::transport::{PublishError, TaskPublisher};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Mutex;

/// 마이그레이션이 적용된 인메모리 SQLite 풀
///
/// `sqlite::memory:`는 연결마다 별도의 DB가 생기므로 연결을 하나로 고정하고,
/// 유휴 연결이 닫혀 DB가 사라지지 않도록 timeout을 끕니다.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub async fn seed_user(pool: &SqlitePool, email: &str) -> User {
    db::users::create_user(pool, &uuid::Uuid::now_v7().to_string(), email, "not-a-real-hash")
        .await
        .expect("Failed to seed user")
}

pub async fn seed_writing(pool: &SqlitePool, user_id: &str) -> Writing {
    let req = CreateWritingRequest {
        writing_type: WritingType::Essay,
        title: "지원 동기".to_string(),
        content: "저는 이 회사에 지원하게 된 이유가 있습니다.".to_string(),
    };
    db::writings::create_writing(pool, user_id, &req)
        .await
        .expect("Failed to seed writing")
}

/// 한도 카운터를 직접 설정합니다 (`updated_at`은 건드리지 않음).
pub async fn set_quota(pool: &SqlitePool, user_id: &str, count: i64, last_submit_date: Option<&str>) {
    sqlx::query("UPDATE users SET daily_submit_count = ?, last_submit_date = ? WHERE id = ?")
        .bind(count)
        .bind(last_submit_date)
        .bind(user_id)
        .execute(pool)
        .await
        .expect("Failed to set quota");
}

pub fn today_str() -> String {
    crate::services::quota::today()
        .format(SUBMIT_DATE_FORMAT)
        .to_string()
}

/// 발행된 작업을 메모리에 모아두는 발행기
#[derive(Default)]
pub struct RecordingPublisher {
    tasks: Mutex<Vec<AnalysisTask>>,
}

impl RecordingPublisher {
    pub fn tasks(&self) -> Vec<AnalysisTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskPublisher for RecordingPublisher {
    async fn publish(&self, task: &AnalysisTask) -> Result<(), PublishError> {
        self.tasks.lock().unwrap().push(task.clone());
        Ok(())
    }
}

/// 항상 실패하는 발행기
pub struct FailingPublisher;

#[async_trait]
impl TaskPublisher for FailingPublisher {
    async fn publish(&self, _task: &AnalysisTask) -> Result<(), PublishError> {
        Err(PublishError::Queue("queue unavailable".to_string()))
    }
}

/// 응답하지 않는 발행기 (시간 초과 확인용)
pub struct HangingPublisher;

#[async_trait]
impl TaskPublisher for HangingPublisher {
    async fn publish(&self, _task: &AnalysisTask) -> Result<(), PublishError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}
