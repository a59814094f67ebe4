//! # 하루 제출 한도(Quota) 추적
//!
//! 사용자마다 하루(UTC 달력 날짜 기준)에 제출할 수 있는 횟수를 제한합니다.
//!
//! ## 지연 초기화 (lazy reset)
//! 자정에 카운터를 0으로 돌리는 백그라운드 작업은 없습니다. 대신 `last_submit_date`가
//! 오늘보다 이전이면 저장된 값과 상관없이 "오늘은 0회"로 간주합니다.
//! 실제 0으로의 초기화는 다음 제출 때 조건부 UPDATE가 함께 처리합니다.
//!
//! ## 두 단계 사용
//! 제출 흐름은 검사(`check`)와 소비(`consume`)를 분리해서 씁니다.
//! 검사는 아무것도 바꾸지 않고, 소비는 트랜잭션 안에서 카운터를 올립니다.
//! 단독으로 쓸 때는 `check_and_consume`을 호출합니다.

use crate::db;
use crate::error::AppError;
use crate::models::User;
use chrono::{NaiveDate, Utc};
use sqlx::{Executor, Sqlite};

/// 기본 하루 제출 한도
pub const DEFAULT_MAX_DAILY: i64 = 5;

/// 오늘 날짜 (UTC)
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// 사용자별 하루 제출 한도 검사기
///
/// 상태를 갖지 않으므로 `Copy`로 자유롭게 복사해서 씁니다.
#[derive(Debug, Clone, Copy)]
pub struct QuotaTracker {
    max_daily: i64,
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DAILY)
    }
}

impl QuotaTracker {
    pub fn new(max_daily: i64) -> Self {
        Self { max_daily }
    }

    pub fn limit(&self) -> i64 {
        self.max_daily
    }

    /// `today` 기준으로 실제로 유효한 제출 횟수
    ///
    /// 마지막 제출일이 없거나 오늘보다 이전이면 0입니다.
    pub fn effective_count(&self, user: &User, today: NaiveDate) -> i64 {
        match user.last_submit_day() {
            Some(day) if day >= today => user.daily_submit_count,
            _ => 0,
        }
    }

    /// 한 번 더 제출할 수 있는지 검사합니다. 아무것도 바꾸지 않습니다.
    ///
    /// 한도에 도달했으면 현재 횟수와 한도를 담은 `AppError::RateLimited`를 반환합니다.
    pub fn check(&self, user: &User, today: NaiveDate) -> Result<(), AppError> {
        let current = self.effective_count(user, today);
        if current >= self.max_daily {
            return Err(AppError::RateLimited {
                current,
                limit: self.max_daily,
            });
        }
        Ok(())
    }

    /// 제출 1회를 소비합니다 (count + 1, last_submit_date = today).
    ///
    /// 조건부 UPDATE 한 문장이므로, 검사 이후 다른 요청이 마지막 자리를 먼저
    /// 가져갔다면 여기서 `RateLimited`가 됩니다. 이 경우 오늘 횟수는 이미 한도에
    /// 도달한 상태이므로 current로 한도를 보고합니다.
    pub async fn consume<'e, E>(
        &self,
        executor: E,
        user: &User,
        today: NaiveDate,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let day = today.format(crate::models::user::SUBMIT_DATE_FORMAT).to_string();
        let applied =
            db::users::conditional_increment_quota(executor, &user.id, &day, self.max_daily)
                .await?;

        if !applied {
            tracing::warn!(user_id = %user.id, "Quota consumed concurrently by another submission");
            return Err(AppError::RateLimited {
                current: self.max_daily,
                limit: self.max_daily,
            });
        }
        Ok(())
    }

    /// 검사와 소비를 한 번에 수행합니다.
    ///
    /// 한도 초과이면 DB를 건드리지 않고 `RateLimited`를 반환합니다.
    pub async fn check_and_consume<'e, E>(
        &self,
        executor: E,
        user: &User,
        today: NaiveDate,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        self.check(user, today)?;
        self.consume(executor, user, today).await
    }
}
